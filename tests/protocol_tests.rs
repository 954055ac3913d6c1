use voxstream::protocol::{unix_timestamp, ChannelMessage, ControlAck, EngineStatus, ProbeResponse};

#[test]
fn test_transcription_message_serialization() {
    let msg = ChannelMessage::Transcription {
        text: "hello world".to_string(),
        timestamp: 1730000000.25,
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"transcription\""));
    assert!(json.contains("hello world"));
    assert!(json.contains("1730000000.25"));

    let deserialized: ChannelMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, msg);
}

#[test]
fn test_status_message_round_trip() {
    let msg = ChannelMessage::Status {
        status: EngineStatus {
            is_recording: true,
            is_running: true,
            is_shut_down: false,
            is_initializing: false,
        },
        timestamp: 1730000001.0,
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"status\""));
    assert!(json.contains("\"is_recording\":true"));

    let deserialized: ChannelMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, msg);
}

#[test]
fn test_error_message_deserialization() {
    let json = r#"{"type":"error","error":"engine poll failed"}"#;
    let msg: ChannelMessage = serde_json::from_str(json).unwrap();
    assert_eq!(
        msg,
        ChannelMessage::Error {
            error: "engine poll failed".to_string()
        }
    );
}

#[test]
fn test_malformed_payload_is_rejected() {
    assert!(serde_json::from_str::<ChannelMessage>("not json").is_err());
    assert!(serde_json::from_str::<ChannelMessage>("{}").is_err());
    assert!(serde_json::from_str::<ChannelMessage>(r#"{"type":"mystery"}"#).is_err());
}

#[test]
fn test_probe_response_uses_camel_case() {
    let probe = ProbeResponse {
        status: "ok".to_string(),
        active_subscriber_count: 3,
        engine_initialized: true,
        last_error: None,
    };

    let json = serde_json::to_string(&probe).unwrap();
    assert!(json.contains("\"status\":\"ok\""));
    assert!(json.contains("\"activeSubscriberCount\":3"));
    assert!(json.contains("\"engineInitialized\":true"));
    // Absent failure is omitted entirely
    assert!(!json.contains("lastError"));

    let deserialized: ProbeResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.active_subscriber_count, 3);
    assert!(deserialized.engine_initialized);
    assert!(deserialized.last_error.is_none());
}

#[test]
fn test_probe_response_carries_last_error() {
    let json = r#"{"status":"ok","activeSubscriberCount":0,"engineInitialized":false,"lastError":"engine initialization failed: no model"}"#;
    let probe: ProbeResponse = serde_json::from_str(json).unwrap();
    assert!(!probe.engine_initialized);
    assert!(probe.last_error.unwrap().contains("no model"));
}

#[test]
fn test_control_ack_round_trip() {
    let ack = ControlAck::ok("Engine started");
    let json = serde_json::to_string(&ack).unwrap();
    let deserialized: ControlAck = serde_json::from_str(&json).unwrap();
    assert!(deserialized.ok);
    assert_eq!(deserialized.message, "Engine started");
}

#[test]
fn test_offline_status_invariants() {
    let status = EngineStatus::offline();
    assert!(status.is_shut_down);
    assert!(!status.is_recording);
    assert!(!status.is_running);
    assert!(!status.is_initializing);
}

#[test]
fn test_initializing_status_invariants() {
    let status = EngineStatus::initializing();
    assert!(status.is_initializing);
    assert!(!status.is_recording);
    assert!(!status.is_shut_down);
}

#[test]
fn test_unix_timestamp_advances() {
    let t1 = unix_timestamp();
    let t2 = unix_timestamp();
    assert!(t1 > 1_600_000_000.0);
    assert!(t2 >= t1);
}
