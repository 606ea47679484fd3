use serde_json::json;

use super::frame::{ClientFrame, LinkRole, ServerFrame};
use super::url::{DEFAULT_HOST, DEFAULT_PORT, parse_address_url};
use crate::broker::message::Message;

#[test]
fn attach_frame_json_shape() {
    let frame = ClientFrame::Attach {
        link: "receiver-0".to_string(),
        role: LinkRole::Receiver,
        address: Some("q1".to_string()),
        dynamic: false,
    };
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "attach",
            "link": "receiver-0",
            "role": "receiver",
            "address": "q1",
            "dynamic": false,
        })
    );
}

#[test]
fn transfer_frame_parses_from_text() {
    let text = r#"{
        "type": "transfer",
        "link": "sender-0",
        "delivery": 3,
        "message": {"id": "1", "body": "hello"}
    }"#;
    let frame: ClientFrame = serde_json::from_str(text).unwrap();
    match frame {
        ClientFrame::Transfer {
            link,
            delivery,
            message,
        } => {
            assert_eq!(link, "sender-0");
            assert_eq!(delivery, 3);
            assert_eq!(message.id, "1");
            assert_eq!(message.body, "hello");
            assert!(message.correlation_id.is_none());
        }
        other => panic!("expected a transfer frame, got {other:?}"),
    }
}

#[test]
fn deliver_frame_round_trips_request_fields() {
    let mut message = Message::new("abc");
    message.correlation_id = Some("x".to_string());
    message.reply_to = Some("dyn-reply-1".to_string());

    let frame = ServerFrame::Deliver {
        link: "receiver-0".to_string(),
        delivery: 0,
        message,
    };
    let text = serde_json::to_string(&frame).unwrap();
    let parsed: ServerFrame = serde_json::from_str(&text).unwrap();

    match parsed {
        ServerFrame::Deliver { message, .. } => {
            assert_eq!(message.body, "abc");
            assert_eq!(message.correlation_id.as_deref(), Some("x"));
            assert_eq!(message.reply_to.as_deref(), Some("dyn-reply-1"));
        }
        other => panic!("expected a deliver frame, got {other:?}"),
    }
}

#[test]
fn bare_address_uses_defaults() {
    let url = parse_address_url("queue0").unwrap();
    assert_eq!(url.host, DEFAULT_HOST);
    assert_eq!(url.port, DEFAULT_PORT);
    assert_eq!(url.address, "queue0");
}

#[test]
fn host_relative_url() {
    let url = parse_address_url("//example.net/queue0").unwrap();
    assert_eq!(url.host, "example.net");
    assert_eq!(url.port, DEFAULT_PORT);
    assert_eq!(url.address, "queue0");
}

#[test]
fn explicit_host_and_port() {
    let url = parse_address_url("//example.net:15672/jobs").unwrap();
    assert_eq!(url.host, "example.net");
    assert_eq!(url.port, 15672);
    assert_eq!(url.address, "jobs");
    assert_eq!(url.domain(), "example.net:15672");
}

#[test]
fn url_without_address_is_rejected() {
    assert!(parse_address_url("//example.net").is_err());
    assert!(parse_address_url("//example.net/").is_err());
}
