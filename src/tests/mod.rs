//! End-to-end tests: a broker on loopback, real client connections, real
//! frames. Each test uses its own port so they can run in parallel.

use std::sync::Arc;
use std::time::Duration;

use crate::broker::message::Message;
use crate::broker::{Broker, BrokerState};
use crate::client::Connection;
use crate::config::Settings;
use crate::utils::error::Error;

async fn start_broker(port: u16) -> Arc<Broker> {
    let mut settings = Settings::default();
    settings.server.host = "127.0.0.1".to_string();
    settings.server.port = port;

    let broker = Arc::new(Broker::new(settings));
    let runner = broker.clone();
    tokio::spawn(async move {
        let _ = runner.start().await;
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    broker
}

#[tokio::test]
async fn queue_delivery_is_exactly_once() {
    let broker = start_broker(9101).await;

    let consumer = Connection::connect("127.0.0.1", 9101).await.expect("consumer connect");
    let mut receiver = consumer.attach_receiver(Some("q1")).await.expect("attach receiver");

    let producer = Connection::connect("127.0.0.1", 9101).await.expect("producer connect");
    let mut sender = producer.attach_sender(Some("q1")).await.expect("attach sender");

    let mut message = Message::new("hello");
    message.id = "1".to_string();
    sender.send(message).await.expect("send");

    let received = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("delivery timed out")
        .expect("recv");
    assert_eq!(received.id, "1");
    assert_eq!(received.body, "hello");

    // a consumer attaching afterward sees nothing from that message
    let late = Connection::connect("127.0.0.1", 9101).await.expect("late connect");
    let mut late_receiver = late.attach_receiver(Some("q1")).await.expect("late attach");
    let nothing = tokio::time::timeout(Duration::from_millis(300), late_receiver.recv()).await;
    assert!(nothing.is_err(), "already-delivered message must not reappear");

    broker.stop();
}

#[tokio::test]
async fn request_response_round_trip() {
    let broker = start_broker(9102).await;

    tokio::spawn(async move {
        let connection = Connection::connect("127.0.0.1", 9102).await.expect("responder connect");
        let mut requests = connection.attach_receiver(Some("jobs")).await.expect("attach requests");
        let mut replies = connection.attach_sender(None).await.expect("attach anonymous sender");

        let request = requests.recv().await.expect("recv request");
        let mut response = Message::new(request.body.to_uppercase());
        response.to = request.reply_to.clone();
        response.correlation_id = request.correlation_id.clone();
        replies.send(response).await.expect("send response");
    });

    let connection = Connection::connect("127.0.0.1", 9102).await.expect("requester connect");
    let mut reply_queue = connection.attach_receiver(None).await.expect("attach dynamic receiver");
    let mut sender = connection.attach_sender(Some("jobs")).await.expect("attach sender");

    let mut request = Message::new("abc");
    request.correlation_id = Some("x".to_string());
    request.reply_to = Some(reply_queue.address().to_string());
    sender.send(request).await.expect("send request");

    let response = tokio::time::timeout(Duration::from_secs(2), reply_queue.recv())
        .await
        .expect("response timed out")
        .expect("recv response");
    assert_eq!(response.body, "ABC");
    assert_eq!(response.correlation_id.as_deref(), Some("x"));

    broker.stop();
}

#[tokio::test]
async fn dynamic_reply_queue_destroyed_on_detach() {
    let broker = start_broker(9103).await;

    let connection = Connection::connect("127.0.0.1", 9103).await.expect("connect");
    let receiver = connection.attach_receiver(None).await.expect("attach dynamic receiver");
    let address = receiver.address().to_string();
    assert!(broker.router().has_queue(&address));

    receiver.detach().expect("detach");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!broker.router().has_queue(&address));

    broker.stop();
}

#[tokio::test]
async fn disconnect_leaves_named_queue_intact() {
    let broker = start_broker(9104).await;

    // park a message in q2 with no consumer attached
    let producer = Connection::connect("127.0.0.1", 9104).await.expect("producer connect");
    let mut sender = producer.attach_sender(Some("q2")).await.expect("attach sender");
    sender.send(Message::new("parked")).await.expect("send");
    drop(sender);
    drop(producer);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let queue = broker.router().resolve("q2");
    assert_eq!(queue.lock().unwrap().pending(), 1);

    // a consumer arriving later still gets it
    let consumer = Connection::connect("127.0.0.1", 9104).await.expect("consumer connect");
    let mut receiver = consumer.attach_receiver(Some("q2")).await.expect("attach receiver");
    let received = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("delivery timed out")
        .expect("recv");
    assert_eq!(received.body, "parked");

    broker.stop();
}

#[tokio::test]
async fn bind_error_is_reported() {
    let broker = start_broker(9105).await;

    let mut settings = Settings::default();
    settings.server.port = 9105;
    let second = Broker::new(settings);
    let err = second.start().await.expect_err("second bind must fail");
    assert!(matches!(err, Error::Bind { .. }));

    broker.stop();
}

#[tokio::test]
async fn stop_reaches_stopped_state() {
    let broker = start_broker(9106).await;
    assert_eq!(broker.state(), BrokerState::Running);

    // an open connection must not wedge shutdown
    let _connection = Connection::connect("127.0.0.1", 9106).await.expect("connect");

    broker.stop();
    let mut state = broker.subscribe_state();
    tokio::time::timeout(Duration::from_secs(10), async {
        while *state.borrow_and_update() != BrokerState::Stopped {
            state.changed().await.expect("state channel closed");
        }
    })
    .await
    .expect("broker did not stop in time");
}
