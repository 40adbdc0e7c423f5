//! Integration tests for the memory broker

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use giapi_bus::{
    Broker, BusError, Connection, Destination, ExceptionListener, Message, MessageListener,
    Selector,
};
use giapi_bus_memory::MemoryBroker;
use tokio::sync::{Notify, mpsc};
use tokio::time::timeout;
use uuid::Uuid;

struct Forward(mpsc::UnboundedSender<Message>);

#[async_trait]
impl MessageListener for Forward {
    async fn on_message(&self, message: Message) {
        let _ = self.0.send(message);
    }
}

struct CountExceptions(Arc<AtomicUsize>);

#[async_trait]
impl ExceptionListener for CountExceptions {
    async fn on_exception(&self, _connection_id: Uuid, _error: BusError) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

async fn started(broker: &MemoryBroker) -> Arc<dyn Connection> {
    let connection = broker.connect().await.expect("Failed to connect");
    connection.start().await.expect("Failed to start");
    connection
}

#[tokio::test]
async fn test_topic_fan_out_with_selector() {
    let _ = tracing_subscriber::fmt::try_init();

    let broker = MemoryBroker::new();
    let connection = started(&broker).await;
    let session = connection.create_session().await.unwrap();
    let topic = Destination::topic("GMP.SC.INIT");

    let (tx_all, mut rx_all) = mpsc::unbounded_channel();
    let (tx_start, mut rx_start) = mpsc::unbounded_channel();
    let _all = session
        .create_consumer(&topic, None, Arc::new(Forward(tx_all)))
        .await
        .unwrap();
    let _start = session
        .create_consumer(
            &topic,
            Some("Activity IN ('START')".parse::<Selector>().unwrap()),
            Arc::new(Forward(tx_start)),
        )
        .await
        .unwrap();

    let producer = session.create_producer(&topic).await.unwrap();
    producer
        .send(Message::empty().with_property("Activity", "PRESET"))
        .await
        .unwrap();
    producer
        .send(Message::empty().with_property("Activity", "START"))
        .await
        .unwrap();

    let first = timeout(Duration::from_secs(1), rx_all.recv()).await.unwrap().unwrap();
    assert_eq!(first.string_property("Activity"), Some("PRESET"));
    let second = timeout(Duration::from_secs(1), rx_all.recv()).await.unwrap().unwrap();
    assert_eq!(second.string_property("Activity"), Some("START"));

    let only = timeout(Duration::from_secs(1), rx_start.recv()).await.unwrap().unwrap();
    assert_eq!(only.string_property("Activity"), Some("START"));
    assert!(rx_start.try_recv().is_err());
}

#[tokio::test]
async fn test_request_reply_over_temporary_queue() {
    let broker = MemoryBroker::new();
    let connection = started(&broker).await;
    let session = connection.create_session().await.unwrap();
    let queue = Destination::queue("GMP.UTIL.REQUEST");

    let server = session.create_receiver(&queue).await.unwrap();
    let reply_to = session.create_temporary_queue().await.unwrap();
    let replies = session.create_receiver(&reply_to).await.unwrap();

    let producer = session.create_producer(&queue).await.unwrap();
    producer
        .send(Message::text("ping").with_reply_to(reply_to.clone()))
        .await
        .unwrap();

    let request = server.receive(Some(Duration::from_secs(1))).await.unwrap().unwrap();
    let reply_producer = session
        .create_producer(request.reply_to().unwrap())
        .await
        .unwrap();
    reply_producer.send(Message::text("pong")).await.unwrap();

    let reply = replies.receive(Some(Duration::from_secs(1))).await.unwrap().unwrap();
    assert_eq!(reply.as_text(), Some("pong"));

    session.delete_temporary_queue(&reply_to).await.unwrap();
    assert_matches!(
        reply_producer.send(Message::text("late")).await,
        Err(BusError::InvalidDestination(_))
    );
}

#[tokio::test]
async fn test_receive_times_out_with_none() {
    let broker = MemoryBroker::new();
    let connection = started(&broker).await;
    let session = connection.create_session().await.unwrap();
    let receiver = session
        .create_receiver(&Destination::queue("nobody"))
        .await
        .unwrap();

    let result = receiver.receive(Some(Duration::from_millis(20))).await;
    assert_matches!(result, Ok(None));
}

#[tokio::test]
async fn test_delivery_waits_for_start() {
    let broker = MemoryBroker::new();
    let connection = broker.connect().await.unwrap();
    let session = connection.create_session().await.unwrap();
    let topic = Destination::topic("t");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _consumer = session
        .create_consumer(&topic, None, Arc::new(Forward(tx)))
        .await
        .unwrap();
    session
        .create_producer(&topic)
        .await
        .unwrap()
        .send(Message::text("early"))
        .await
        .unwrap();

    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());

    connection.start().await.unwrap();
    let message = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(message.as_text(), Some("early"));
}

#[tokio::test]
async fn test_close_waits_for_in_flight_delivery() {
    struct Slow {
        entered: Arc<Notify>,
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MessageListener for Slow {
        async fn on_message(&self, _message: Message) {
            self.entered.notify_one();
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    let broker = MemoryBroker::new();
    let connection = started(&broker).await;
    let session = connection.create_session().await.unwrap();
    let topic = Destination::topic("slow");

    let entered = Arc::new(Notify::new());
    let finished = Arc::new(AtomicUsize::new(0));
    let consumer = session
        .create_consumer(
            &topic,
            None,
            Arc::new(Slow {
                entered: entered.clone(),
                finished: finished.clone(),
            }),
        )
        .await
        .unwrap();

    session
        .create_producer(&topic)
        .await
        .unwrap()
        .send(Message::empty())
        .await
        .unwrap();
    entered.notified().await;

    consumer.close().await.unwrap();
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(broker.subscriber_count(&topic), 0);
}

#[tokio::test]
async fn test_disconnect_notifies_listener_and_blocks_reconnect() {
    let broker = MemoryBroker::new();
    let connection = started(&broker).await;
    let session = connection.create_session().await.unwrap();
    let topic = Destination::topic("GMP.STATUS");
    let (tx, _rx) = mpsc::unbounded_channel();
    let _consumer = session
        .create_consumer(&topic, None, Arc::new(Forward(tx)))
        .await
        .unwrap();

    let exceptions = Arc::new(AtomicUsize::new(0));
    connection.set_exception_listener(Arc::new(CountExceptions(exceptions.clone())));

    broker.set_available(false);
    broker.disconnect_all();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(exceptions.load(Ordering::SeqCst), 1);
    assert!(!connection.is_open());
    assert_eq!(broker.subscriber_count(&topic), 0);
    assert_eq!(broker.connection_count(), 0);

    assert_matches!(
        session.create_producer(&topic).await,
        Err(BusError::ConnectionClosed)
    );
    assert_matches!(broker.connect().await, Err(BusError::ConnectionFailed(_)));

    broker.set_available(true);
    assert!(broker.connect().await.is_ok());
}
