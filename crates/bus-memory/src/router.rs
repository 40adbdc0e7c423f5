use std::collections::{HashMap, VecDeque};

use giapi_bus::{BusError, Destination, Message, Selector};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// One attached consumer or receiver.
#[derive(Debug)]
pub struct Subscriber {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub session_id: Uuid,
    pub selector: Option<Selector>,
    pub sender: mpsc::UnboundedSender<Message>,
}

impl Subscriber {
    fn accepts(&self, message: &Message) -> bool {
        self.selector
            .as_ref()
            .is_none_or(|selector| selector.matches(message))
    }
}

#[derive(Debug, Default)]
struct QueueState {
    subscribers: Vec<Subscriber>,
    pending: VecDeque<Message>,
    next: usize,
}

impl QueueState {
    /// Hands the message to the next accepting subscriber in round-robin order.
    fn dispatch(&mut self, message: Message) -> Option<Message> {
        let mut message = message;
        let mut attempts = self.subscribers.len();

        while attempts > 0 && !self.subscribers.is_empty() {
            attempts -= 1;
            let index = self.next % self.subscribers.len();
            self.next = self.next.wrapping_add(1);

            if !self.subscribers[index].accepts(&message) {
                continue;
            }

            match self.subscribers[index].sender.send(message) {
                Ok(()) => return None,
                Err(mpsc::error::SendError(returned)) => {
                    self.subscribers.remove(index);
                    message = returned;
                }
            }
        }

        Some(message)
    }

    fn drain_pending(&mut self) {
        let pending: Vec<Message> = self.pending.drain(..).collect();
        for message in pending {
            if let Some(undelivered) = self.dispatch(message) {
                self.pending.push_back(undelivered);
            }
        }
    }
}

/// Routing table shared by every connection of a broker.
#[derive(Debug, Default)]
pub struct Router {
    topics: HashMap<String, Vec<Subscriber>>,
    queues: HashMap<String, QueueState>,
    temporary: HashMap<String, Uuid>,
}

impl Router {
    pub fn add_temporary(&mut self, name: String, connection_id: Uuid) {
        self.temporary.insert(name, connection_id);
    }

    pub fn remove_temporary(&mut self, name: &str) {
        self.temporary.remove(name);
        self.queues.remove(name);
    }

    pub fn attach(&mut self, destination: &Destination, subscriber: Subscriber) -> Result<(), BusError> {
        match destination {
            Destination::Topic(name) => {
                self.topics.entry(name.clone()).or_default().push(subscriber);
            }
            Destination::Queue(name) => {
                let queue = self.queues.entry(name.clone()).or_default();
                queue.subscribers.push(subscriber);
                queue.drain_pending();
            }
            Destination::TemporaryQueue(name) => {
                if !self.temporary.contains_key(name) {
                    return Err(BusError::InvalidDestination(destination.to_string()));
                }
                let queue = self.queues.entry(name.clone()).or_default();
                queue.subscribers.push(subscriber);
                queue.drain_pending();
            }
        }
        Ok(())
    }

    pub fn route(&mut self, destination: &Destination, message: Message) -> Result<(), BusError> {
        match destination {
            Destination::Topic(name) => {
                if let Some(subscribers) = self.topics.get_mut(name) {
                    subscribers.retain(|subscriber| {
                        if subscriber.accepts(&message) {
                            subscriber.sender.send(message.clone()).is_ok()
                        } else {
                            !subscriber.sender.is_closed()
                        }
                    });
                }
            }
            Destination::Queue(name) => {
                let queue = self.queues.entry(name.clone()).or_default();
                if let Some(undelivered) = queue.dispatch(message) {
                    debug!("No consumer for {}, buffering message", destination);
                    queue.pending.push_back(undelivered);
                }
            }
            Destination::TemporaryQueue(name) => {
                if !self.temporary.contains_key(name) {
                    return Err(BusError::InvalidDestination(destination.to_string()));
                }
                let queue = self.queues.entry(name.clone()).or_default();
                if let Some(undelivered) = queue.dispatch(message) {
                    queue.pending.push_back(undelivered);
                }
            }
        }
        Ok(())
    }

    pub fn detach(&mut self, subscriber_id: Uuid) {
        self.retain_subscribers(|subscriber| subscriber.id != subscriber_id);
    }

    pub fn detach_session(&mut self, session_id: Uuid) {
        self.retain_subscribers(|subscriber| subscriber.session_id != session_id);
    }

    pub fn detach_connection(&mut self, connection_id: Uuid) {
        self.retain_subscribers(|subscriber| subscriber.connection_id != connection_id);

        let owned: Vec<String> = self
            .temporary
            .iter()
            .filter(|(_, owner)| **owner == connection_id)
            .map(|(name, _)| name.clone())
            .collect();
        for name in owned {
            self.remove_temporary(&name);
        }
    }

    fn retain_subscribers<F>(&mut self, keep: F)
    where
        F: Fn(&Subscriber) -> bool,
    {
        for subscribers in self.topics.values_mut() {
            subscribers.retain(&keep);
        }
        for queue in self.queues.values_mut() {
            queue.subscribers.retain(&keep);
        }
    }

    pub fn subscriber_count(&self, destination: &Destination) -> usize {
        match destination {
            Destination::Topic(name) => self.topics.get(name).map_or(0, Vec::len),
            Destination::Queue(name) | Destination::TemporaryQueue(name) => {
                self.queues.get(name).map_or(0, |queue| queue.subscribers.len())
            }
        }
    }

    pub fn pending_count(&self, destination: &Destination) -> usize {
        match destination {
            Destination::Topic(_) => 0,
            Destination::Queue(name) | Destination::TemporaryQueue(name) => {
                self.queues.get(name).map_or(0, |queue| queue.pending.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber(selector: Option<&str>) -> (Subscriber, mpsc::UnboundedReceiver<Message>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            connection_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            selector: selector.map(|s| s.parse().unwrap()),
            sender,
        };
        (subscriber, receiver)
    }

    #[test]
    fn test_queue_buffers_until_consumer_attaches() {
        let mut router = Router::default();
        let queue = Destination::queue("GMP.GEMINI.TCS.CONTEXT");

        router.route(&queue, Message::text("hello")).unwrap();
        assert_eq!(router.pending_count(&queue), 1);

        let (sub, mut rx) = subscriber(None);
        router.attach(&queue, sub).unwrap();

        assert_eq!(router.pending_count(&queue), 0);
        assert_eq!(rx.try_recv().unwrap().as_text(), Some("hello"));
    }

    #[test]
    fn test_queue_round_robin() {
        let mut router = Router::default();
        let queue = Destination::queue("q");
        let (a, mut rx_a) = subscriber(None);
        let (b, mut rx_b) = subscriber(None);
        router.attach(&queue, a).unwrap();
        router.attach(&queue, b).unwrap();

        for i in 0..4 {
            router.route(&queue, Message::text(i.to_string())).unwrap();
        }

        let mut count_a = 0;
        while rx_a.try_recv().is_ok() {
            count_a += 1;
        }
        let mut count_b = 0;
        while rx_b.try_recv().is_ok() {
            count_b += 1;
        }
        assert_eq!((count_a, count_b), (2, 2));
    }

    #[test]
    fn test_topic_applies_selectors() {
        let mut router = Router::default();
        let topic = Destination::topic("GMP.SC.INIT");
        let (preset, mut rx_preset) = subscriber(Some("Activity IN ('PRESET')"));
        let (all, mut rx_all) = subscriber(None);
        router.attach(&topic, preset).unwrap();
        router.attach(&topic, all).unwrap();

        router
            .route(&topic, Message::empty().with_property("Activity", "START"))
            .unwrap();

        assert!(rx_preset.try_recv().is_err());
        assert!(rx_all.try_recv().is_ok());
    }

    #[test]
    fn test_unknown_temporary_queue_is_rejected() {
        let mut router = Router::default();
        let temp = Destination::TemporaryQueue("gone".to_string());

        assert!(router.route(&temp, Message::empty()).is_err());
    }
}
