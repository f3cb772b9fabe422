//! In-process topic bus on tokio broadcast channels

use crate::error::{Result, VisionError};
use crate::transport::{ImageMessage, ImageSource, PosePublisher, PoseMessage};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Named topics, each a bounded broadcast channel of one message type.
/// Slow subscribers lose the oldest messages.
pub struct MessageBus {
    capacity: usize,
    topics: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            topics: RwLock::new(HashMap::new()),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn sender<T>(&self, topic: &str) -> Result<broadcast::Sender<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        if let Some(existing) = self.topics.read().get(topic) {
            return downcast_sender(topic, existing.as_ref());
        }

        let mut topics = self.topics.write();
        let entry = topics.entry(topic.to_string()).or_insert_with(|| {
            debug!("Creating topic {} (depth {})", topic, self.capacity);
            let (sender, _) = broadcast::channel::<T>(self.capacity);
            Box::new(sender) as Box<dyn Any + Send + Sync>
        });
        downcast_sender(topic, entry.as_ref())
    }

    pub fn publisher<T>(&self, topic: &str) -> Result<TopicPublisher<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        Ok(TopicPublisher {
            topic: topic.to_string(),
            sender: self.sender(topic)?,
        })
    }

    pub fn subscribe<T>(&self, topic: &str) -> Result<TopicSubscriber<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        Ok(TopicSubscriber {
            topic: topic.to_string(),
            receiver: self.sender::<T>(topic)?.subscribe(),
        })
    }

    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.read().keys().cloned().collect();
        names.sort();
        names
    }
}

fn downcast_sender<T: Clone + Send + Sync + 'static>(
    topic: &str,
    entry: &(dyn Any + Send + Sync),
) -> Result<broadcast::Sender<T>> {
    entry
        .downcast_ref::<broadcast::Sender<T>>()
        .cloned()
        .ok_or_else(|| {
            VisionError::Transport(format!(
                "Topic {} already carries a different message type",
                topic
            ))
        })
}

#[derive(Clone)]
pub struct TopicPublisher<T> {
    topic: String,
    sender: broadcast::Sender<T>,
}

impl<T: Clone + Send + Sync + 'static> TopicPublisher<T> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns how many subscribers received the message. Publishing to a
    /// topic nobody listens on is not an error.
    pub fn send(&self, message: T) -> usize {
        match self.sender.send(message) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("No subscribers on {}", self.topic);
                0
            }
        }
    }
}

impl PosePublisher for TopicPublisher<PoseMessage> {
    fn publish(&self, pose: PoseMessage) -> Result<()> {
        self.send(pose);
        Ok(())
    }
}

pub struct TopicSubscriber<T> {
    topic: String,
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> TopicSubscriber<T> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message, skipping over anything dropped while lagging.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber on {} lagged, dropped {} message(s)", self.topic, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
impl ImageSource for TopicSubscriber<ImageMessage> {
    async fn next_image(&mut self) -> Option<ImageMessage> {
        self.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::SteeringEstimate;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = MessageBus::new(4);
        let publisher = bus.publisher::<PoseMessage>("/steer").unwrap();
        let mut subscriber = bus.subscribe::<PoseMessage>("/steer").unwrap();

        publisher.publish(SteeringEstimate::found(0.2).to_pose()).unwrap();
        let pose = subscriber.recv().await.unwrap();
        assert_eq!(pose.angle(), 0.2);
        assert_eq!(pose.valid_flag(), 1.0);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = MessageBus::new(4);
        let publisher = bus.publisher::<PoseMessage>("/steer").unwrap();
        assert_eq!(publisher.send(PoseMessage::default()), 0);
        assert!(publisher.publish(PoseMessage::default()).is_ok());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let bus = MessageBus::new(4);
        bus.publisher::<PoseMessage>("/steer").unwrap();
        let err = bus.subscribe::<ImageMessage>("/steer").err().unwrap();
        assert!(matches!(err, VisionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_newest() {
        let bus = MessageBus::new(2);
        let publisher = bus.publisher::<u32>("/numbers").unwrap();
        let mut subscriber = bus.subscribe::<u32>("/numbers").unwrap();

        for n in 0..5 {
            publisher.send(n);
        }
        assert_eq!(subscriber.recv().await, Some(3));
        assert_eq!(subscriber.recv().await, Some(4));
    }

    #[test]
    fn test_recv_waits_for_message() {
        let bus = MessageBus::new(4);
        let publisher = bus.publisher::<u32>("/numbers").unwrap();
        let mut subscriber = bus.subscribe::<u32>("/numbers").unwrap();

        let mut pending = tokio_test::task::spawn(subscriber.recv());
        tokio_test::assert_pending!(pending.poll());
        publisher.send(7);
        assert!(pending.is_woken());
        tokio_test::assert_ready_eq!(pending.poll(), Some(7));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let bus = MessageBus::new(0);
        assert_eq!(bus.capacity(), 1);
        assert!(bus.publisher::<u32>("/x").is_ok());
        assert_eq!(bus.topics(), vec!["/x".to_string()]);
    }
}
