//! Topic transport: message shapes, the in-process bus, the pose echo and
//! the ROS 2 bridge

pub mod bus;
pub mod echo;
pub mod messages;
#[cfg(feature = "ros2")]
pub mod ros;

pub use bus::{MessageBus, TopicPublisher, TopicSubscriber};
pub use echo::write_poses;
pub use messages::{Encoding, Header, ImageMessage, PointMsg, PoseMessage, QuaternionMsg};

use crate::error::Result;
use async_trait::async_trait;

/// Outgoing side of the steering topic.
#[cfg_attr(test, mockall::automock)]
pub trait PosePublisher: Send + Sync {
    fn publish(&self, pose: PoseMessage) -> Result<()>;
}

/// Incoming side of the image topic. `None` means the topic is gone.
#[async_trait]
pub trait ImageSource: Send {
    async fn next_image(&mut self) -> Option<ImageMessage>;
}
