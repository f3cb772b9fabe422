//! ROS 2 bridge: sensor_msgs/Image in, geometry_msgs/Pose out

use crate::error::{Result, VisionError};
use crate::transport::{Header, ImageMessage, ImageSource, PosePublisher, PoseMessage};
use async_trait::async_trait;
use futures::stream::StreamExt;
use parking_lot::Mutex;
use r2r::geometry_msgs::msg::{Point, Pose, Quaternion};
use r2r::sensor_msgs::msg::Image;
use r2r::{Context, Node, QosProfile};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SPIN_INTERVAL: Duration = Duration::from_millis(5);

/// One ROS node shared by the image subscription and the pose publisher.
/// The node is spun from a background task for as long as the bridge lives.
pub struct RosBridge {
    node: Arc<Mutex<Node>>,
    spin_handle: JoinHandle<()>,
}

impl RosBridge {
    pub fn new(node_name: &str) -> Result<Self> {
        let ctx = Context::create()
            .map_err(|e| VisionError::Transport(format!("ROS context creation failed: {:?}", e)))?;
        let node = Node::create(ctx, node_name, "")
            .map_err(|e| VisionError::Transport(format!("ROS node creation failed: {:?}", e)))?;

        let node = Arc::new(Mutex::new(node));
        let node_for_spin = Arc::clone(&node);
        let spin_handle = tokio::spawn(async move {
            loop {
                if let Some(mut node) = node_for_spin.try_lock() {
                    node.spin_once(Duration::from_millis(0));
                }
                tokio::time::sleep(SPIN_INTERVAL).await;
            }
        });

        info!("ROS node {} started", node_name);
        Ok(Self { node, spin_handle })
    }

    pub fn pose_publisher(&self, topic: &str, depth: usize) -> Result<RosPosePublisher> {
        let publisher = self
            .node
            .lock()
            .create_publisher::<Pose>(topic, qos(depth))
            .map_err(|e| {
                VisionError::Transport(format!("Publisher on {} failed: {:?}", topic, e))
            })?;
        info!("Publishing steering on {}", topic);
        Ok(RosPosePublisher {
            topic: topic.to_string(),
            publisher: Mutex::new(publisher),
        })
    }

    pub fn image_source(&self, topic: &str, depth: usize) -> Result<RosImageSource> {
        let mut stream = self
            .node
            .lock()
            .subscribe::<Image>(topic, qos(depth))
            .map_err(|e| {
                VisionError::Transport(format!("Subscription to {} failed: {:?}", topic, e))
            })?;

        let (tx, rx) = mpsc::channel(depth.max(1));
        let owned_topic = topic.to_string();
        tokio::spawn(async move {
            while let Some(image) = stream.next().await {
                match tx.try_send(image_from_ros(image)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("Image queue for {} is full, dropping frame", owned_topic);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
            debug!("Image stream for {} ended", owned_topic);
        });

        info!("Subscribed to images on {}", topic);
        Ok(RosImageSource { receiver: rx })
    }
}

impl Drop for RosBridge {
    fn drop(&mut self) {
        self.spin_handle.abort();
    }
}

fn qos(depth: usize) -> QosProfile {
    QosProfile::default().keep_last(depth.max(1))
}

fn image_from_ros(image: Image) -> ImageMessage {
    ImageMessage {
        header: Header {
            stamp_sec: image.header.stamp.sec,
            stamp_nanosec: image.header.stamp.nanosec,
            frame_id: image.header.frame_id,
        },
        height: image.height,
        width: image.width,
        encoding: image.encoding,
        step: image.step,
        data: image.data,
    }
}

fn pose_to_ros(pose: &PoseMessage) -> Pose {
    Pose {
        position: Point {
            x: pose.position.x,
            y: pose.position.y,
            z: pose.position.z,
        },
        orientation: Quaternion {
            x: pose.orientation.x,
            y: pose.orientation.y,
            z: pose.orientation.z,
            w: pose.orientation.w,
        },
    }
}

pub struct RosPosePublisher {
    topic: String,
    publisher: Mutex<r2r::Publisher<Pose>>,
}

impl PosePublisher for RosPosePublisher {
    fn publish(&self, pose: PoseMessage) -> Result<()> {
        self.publisher
            .lock()
            .publish(&pose_to_ros(&pose))
            .map_err(|e| {
                VisionError::Transport(format!("Publish on {} failed: {:?}", self.topic, e))
            })
    }
}

pub struct RosImageSource {
    receiver: mpsc::Receiver<ImageMessage>,
}

#[async_trait]
impl ImageSource for RosImageSource {
    async fn next_image(&mut self) -> Option<ImageMessage> {
        self.receiver.recv().await
    }
}
