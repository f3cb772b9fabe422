//! colorline-eye: color line perception for line-following robots
//!
//! Isolates a thin horizontal band of each camera frame, segments pixels of
//! a configured color (falling back to black), picks the largest region and
//! turns its centroid into a steering angle with a pinhole camera model.
//!
//! The node reads images from a topic and publishes one pose-shaped steering
//! record per frame, either on the in-process bus or, with the `ros2`
//! feature, on ROS 2 topics.

pub mod camera;
pub mod config;
pub mod error;
pub mod intrinsics;
pub mod node;
pub mod pipeline;
pub mod preview;
pub mod processing;
pub mod transport;

pub use camera::{CameraSettings, CameraSource};
pub use config::{DetectorConfig, NodeConfig};
pub use error::{Result, VisionError};
pub use intrinsics::{CameraIntrinsics, CameraParams, DistortionCoefficients};
pub use node::ColorLineNode;
pub use pipeline::{process_frame, FrameProcessor, FrameReport};
pub use preview::{HeadlessPreview, HighGuiPreview, PreviewSurface};
pub use processing::{ColorProfile, Detection, RoiBand, SteeringEstimate};
pub use transport::{ImageMessage, MessageBus, PoseMessage};
