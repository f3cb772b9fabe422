//! Color-line node: image topic in, steering pose out

use crate::config::DetectorConfig;
use crate::error::Result;
use crate::pipeline::FrameProcessor;
use crate::preview::PreviewSurface;
use crate::processing::{ColorProfile, SteeringEstimate};
use crate::transport::{ImageMessage, ImageSource, PosePublisher};
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Handles one image at a time: decode, detect, publish, preview.
pub struct ColorLineNode {
    processor: FrameProcessor,
    publisher: Box<dyn PosePublisher>,
    preview: Box<dyn PreviewSurface>,
    frames: u64,
}

impl ColorLineNode {
    pub fn new(
        config: DetectorConfig,
        publisher: Box<dyn PosePublisher>,
        preview: Box<dyn PreviewSurface>,
    ) -> Result<Self> {
        info!(
            "Detecting {} line at location {} (fallback {})",
            config.profile,
            config.line_location,
            ColorProfile::DEFAULT
        );
        Ok(Self {
            processor: FrameProcessor::new(config)?,
            publisher,
            preview,
            frames: 0,
        })
    }

    pub fn frames_handled(&self) -> u64 {
        self.frames
    }

    /// Process one image message. Exactly one pose is published for every
    /// call; failures publish the not-found estimate.
    pub fn handle_image(&mut self, message: &ImageMessage) -> SteeringEstimate {
        self.frames += 1;

        let frame = match message.to_bgr_mat() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Frame {}: cannot decode image: {}", self.frames, e);
                return self.publish(SteeringEstimate::not_found());
            }
        };

        let report = match self.processor.process(&frame) {
            Ok(report) => report,
            Err(e) => {
                error!("Frame {}: detection failed: {}", self.frames, e);
                return self.publish(SteeringEstimate::not_found());
            }
        };

        let estimate = self.publish(report.estimate);

        if let Err(e) = self.preview.show(&frame, &report) {
            debug!("Preview failed: {}", e);
        }

        estimate
    }

    fn publish(&self, estimate: SteeringEstimate) -> SteeringEstimate {
        if let Err(e) = self.publisher.publish(estimate.to_pose()) {
            warn!("Failed to publish steering estimate: {}", e);
        }
        estimate
    }

    /// Handle images from `source` until it closes or `shutdown` resolves.
    /// Returns the number of frames handled.
    pub async fn spin<S, F>(&mut self, source: &mut S, shutdown: F) -> u64
    where
        S: ImageSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let start = self.frames;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                image = source.next_image() => match image {
                    Some(message) => {
                        self.handle_image(&message);
                    }
                    None => {
                        warn!("Image topic closed");
                        break;
                    }
                },
            }
        }

        let handled = self.frames - start;
        info!("Node stopped after {} frame(s)", handled);
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisionError;
    use crate::intrinsics::CameraIntrinsics;
    use crate::preview::{HeadlessPreview, MockPreviewSurface};
    use crate::transport::{Header, MessageBus, MockPosePublisher, PoseMessage};
    use opencv::core::{Mat, Rect, Scalar, CV_8UC3};
    use opencv::imgproc;

    fn detector() -> DetectorConfig {
        DetectorConfig::new(
            0.5,
            ColorProfile::Black,
            CameraIntrinsics {
                fx: 400.0,
                fy: 400.0,
                cx: 160.0,
                cy: 120.0,
            },
        )
    }

    fn image_with_line() -> ImageMessage {
        let mut frame =
            Mat::new_rows_cols_with_default(400, 320, CV_8UC3, Scalar::all(255.0)).unwrap();
        imgproc::rectangle(
            &mut frame,
            Rect::new(200, 150, 40, 100),
            Scalar::all(0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        ImageMessage::from_bgr_mat(&frame, Header::default()).unwrap()
    }

    #[test]
    fn test_found_line_published_once() {
        let mut publisher = MockPosePublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .withf(|pose: &PoseMessage| pose.valid_flag() == 1.0 && pose.angle() > 0.0)
            .returning(|_| Ok(()));

        let mut preview = MockPreviewSurface::new();
        preview.expect_show().times(1).returning(|_, _| Ok(()));

        let mut node =
            ColorLineNode::new(detector(), Box::new(publisher), Box::new(preview)).unwrap();
        let estimate = node.handle_image(&image_with_line());
        assert!(estimate.is_valid());
    }

    #[test]
    fn test_undecodable_image_publishes_not_found() {
        let mut publisher = MockPosePublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .withf(|pose: &PoseMessage| pose.valid_flag() == -1.0 && pose.angle() == 0.0)
            .returning(|_| Ok(()));

        let mut preview = MockPreviewSurface::new();
        preview.expect_show().times(0);

        let mut node =
            ColorLineNode::new(detector(), Box::new(publisher), Box::new(preview)).unwrap();
        let mut message = image_with_line();
        message.data.truncate(16);
        assert!(!node.handle_image(&message).is_valid());
    }

    #[test]
    fn test_preview_failure_ignored() {
        let mut publisher = MockPosePublisher::new();
        publisher.expect_publish().times(1).returning(|_| Ok(()));

        let mut preview = MockPreviewSurface::new();
        preview
            .expect_show()
            .returning(|_, _| Err(VisionError::OpenCv("no display".to_string())));

        let mut node =
            ColorLineNode::new(detector(), Box::new(publisher), Box::new(preview)).unwrap();
        assert!(node.handle_image(&image_with_line()).is_valid());
        assert_eq!(node.frames_handled(), 1);
    }

    #[tokio::test]
    async fn test_spin_until_topic_closes() {
        let output = MessageBus::new(10);
        let mut poses = output.subscribe::<PoseMessage>("/angle").unwrap();
        let publisher = output.publisher::<PoseMessage>("/angle").unwrap();

        let input = MessageBus::new(10);
        let mut images = input.subscribe::<ImageMessage>("/image").unwrap();
        let image_publisher = input.publisher::<ImageMessage>("/image").unwrap();
        image_publisher.send(image_with_line());
        image_publisher.send(ImageMessage::default());
        drop(image_publisher);
        drop(input);

        let mut node =
            ColorLineNode::new(detector(), Box::new(publisher), Box::new(HeadlessPreview)).unwrap();
        let handled = node.spin(&mut images, std::future::pending()).await;
        assert_eq!(handled, 2);

        let first = poses.recv().await.unwrap();
        assert_eq!(first.valid_flag(), 1.0);
        let second = poses.recv().await.unwrap();
        assert_eq!(second.valid_flag(), -1.0);
    }

    #[tokio::test]
    async fn test_spin_stops_on_shutdown() {
        let input = MessageBus::new(10);
        let mut images = input.subscribe::<ImageMessage>("/image").unwrap();

        let mut publisher = MockPosePublisher::new();
        publisher.expect_publish().times(0);

        let mut node =
            ColorLineNode::new(detector(), Box::new(publisher), Box::new(HeadlessPreview)).unwrap();
        let handled = node.spin(&mut images, async {}).await;
        assert_eq!(handled, 0);
    }
}
