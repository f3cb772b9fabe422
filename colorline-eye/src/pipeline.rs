//! Per-frame detection pipeline

use crate::config::DetectorConfig;
use crate::error::Result;
use crate::processing::{
    extract_band, steering_angle, ColorProfile, ColorSegmenter, Detection, FallbackPolicy,
    RoiBand, SteeringEstimate,
};
use opencv::{core::Mat, prelude::*};
use tracing::debug;

/// Everything computed for one frame. The mask is kept for the preview.
#[derive(Debug)]
pub struct FrameReport {
    pub estimate: SteeringEstimate,
    pub band: RoiBand,
    pub detection: Detection,
    /// Profile of the attempt that produced `detection`
    pub profile: ColorProfile,
    pub attempts: u8,
    pub mask: Mat,
}

/// Runs band extraction, segmentation with fallback and angle estimation.
pub struct FrameProcessor {
    config: DetectorConfig,
    segmenter: ColorSegmenter,
    policy: FallbackPolicy,
}

impl FrameProcessor {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        Ok(Self {
            config,
            segmenter: ColorSegmenter::new()?,
            policy: FallbackPolicy::new(config.profile),
        })
    }

    /// Process one BGR frame.
    pub fn process(&self, frame: &Mat) -> Result<FrameReport> {
        let (band, roi) = extract_band(frame, self.config.line_location)?;
        let outcome = self
            .policy
            .run(|profile| self.segmenter.segment(&roi, profile))?;

        let detection = outcome.result.detection;
        let estimate = match detection {
            Detection::Found { centroid, .. } => SteeringEstimate::found(steering_angle(
                centroid.x as f64,
                band.width as f64,
                &self.config.intrinsics,
            )),
            Detection::NotFound => SteeringEstimate::not_found(),
        };

        debug!(
            "Band rows {}..{}: {:?} via {} after {} attempt(s), angle {:.4}",
            band.start_row,
            band.end_row,
            detection,
            outcome.profile,
            outcome.attempts,
            estimate.angle()
        );

        Ok(FrameReport {
            estimate,
            band,
            detection,
            profile: outcome.profile,
            attempts: outcome.attempts,
            mask: outcome.result.mask,
        })
    }
}

/// One-shot form of [`FrameProcessor::process`] returning only the estimate.
pub fn process_frame(frame: &Mat, config: &DetectorConfig) -> Result<SteeringEstimate> {
    let processor = FrameProcessor::new(*config)?;
    Ok(processor.process(frame)?.estimate)
}
