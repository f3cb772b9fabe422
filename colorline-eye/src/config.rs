//! Configuration for colorline-eye

use crate::error::{Result, VisionError};
use crate::intrinsics::{resolve_descriptor_path, CameraIntrinsics, CameraParams};
use crate::processing::ColorProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_SUBSCRIBER: &str = "/prometheus/camera/rgb/image_raw";
pub const DEFAULT_PUBLISHER: &str = "/prometheus/vision/color_line_angle";
pub const DEFAULT_DESCRIPTOR: &str = "camera_param.yaml";
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Node parameters, read once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Input image topic
    pub subscriber: String,
    /// Output steering topic
    pub publisher: String,
    /// Camera descriptor file name
    pub config: String,
    /// Directory relative descriptor names are resolved against
    pub config_dir: PathBuf,
    /// Band offset from the bottom edge, as a fraction of the frame height
    pub line_location: f64,
    /// Line color name; unknown names mean black
    pub line_color: String,
    /// Outgoing queue depth
    pub queue_depth: usize,
    /// Show the live preview window
    pub preview: bool,
    /// Also show the cleaned mask of the band
    pub show_mask: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            subscriber: DEFAULT_SUBSCRIBER.to_string(),
            publisher: DEFAULT_PUBLISHER.to_string(),
            config: DEFAULT_DESCRIPTOR.to_string(),
            config_dir: PathBuf::from("config"),
            line_location: 0.5,
            line_color: "black".to_string(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            preview: true,
            show_mask: false,
        }
    }
}

impl NodeConfig {
    /// Load parameters from a JSON, TOML or YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse parameters, trying JSON, then TOML, then YAML.
    pub fn from_str(content: &str) -> Result<Self> {
        if let Ok(config) = serde_json::from_str::<NodeConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = toml::from_str::<NodeConfig>(content) {
            return Ok(config);
        }

        serde_yaml::from_str::<NodeConfig>(content)
            .map_err(|e| VisionError::Config(format!("Unrecognized parameter file: {}", e)))
    }

    /// Check the parameters that would make the node unusable.
    /// `line_location` is intentionally left unchecked.
    pub fn validate(&self) -> Result<()> {
        if self.subscriber.trim().is_empty() {
            return Err(VisionError::Config("Subscriber topic must not be empty".to_string()));
        }

        if self.publisher.trim().is_empty() {
            return Err(VisionError::Config("Publisher topic must not be empty".to_string()));
        }

        if self.config.trim().is_empty() {
            return Err(VisionError::Config("Camera descriptor name must not be empty".to_string()));
        }

        if self.queue_depth == 0 {
            return Err(VisionError::Config("Queue depth must be at least 1".to_string()));
        }

        Ok(())
    }

    pub fn descriptor_path(&self) -> PathBuf {
        resolve_descriptor_path(&self.config_dir, &self.config)
    }

    /// Resolved line color. Unknown names resolve to black.
    pub fn profile(&self) -> ColorProfile {
        ColorProfile::from_name(&self.line_color)
    }
}

/// Immutable detector settings shared by every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    pub line_location: f64,
    pub profile: ColorProfile,
    pub intrinsics: CameraIntrinsics,
}

impl DetectorConfig {
    pub fn new(line_location: f64, profile: ColorProfile, intrinsics: CameraIntrinsics) -> Self {
        Self {
            line_location,
            profile,
            intrinsics,
        }
    }

    /// Build from node parameters and a loaded descriptor.
    pub fn from_node(node: &NodeConfig, params: &CameraParams) -> Self {
        if ColorProfile::lookup(&node.line_color).is_none() {
            warn!(
                "Unrecognized line color '{}', detecting {}",
                node.line_color,
                ColorProfile::DEFAULT
            );
        }
        Self::new(node.line_location, node.profile(), params.intrinsics)
    }
}
