//! Camera intrinsics descriptor loading

use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Focal lengths and principal point, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// Radial (k1, k2, k3) and tangential (p1, p2) distortion. Loaded and
/// logged, not applied to detected coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistortionCoefficients {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl DistortionCoefficients {
    /// OpenCV ordering: k1, k2, p1, p2, k3.
    pub fn as_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }
}

/// On-disk layout of the descriptor. All keys are required; unknown keys
/// are ignored.
#[derive(Debug, Deserialize)]
struct CameraParamsFile {
    fx: f64,
    fy: f64,
    x0: f64,
    y0: f64,
    k1: f64,
    k2: f64,
    p1: f64,
    p2: f64,
    k3: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub intrinsics: CameraIntrinsics,
    pub distortion: DistortionCoefficients,
}

impl CameraParams {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: CameraParamsFile = serde_yaml::from_str(content)?;
        Ok(Self {
            intrinsics: CameraIntrinsics {
                fx: raw.fx,
                fy: raw.fy,
                cx: raw.x0,
                cy: raw.y0,
            },
            distortion: DistortionCoefficients {
                k1: raw.k1,
                k2: raw.k2,
                p1: raw.p1,
                p2: raw.p2,
                k3: raw.k3,
            },
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VisionError::Config(format!(
                "Failed to read camera descriptor {}: {}",
                path.display(),
                e
            ))
        })?;
        let params = Self::from_yaml_str(&content).map_err(|e| {
            VisionError::Config(format!(
                "Invalid camera descriptor {}: {}",
                path.display(),
                e
            ))
        })?;

        info!("Camera matrix: {:?}", params.camera_matrix());
        info!("Distortion coefficients: {:?}", params.distortion.as_array());
        Ok(params)
    }

    /// Row-major 3x3 pinhole camera matrix.
    pub fn camera_matrix(&self) -> [[f64; 3]; 3] {
        let k = &self.intrinsics;
        [[k.fx, 0.0, k.cx], [0.0, k.fy, k.cy], [0.0, 0.0, 1.0]]
    }
}

/// Locate the descriptor: absolute names are used as given, relative ones
/// are looked up under `config_dir`.
pub fn resolve_descriptor_path(config_dir: &Path, name: &str) -> PathBuf {
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        config_dir.join(candidate)
    }
}
