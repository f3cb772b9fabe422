//! Centroid-to-bearing conversion

use crate::intrinsics::CameraIntrinsics;
use serde::{Deserialize, Serialize};

/// Whether a steering estimate carries a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    Found,
    NotFound,
}

impl Validity {
    /// Wire value: 1 for found, -1 for not found.
    pub fn flag(&self) -> f64 {
        match self {
            Validity::Found => 1.0,
            Validity::NotFound => -1.0,
        }
    }
}

/// Published per-frame result. The angle is always 0 when nothing was found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringEstimate {
    angle: f64,
    valid: Validity,
}

impl SteeringEstimate {
    pub fn found(angle: f64) -> Self {
        Self {
            angle,
            valid: Validity::Found,
        }
    }

    pub fn not_found() -> Self {
        Self {
            angle: 0.0,
            valid: Validity::NotFound,
        }
    }

    /// Bearing in radians, positive to the right of the optical axis.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn validity(&self) -> Validity {
        self.valid
    }

    pub fn is_valid(&self) -> bool {
        self.valid == Validity::Found
    }

    pub fn valid_flag(&self) -> f64 {
        self.valid.flag()
    }
}

/// Approximate bearing of a centroid column:
/// `(x - cx) / cx * atan((mask_width / 2) / fx)`.
///
/// The normalized horizontal offset is scaled by a half field of view
/// derived from `fx` and the mask width. Lens distortion is not corrected.
pub fn steering_angle(centroid_x: f64, mask_width: f64, intrinsics: &CameraIntrinsics) -> f64 {
    let half_fov = ((mask_width / 2.0) / intrinsics.fx).atan();
    (centroid_x - intrinsics.cx) / intrinsics.cx * half_fov
}
