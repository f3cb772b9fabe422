//! Line detection stages

pub mod angle;
pub mod color;
pub mod fallback;
pub mod roi;
pub mod segmentation;

pub use angle::{steering_angle, SteeringEstimate, Validity};
pub use color::{ColorProfile, HsvRange};
pub use fallback::{FallbackOutcome, FallbackPolicy, FallbackState};
pub use roi::{extract_band, RoiBand};
pub use segmentation::{ColorSegmenter, Detection, Segmentation};
