//! Fixed HSV color profiles used for line segmentation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive HSV bounds. Hue is on OpenCV's 0-180 scale, saturation and
/// value on 0-255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn lower_scalar(&self) -> opencv::core::Scalar {
        opencv::core::Scalar::new(
            self.lower[0] as f64,
            self.lower[1] as f64,
            self.lower[2] as f64,
            0.0,
        )
    }

    pub fn upper_scalar(&self) -> opencv::core::Scalar {
        opencv::core::Scalar::new(
            self.upper[0] as f64,
            self.upper[1] as f64,
            self.upper[2] as f64,
            0.0,
        )
    }
}

/// Line colors the segmenter knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorProfile {
    #[default]
    Black,
    Red,
    Yellow,
    Green,
    Blue,
}

impl ColorProfile {
    pub const ALL: [ColorProfile; 5] = [
        ColorProfile::Black,
        ColorProfile::Red,
        ColorProfile::Yellow,
        ColorProfile::Green,
        ColorProfile::Blue,
    ];

    /// Profile used when the configured color finds nothing.
    pub const DEFAULT: ColorProfile = ColorProfile::Black;

    /// Resolve a configured color name. Names are matched exactly; anything
    /// unrecognized resolves to black.
    pub fn from_name(name: &str) -> Self {
        Self::lookup(name).unwrap_or(Self::DEFAULT)
    }

    /// Exact-name lookup without the black fallback.
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "black" => Some(ColorProfile::Black),
            "red" => Some(ColorProfile::Red),
            "yellow" => Some(ColorProfile::Yellow),
            "green" => Some(ColorProfile::Green),
            "blue" => Some(ColorProfile::Blue),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorProfile::Black => "black",
            ColorProfile::Red => "red",
            ColorProfile::Yellow => "yellow",
            ColorProfile::Green => "green",
            ColorProfile::Blue => "blue",
        }
    }

    pub fn hsv_range(&self) -> HsvRange {
        match self {
            ColorProfile::Black => HsvRange::new([0, 0, 0], [180, 255, 46]),
            ColorProfile::Red => HsvRange::new([0, 43, 46], [10, 255, 255]),
            ColorProfile::Yellow => HsvRange::new([26, 43, 46], [34, 255, 255]),
            ColorProfile::Green => HsvRange::new([35, 43, 46], [77, 255, 255]),
            ColorProfile::Blue => HsvRange::new([100, 43, 46], [124, 255, 255]),
        }
    }
}

impl fmt::Display for ColorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_resolve() {
        for profile in ColorProfile::ALL {
            assert_eq!(ColorProfile::from_name(profile.name()), profile);
        }
    }

    #[test]
    fn test_unknown_name_is_black() {
        assert_eq!(ColorProfile::from_name("purple"), ColorProfile::Black);
        assert_eq!(ColorProfile::from_name(""), ColorProfile::Black);
        // Matching is exact, like the parameter strings it comes from.
        assert_eq!(ColorProfile::from_name("Red"), ColorProfile::Black);
        assert_eq!(ColorProfile::from_name("purple").hsv_range(), ColorProfile::Black.hsv_range());
    }

    #[test]
    fn test_lookup_reports_unknown() {
        assert_eq!(ColorProfile::lookup("green"), Some(ColorProfile::Green));
        assert_eq!(ColorProfile::lookup("orange"), None);
    }

    #[test]
    fn test_hsv_table() {
        assert_eq!(ColorProfile::Black.hsv_range(), HsvRange::new([0, 0, 0], [180, 255, 46]));
        assert_eq!(ColorProfile::Red.hsv_range(), HsvRange::new([0, 43, 46], [10, 255, 255]));
        assert_eq!(ColorProfile::Yellow.hsv_range(), HsvRange::new([26, 43, 46], [34, 255, 255]));
        assert_eq!(ColorProfile::Green.hsv_range(), HsvRange::new([35, 43, 46], [77, 255, 255]));
        assert_eq!(ColorProfile::Blue.hsv_range(), HsvRange::new([100, 43, 46], [124, 255, 255]));
    }

    #[test]
    fn test_scalars_match_bounds() {
        let blue = ColorProfile::Blue.hsv_range();
        assert_eq!(blue.lower_scalar()[0], 100.0);
        assert_eq!(blue.upper_scalar()[0], 124.0);
        assert_eq!(blue.upper_scalar()[2], 255.0);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ColorProfile::Yellow).unwrap();
        assert_eq!(json, "\"yellow\"");
        let parsed: ColorProfile = serde_json::from_str("\"blue\"").unwrap();
        assert_eq!(parsed, ColorProfile::Blue);
    }
}
