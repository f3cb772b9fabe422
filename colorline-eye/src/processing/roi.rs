//! Region-of-interest band extraction

use crate::error::Result;
use opencv::{
    core::{Mat, Rect},
    prelude::*,
};

/// Fraction of the frame height covered by the band.
pub const BAND_FRACTION: f64 = 0.05;

/// Horizontal band of a frame, as a half-open row range spanning the full
/// width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiBand {
    pub start_row: i32,
    pub end_row: i32,
    pub width: i32,
}

impl RoiBand {
    /// Compute the band for a frame of `height` x `width`.
    ///
    /// `line_location` is the band's offset from the bottom edge as a
    /// fraction of the height. Row bounds are
    /// `[h * (1 - line_location - 0.05), h * (1 - line_location))`, truncated
    /// toward zero and clamped to the frame. Out-of-range locations are not
    /// rejected; they produce an empty band.
    pub fn locate(height: i32, width: i32, line_location: f64) -> Self {
        let h = height.max(0) as f64;
        let start = (h * (1.0 - line_location - BAND_FRACTION)) as i32;
        let end = (h * (1.0 - line_location)) as i32;

        let start_row = start.clamp(0, height.max(0));
        let end_row = end.clamp(start_row, height.max(0));

        Self {
            start_row,
            end_row,
            width: width.max(0),
        }
    }

    pub fn height(&self) -> i32 {
        self.end_row - self.start_row
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width == 0
    }

    pub fn rect(&self) -> Rect {
        Rect::new(0, self.start_row, self.width, self.height())
    }
}

/// Copy the band out of `frame`. An empty band yields an empty `Mat`.
pub fn extract_band(frame: &Mat, line_location: f64) -> Result<(RoiBand, Mat)> {
    let band = RoiBand::locate(frame.rows(), frame.cols(), line_location);
    if band.is_empty() {
        return Ok((band, Mat::default()));
    }

    let view = Mat::roi(frame, band.rect())?;
    let owned = view.try_clone()?;
    Ok((band, owned))
}
