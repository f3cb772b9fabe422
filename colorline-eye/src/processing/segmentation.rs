//! HSV color segmentation and largest-region selection

use crate::error::Result;
use crate::processing::color::ColorProfile;
use opencv::{
    core::{self, Mat, Point, Size, Vec4i, Vector},
    imgproc,
    prelude::*,
};
use tracing::debug;

/// Side length of the square structuring element used for opening/closing.
pub const MORPH_KERNEL_SIZE: i32 = 5;

/// Outcome of a single segmentation attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    /// Largest region found, with its bounding-box center (band
    /// coordinates) and contour area.
    Found { centroid: Point, area: f64 },
    NotFound,
}

impl Detection {
    pub fn is_found(&self) -> bool {
        matches!(self, Detection::Found { .. })
    }

    pub fn centroid(&self) -> Option<Point> {
        match self {
            Detection::Found { centroid, .. } => Some(*centroid),
            Detection::NotFound => None,
        }
    }

    pub fn area(&self) -> Option<f64> {
        match self {
            Detection::Found { area, .. } => Some(*area),
            Detection::NotFound => None,
        }
    }
}

impl AsRef<Detection> for Detection {
    fn as_ref(&self) -> &Detection {
        self
    }
}

/// Cleaned binary mask plus the detection derived from it.
#[derive(Debug)]
pub struct Segmentation {
    pub profile: ColorProfile,
    pub mask: Mat,
    pub detection: Detection,
}

impl AsRef<Detection> for Segmentation {
    fn as_ref(&self) -> &Detection {
        &self.detection
    }
}

/// Segments a BGR band by a fixed color profile.
pub struct ColorSegmenter {
    kernel: Mat,
}

impl ColorSegmenter {
    pub fn new() -> Result<Self> {
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_RECT,
            Size::new(MORPH_KERNEL_SIZE, MORPH_KERNEL_SIZE),
            Point::new(-1, -1),
        )?;
        Ok(Self { kernel })
    }

    /// Threshold `band` in HSV space, clean the mask with an opening then a
    /// closing, and pick the contour with the largest area.
    ///
    /// A region only counts as found when its area is strictly positive.
    /// An empty band is not an error; it yields `NotFound`.
    pub fn segment(&self, band: &Mat, profile: ColorProfile) -> Result<Segmentation> {
        if band.rows() == 0 || band.cols() == 0 {
            return Ok(Segmentation {
                profile,
                mask: Mat::default(),
                detection: Detection::NotFound,
            });
        }

        let mut hsv = Mat::default();
        imgproc::cvt_color(band, &mut hsv, imgproc::COLOR_BGR2HSV, 0)?;

        let range = profile.hsv_range();
        let mut raw = Mat::default();
        core::in_range(&hsv, &range.lower_scalar(), &range.upper_scalar(), &mut raw)?;

        let border = imgproc::morphology_default_border_value()?;
        let mut opened = Mat::default();
        imgproc::morphology_ex(
            &raw,
            &mut opened,
            imgproc::MORPH_OPEN,
            &self.kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            border,
        )?;
        let mut mask = Mat::default();
        imgproc::morphology_ex(
            &opened,
            &mut mask,
            imgproc::MORPH_CLOSE,
            &self.kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            border,
        )?;

        let mut contours = Vector::<Vector<Point>>::new();
        let mut hierarchy = Vector::<Vec4i>::new();
        imgproc::find_contours_with_hierarchy(
            &mask,
            &mut contours,
            &mut hierarchy,
            imgproc::RETR_TREE,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        let detection = largest_region(&contours)?;
        debug!(
            "Segmented {} band: {} contours, {:?}",
            profile,
            contours.len(),
            detection
        );

        Ok(Segmentation {
            profile,
            mask,
            detection,
        })
    }
}

/// Pick the largest contour by area. Ties keep the earliest contour.
fn largest_region(contours: &Vector<Vector<Point>>) -> Result<Detection> {
    let mut best: Option<(f64, Vector<Point>)> = None;
    for contour in contours.iter() {
        let area = imgproc::contour_area(&contour, false)?;
        let better = match &best {
            Some((best_area, _)) => area > *best_area,
            None => true,
        };
        if better {
            best = Some((area, contour));
        }
    }

    match best {
        Some((area, contour)) if area > 0.0 => {
            let rect = imgproc::bounding_rect(&contour)?;
            let centroid = Point::new(rect.x + rect.width / 2, rect.y + rect.height / 2);
            Ok(Detection::Found { centroid, area })
        }
        _ => Ok(Detection::NotFound),
    }
}
