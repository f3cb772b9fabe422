//! Live diagnostic preview

use crate::error::Result;
use crate::pipeline::FrameReport;
use opencv::{
    core::{Mat, Point, Scalar, Size},
    highgui, imgproc,
    prelude::*,
};

/// Length of the longer preview edge in pixels.
pub const PREVIEW_EDGE: i32 = 360;
pub const FRAME_WINDOW: &str = "cap";
pub const MASK_WINDOW: &str = "area";
const CENTROID_RADIUS: i32 = 4;
const WAIT_KEY_MS: i32 = 10;

/// Preview dimensions with the longer edge scaled to [`PREVIEW_EDGE`].
pub fn preview_size(width: i32, height: i32) -> Size {
    if width <= 0 || height <= 0 {
        return Size::new(0, 0);
    }
    if height > width {
        let scaled = (width as f64 / height as f64 * PREVIEW_EDGE as f64) as i32;
        Size::new(scaled.max(1), PREVIEW_EDGE)
    } else {
        let scaled = (height as f64 / width as f64 * PREVIEW_EDGE as f64) as i32;
        Size::new(PREVIEW_EDGE, scaled.max(1))
    }
}

/// Copy of `frame` with the band outlined and the centroid marked, at
/// preview size.
pub fn annotate(frame: &Mat, report: &FrameReport) -> Result<Mat> {
    let mut canvas = frame.try_clone()?;

    if !report.band.is_empty() {
        imgproc::rectangle(
            &mut canvas,
            report.band.rect(),
            Scalar::new(0.0, 255.0, 0.0, 0.0),
            1,
            imgproc::LINE_8,
            0,
        )?;
    }

    if let Some(centroid) = report.detection.centroid() {
        imgproc::circle(
            &mut canvas,
            Point::new(centroid.x, centroid.y + report.band.start_row),
            CENTROID_RADIUS,
            Scalar::new(0.0, 0.0, 255.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
    }

    let size = preview_size(canvas.cols(), canvas.rows());
    if size.width == 0 {
        return Ok(canvas);
    }
    let mut resized = Mat::default();
    imgproc::resize(&canvas, &mut resized, size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
    Ok(resized)
}

/// Where annotated frames go.
#[cfg_attr(test, mockall::automock)]
pub trait PreviewSurface {
    fn show(&mut self, frame: &Mat, report: &FrameReport) -> Result<()>;
}

/// OpenCV highgui windows. Must be driven from the main thread.
pub struct HighGuiPreview {
    show_mask: bool,
}

impl HighGuiPreview {
    pub fn new(show_mask: bool) -> Self {
        Self { show_mask }
    }
}

impl PreviewSurface for HighGuiPreview {
    fn show(&mut self, frame: &Mat, report: &FrameReport) -> Result<()> {
        let annotated = annotate(frame, report)?;
        highgui::imshow(FRAME_WINDOW, &annotated)?;
        if self.show_mask && !report.mask.empty() {
            highgui::imshow(MASK_WINDOW, &report.mask)?;
        }
        highgui::wait_key(WAIT_KEY_MS)?;
        Ok(())
    }
}

impl Drop for HighGuiPreview {
    fn drop(&mut self) {
        let _ = highgui::destroy_all_windows();
    }
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct HeadlessPreview;

impl PreviewSurface for HeadlessPreview {
    fn show(&mut self, _frame: &Mat, _report: &FrameReport) -> Result<()> {
        Ok(())
    }
}
