//! Wire-level message shapes for the image input and steering output

use crate::error::{Result, VisionError};
use crate::processing::SteeringEstimate;
use opencv::{
    core::{Mat, Scalar, CV_8UC3},
    imgproc,
    prelude::*,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp_sec: i32,
    pub stamp_nanosec: u32,
    pub frame_id: String,
}

/// Raw camera image. `step` is the row length in bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMessage {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub encoding: String,
    pub step: u32,
    pub data: Vec<u8>,
}

/// Pixel layouts accepted on the input topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Bgr8,
    Rgb8,
    Bgra8,
    Rgba8,
    Mono8,
    /// Packed 4:2:2 in UYVY byte order, two bytes per pixel.
    Yuv422,
}

impl Encoding {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bgr8" => Some(Encoding::Bgr8),
            "rgb8" => Some(Encoding::Rgb8),
            "bgra8" => Some(Encoding::Bgra8),
            "rgba8" => Some(Encoding::Rgba8),
            "mono8" => Some(Encoding::Mono8),
            "yuv422" => Some(Encoding::Yuv422),
            _ => None,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Encoding::Bgr8 | Encoding::Rgb8 => 3,
            Encoding::Bgra8 | Encoding::Rgba8 => 4,
            Encoding::Yuv422 => 2,
            Encoding::Mono8 => 1,
        }
    }

    fn mat_type(&self) -> i32 {
        match self {
            Encoding::Bgr8 | Encoding::Rgb8 => opencv::core::CV_8UC3,
            Encoding::Bgra8 | Encoding::Rgba8 => opencv::core::CV_8UC4,
            Encoding::Yuv422 => opencv::core::CV_8UC2,
            Encoding::Mono8 => opencv::core::CV_8UC1,
        }
    }

    fn to_bgr_code(&self) -> Option<i32> {
        match self {
            Encoding::Bgr8 => None,
            Encoding::Rgb8 => Some(imgproc::COLOR_RGB2BGR),
            Encoding::Bgra8 => Some(imgproc::COLOR_BGRA2BGR),
            Encoding::Rgba8 => Some(imgproc::COLOR_RGBA2BGR),
            Encoding::Mono8 => Some(imgproc::COLOR_GRAY2BGR),
            Encoding::Yuv422 => Some(imgproc::COLOR_YUV2BGR_UYVY),
        }
    }
}

impl ImageMessage {
    /// Decode into an owned 3-channel BGR `Mat`.
    pub fn to_bgr_mat(&self) -> Result<Mat> {
        let encoding = Encoding::parse(&self.encoding).ok_or_else(|| {
            VisionError::Image(format!("Unsupported encoding: {}", self.encoding))
        })?;

        if encoding == Encoding::Yuv422 && self.width % 2 != 0 {
            return Err(VisionError::Image(format!(
                "yuv422 needs an even width, got {}",
                self.width
            )));
        }

        let rows = i32::try_from(self.height)
            .map_err(|_| VisionError::Image(format!("Image height too large: {}", self.height)))?;
        let cols = i32::try_from(self.width)
            .map_err(|_| VisionError::Image(format!("Image width too large: {}", self.width)))?;

        let row_bytes = (self.width as usize)
            .checked_mul(encoding.channels())
            .ok_or_else(|| VisionError::Image("Row size overflow".to_string()))?;
        let step = if self.step == 0 { row_bytes } else { self.step as usize };
        if step < row_bytes {
            return Err(VisionError::Image(format!(
                "Row step {} shorter than {} bytes of pixels",
                step, row_bytes
            )));
        }

        let needed = match self.height as usize {
            0 => 0,
            h => step
                .checked_mul(h - 1)
                .and_then(|n| n.checked_add(row_bytes))
                .ok_or_else(|| VisionError::Image("Image size overflow".to_string()))?,
        };
        if self.data.len() < needed {
            return Err(VisionError::Image(format!(
                "Image payload has {} bytes, expected at least {} ({}x{} {})",
                self.data.len(),
                needed,
                self.width,
                self.height,
                self.encoding
            )));
        }

        let mut raw =
            Mat::new_rows_cols_with_default(rows, cols, encoding.mat_type(), Scalar::all(0.0))?;
        if row_bytes > 0 {
            let dst = raw.data_bytes_mut()?;
            for (dst_row, src_row) in dst.chunks_exact_mut(row_bytes).zip(self.data.chunks(step)) {
                dst_row.copy_from_slice(&src_row[..row_bytes]);
            }
        }

        match encoding.to_bgr_code() {
            None => Ok(raw),
            Some(code) => {
                let mut bgr = Mat::default();
                imgproc::cvt_color(&raw, &mut bgr, code, 0)?;
                Ok(bgr)
            }
        }
    }

    /// Encode a BGR `Mat` as a `bgr8` message.
    pub fn from_bgr_mat(frame: &Mat, header: Header) -> Result<Self> {
        if frame.typ() != CV_8UC3 {
            return Err(VisionError::Image(format!(
                "Expected an 8-bit 3-channel frame, got type {}",
                frame.typ()
            )));
        }

        let continuous;
        let source = if frame.is_continuous() {
            frame
        } else {
            continuous = frame.try_clone()?;
            &continuous
        };

        Ok(Self {
            header,
            height: source.rows() as u32,
            width: source.cols() as u32,
            encoding: "bgr8".to_string(),
            step: (source.cols() * 3) as u32,
            data: source.data_bytes()?.to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuaternionMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Pose-shaped steering record: `position.x` is the angle (0 when nothing
/// was found), `position.y` the validity flag. The remaining fields are
/// reserved and always zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseMessage {
    pub position: PointMsg,
    pub orientation: QuaternionMsg,
}

impl PoseMessage {
    pub fn angle(&self) -> f64 {
        self.position.x
    }

    pub fn valid_flag(&self) -> f64 {
        self.position.y
    }
}

impl SteeringEstimate {
    pub fn to_pose(&self) -> PoseMessage {
        PoseMessage {
            position: PointMsg {
                x: self.angle(),
                y: self.valid_flag(),
                z: 0.0,
            },
            orientation: QuaternionMsg::default(),
        }
    }
}

impl From<SteeringEstimate> for PoseMessage {
    fn from(estimate: SteeringEstimate) -> Self {
        estimate.to_pose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Vec3b;

    fn message(width: u32, height: u32, encoding: &str, pixel: &[u8]) -> ImageMessage {
        let data = pixel.repeat((width * height) as usize);
        ImageMessage {
            header: Header::default(),
            height,
            width,
            encoding: encoding.to_string(),
            step: width * pixel.len() as u32,
            data,
        }
    }

    #[test]
    fn test_bgr8_decodes_as_is() {
        let mat = message(4, 3, "bgr8", &[1, 2, 3]).to_bgr_mat().unwrap();
        assert_eq!(mat.rows(), 3);
        assert_eq!(mat.cols(), 4);
        assert_eq!(*mat.at_2d::<Vec3b>(2, 3).unwrap(), Vec3b::from([1, 2, 3]));
    }

    #[test]
    fn test_rgb8_is_swapped() {
        let mat = message(2, 2, "rgb8", &[10, 20, 30]).to_bgr_mat().unwrap();
        assert_eq!(*mat.at_2d::<Vec3b>(0, 0).unwrap(), Vec3b::from([30, 20, 10]));
    }

    #[test]
    fn test_mono8_expands() {
        let mat = message(2, 2, "mono8", &[77]).to_bgr_mat().unwrap();
        assert_eq!(mat.typ(), CV_8UC3);
        assert_eq!(*mat.at_2d::<Vec3b>(1, 1).unwrap(), Vec3b::from([77, 77, 77]));
    }

    #[test]
    fn test_padded_rows() {
        let mut msg = message(2, 2, "bgr8", &[5, 6, 7]);
        // Pad each row with two junk bytes.
        msg.step = 8;
        msg.data = vec![5, 6, 7, 5, 6, 7, 0xAA, 0xAA, 1, 2, 3, 1, 2, 3, 0xAA, 0xAA];
        let mat = msg.to_bgr_mat().unwrap();
        assert_eq!(*mat.at_2d::<Vec3b>(1, 1).unwrap(), Vec3b::from([1, 2, 3]));
    }

    #[test]
    fn test_short_payload_rejected() {
        let mut msg = message(4, 4, "bgr8", &[0, 0, 0]);
        msg.data.truncate(10);
        assert!(matches!(msg.to_bgr_mat(), Err(VisionError::Image(_))));
    }

    #[test]
    fn test_yuv422_neutral_chroma_is_gray() {
        let mat = message(4, 2, "yuv422", &[128, 128]).to_bgr_mat().unwrap();
        assert_eq!(mat.typ(), CV_8UC3);
        assert_eq!(mat.cols(), 4);
        let pixel = *mat.at_2d::<Vec3b>(1, 3).unwrap();
        for channel in pixel.0 {
            assert!((channel as i32 - 128).abs() <= 1, "got {:?}", pixel);
        }
    }

    #[test]
    fn test_yuv422_odd_width_rejected() {
        let msg = message(3, 2, "yuv422", &[128, 128]);
        assert!(matches!(msg.to_bgr_mat(), Err(VisionError::Image(_))));
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let msg = message(2, 2, "bayer_rggb8", &[0]);
        let err = msg.to_bgr_mat().unwrap_err();
        assert!(err.to_string().contains("bayer_rggb8"));
    }

    #[test]
    fn test_encode_bgr_mat() {
        let frame =
            Mat::new_rows_cols_with_default(3, 5, CV_8UC3, Scalar::new(9.0, 8.0, 7.0, 0.0))
                .unwrap();
        let msg = ImageMessage::from_bgr_mat(&frame, Header::default()).unwrap();
        assert_eq!(msg.encoding, "bgr8");
        assert_eq!(msg.step, 15);
        assert_eq!(msg.data.len(), 45);
        assert_eq!(&msg.data[..3], &[9, 8, 7]);
    }

    #[test]
    fn test_pose_mapping() {
        let pose = SteeringEstimate::found(0.12).to_pose();
        assert_eq!(pose.angle(), 0.12);
        assert_eq!(pose.valid_flag(), 1.0);
        assert_eq!(pose.position.z, 0.0);
        assert_eq!(pose.orientation, QuaternionMsg::default());

        let missing: PoseMessage = SteeringEstimate::not_found().into();
        assert_eq!(missing.angle(), 0.0);
        assert_eq!(missing.valid_flag(), -1.0);
    }
}
