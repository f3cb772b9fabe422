//! Error types for colorline-eye

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("OpenCV error: {0}")]
    OpenCv(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::OpenCv(err.message)
    }
}

pub type Result<T> = std::result::Result<T, VisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::Config("missing key fx".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("missing key fx"));
    }

    #[test]
    fn test_vision_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let vision_err: VisionError = io_err.into();
        match vision_err {
            VisionError::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_vision_error_from_yaml() {
        let yaml_err = serde_yaml::from_str::<u32>("not: [a number").unwrap_err();
        let vision_err: VisionError = yaml_err.into();
        assert!(matches!(vision_err, VisionError::Yaml(_)));
    }

    #[test]
    fn test_vision_error_from_opencv() {
        let cv_err = opencv::Error::new(opencv::core::StsBadArg, "bad roi".to_string());
        let vision_err: VisionError = cv_err.into();
        match vision_err {
            VisionError::OpenCv(msg) => assert_eq!(msg, "bad roi"),
            _ => panic!("Expected OpenCv error"),
        }
    }
}
