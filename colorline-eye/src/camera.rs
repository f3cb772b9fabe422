//! Local capture device feeding the image topic

use crate::error::{Result, VisionError};
use crate::transport::{Header, ImageMessage, TopicPublisher};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Consecutive read failures tolerated before the stream stops.
pub const MAX_READ_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub index: i32,
    pub resolution: (u32, u32),
    pub frame_rate: u32,
    pub frame_id: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: 0,
            resolution: (640, 480),
            frame_rate: 30,
            frame_id: "camera".to_string(),
        }
    }
}

impl CameraSettings {
    pub fn validate(&self) -> Result<()> {
        if self.index < 0 {
            return Err(VisionError::Camera(format!("Invalid camera index {}", self.index)));
        }
        if self.resolution.0 == 0 || self.resolution.1 == 0 || self.frame_rate == 0 {
            return Err(VisionError::Camera("Invalid camera resolution or frame rate".to_string()));
        }
        Ok(())
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

/// Backoff before retry number `retries`: 200ms doubling up to 5s.
pub fn read_backoff(retries: u32) -> Duration {
    Duration::from_millis((100u64 << retries.min(6)).min(5000))
}

/// Consecutive read failure accounting for the capture loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRetry {
    failures: u32,
    limit: u32,
}

impl ReadRetry {
    pub fn new(limit: u32) -> Self {
        Self { failures: 0, limit }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn succeeded(&mut self) {
        self.failures = 0;
    }

    /// Record a failed read. Returns the delay before the next attempt, or
    /// `None` once `limit` consecutive reads have failed.
    pub fn failed(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.limit {
            None
        } else {
            Some(read_backoff(self.failures))
        }
    }
}

/// Publishes frames from a `VideoCapture` as `bgr8` image messages.
pub struct CameraSource {
    settings: CameraSettings,
    capture: Arc<Mutex<Option<VideoCapture>>>,
    is_running: Arc<RwLock<bool>>,
}

impl CameraSource {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            capture: Arc::new(Mutex::new(None)),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Open the device. A no-op when it is already open.
    pub fn initialize(&self) -> Result<()> {
        self.settings.validate()?;
        let mut guard = self.capture.lock();
        if guard.is_some() {
            return Ok(());
        }
        *guard = Some(open_capture(&self.settings)?);
        Ok(())
    }

    /// Start publishing frames on `publisher` from a background task.
    pub fn start(&self, publisher: TopicPublisher<ImageMessage>) -> Result<JoinHandle<()>> {
        {
            let mut is_running = self.is_running.write();
            if *is_running {
                return Err(VisionError::Camera("Camera stream already running".to_string()));
            }
            *is_running = true;
        }

        if let Err(e) = self.initialize() {
            *self.is_running.write() = false;
            return Err(e);
        }

        let topic = publisher.topic().to_string();
        let settings = self.settings.clone();
        let capture = self.capture.clone();
        let is_running = self.is_running.clone();

        let handle = tokio::spawn(async move {
            let frame_interval = settings.frame_interval();
            let mut retry = ReadRetry::new(MAX_READ_RETRIES);
            let mut sequence = 0u64;

            while *is_running.read() {
                let start = Instant::now();

                let device = capture.clone();
                let grabbed = tokio::task::spawn_blocking(move || read_frame(&device))
                    .await
                    .unwrap_or_else(|e| {
                        Err(VisionError::Camera(format!("Capture task failed: {}", e)))
                    });

                match grabbed {
                    Ok(frame) => {
                        retry.succeeded();
                        match ImageMessage::from_bgr_mat(&frame, stamp_header(&settings.frame_id)) {
                            Ok(message) => {
                                sequence += 1;
                                if publisher.send(message) == 0 {
                                    debug!("Frame {} captured with no subscribers", sequence);
                                }
                            }
                            Err(e) => warn!("Dropping captured frame: {}", e),
                        }
                    }
                    Err(e) => {
                        // Drop the failed handle so the next attempt reopens the device.
                        *capture.lock() = None;
                        let next = retry.failed();
                        error!(
                            "Camera read error ({}/{}): {}",
                            retry.failures(),
                            MAX_READ_RETRIES,
                            e
                        );
                        let Some(delay) = next else {
                            error!("Too many camera read errors, stopping stream");
                            break;
                        };
                        tokio::time::sleep(delay).await;

                        if *is_running.read() {
                            let device = capture.clone();
                            let settings = settings.clone();
                            let reopened = tokio::task::spawn_blocking(move || {
                                reopen_capture(&device, &settings)
                            })
                            .await;
                            match reopened {
                                Ok(Ok(())) => info!("Camera reopened"),
                                Ok(Err(e)) => error!("Failed to reopen camera: {}", e),
                                Err(e) => error!("Camera reopen task failed: {}", e),
                            }
                        }
                        continue;
                    }
                }

                let elapsed = start.elapsed();
                if elapsed < frame_interval {
                    tokio::time::sleep(frame_interval - elapsed).await;
                }
            }

            *is_running.write() = false;
            *capture.lock() = None;
            info!("Camera stream stopped after {} frame(s)", sequence);
        });

        info!("Camera {} streaming on {}", self.settings.index, topic);
        Ok(handle)
    }

    pub fn stop(&self) {
        *self.is_running.write() = false;
        *self.capture.lock() = None;
        info!("Camera {} released", self.settings.index);
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_capture(settings: &CameraSettings) -> Result<VideoCapture> {
    let mut capture = VideoCapture::new(settings.index, CAP_ANY).map_err(|e| {
        VisionError::Camera(format!("Failed to open camera {}: {}", settings.index, e))
    })?;

    if !capture.is_opened()? {
        return Err(VisionError::Camera(format!("Camera {} failed to open", settings.index)));
    }

    capture.set(CAP_PROP_FRAME_WIDTH, settings.resolution.0 as f64)?;
    capture.set(CAP_PROP_FRAME_HEIGHT, settings.resolution.1 as f64)?;
    capture.set(CAP_PROP_FPS, settings.frame_rate as f64)?;

    info!(
        "Camera {} initialized at {}x{} @ {}fps",
        settings.index, settings.resolution.0, settings.resolution.1, settings.frame_rate
    );
    Ok(capture)
}

fn reopen_capture(capture: &Mutex<Option<VideoCapture>>, settings: &CameraSettings) -> Result<()> {
    let mut guard = capture.lock();
    if guard.is_none() {
        *guard = Some(open_capture(settings)?);
    }
    Ok(())
}

fn read_frame(capture: &Mutex<Option<VideoCapture>>) -> Result<Mat> {
    let mut guard = capture.lock();
    let device = guard
        .as_mut()
        .ok_or_else(|| VisionError::Camera("Camera not initialized".to_string()))?;

    let mut frame = Mat::default();
    if !device.read(&mut frame)? || frame.empty() {
        return Err(VisionError::Camera("Camera returned no frame".to_string()));
    }
    Ok(frame)
}

fn stamp_header(frame_id: &str) -> Header {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    Header {
        stamp_sec: now.as_secs() as i32,
        stamp_nanosec: now.subsec_nanos(),
        frame_id: frame_id.to_string(),
    }
}
