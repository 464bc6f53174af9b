use crate::config::CameraConfig;
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Which physical camera a stream is requested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, pointed at the user
    User,
    /// Rear camera, pointed at the scene
    Environment,
}

impl FacingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Already JPEG encoded
    Mjpeg,
    /// Packed 8-bit RGB
    Rgb24,
}

/// A single raw frame from a media stream
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub id: u64,
    pub timestamp: SystemTime,
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl VideoFrame {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// A live stream from one camera. Dropping the stream releases the device.
#[async_trait]
pub trait MediaStream: Send {
    fn facing(&self) -> FacingMode;

    /// Wait for the next frame
    async fn next_frame(&mut self) -> Result<VideoFrame>;

    /// Stop every track and release the device
    fn stop_tracks(&mut self);

    fn is_live(&self) -> bool;
}

/// Something that can hand out camera streams
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>>;
}

/// Camera that renders a moving gradient instead of talking to hardware.
///
/// Only one stream may be live at a time; opening a second stream while the
/// first is live fails as a busy device would.
#[derive(Clone)]
pub struct SyntheticCamera {
    config: CameraConfig,
    frame_counter: Arc<AtomicU64>,
    live: Arc<AtomicBool>,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        info!(
            "Initializing synthetic camera ({}x{} @ {}fps)",
            config.resolution.0, config.resolution.1, config.fps
        );

        Self {
            config,
            frame_counter: Arc::new(AtomicU64::new(0)),
            live: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether any stream from this camera is currently live
    pub fn has_live_stream(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
}

#[async_trait]
impl CameraDevice for SyntheticCamera {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>> {
        if self.config.deny_permission {
            warn!("Camera permission denied ({} facing)", facing.as_str());
            return Err(ScanError::PermissionDenied {
                device: format!("{} camera", facing.as_str()),
            });
        }

        if self
            .live
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ScanError::component(
                "camera".to_string(),
                format!("device busy, cannot open {} stream", facing.as_str()),
            ));
        }

        let period = frame_period(self.config.fps);
        let mut pacing = interval(period);
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!("Opened synthetic {} stream", facing.as_str());

        Ok(Box::new(SyntheticStream {
            facing,
            resolution: self.config.resolution,
            frame_counter: Arc::clone(&self.frame_counter),
            live: Arc::clone(&self.live),
            stopped: false,
            pacing,
        }))
    }
}

/// Time between frames, never shorter than a millisecond
fn frame_period(fps: u32) -> Duration {
    Duration::from_micros(1_000_000 / fps.max(1) as u64).max(Duration::from_millis(1))
}

struct SyntheticStream {
    facing: FacingMode,
    resolution: (u32, u32),
    frame_counter: Arc<AtomicU64>,
    live: Arc<AtomicBool>,
    stopped: bool,
    pacing: Interval,
}

impl SyntheticStream {
    fn render(&self, frame_id: u64) -> Vec<u8> {
        let (width, height) = self.resolution;
        let shift = (frame_id % 256) as u32;
        let mut data = Vec::with_capacity((width * height * 3) as usize);

        for y in 0..height {
            for x in 0..width {
                data.push(((x + shift) % 256) as u8);
                data.push(((y + shift) % 256) as u8);
                data.push(((x + y) % 256) as u8);
            }
        }

        data
    }
}

#[async_trait]
impl MediaStream for SyntheticStream {
    fn facing(&self) -> FacingMode {
        self.facing
    }

    async fn next_frame(&mut self) -> Result<VideoFrame> {
        if self.stopped {
            return Err(ScanError::component("camera", "stream already stopped"));
        }

        self.pacing.tick().await;

        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let (width, height) = self.resolution;
        let data = self.render(frame_id);

        trace!(
            "Generated synthetic frame {} ({}x{}, {} bytes)",
            frame_id,
            width,
            height,
            data.len()
        );

        Ok(VideoFrame::new(
            frame_id,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Rgb24,
        ))
    }

    fn stop_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live.store(false, Ordering::Release);
            debug!("Stopped synthetic {} stream", self.facing.as_str());
        }
    }

    fn is_live(&self) -> bool {
        !self.stopped
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
