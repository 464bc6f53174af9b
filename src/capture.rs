//! Still-photo capture for profile registration.
//!
//! Independent of the decoder: acquires its own stream (user-facing by
//! default), grabs one frame, encodes it as a JPEG data URL and releases the
//! device straight away.

use crate::camera::{CameraDevice, FacingMode, FrameFormat, MediaStream, VideoFrame};
use crate::config::CaptureConfig;
use crate::error::{Result, ScanError};
use crate::profile::Photo;
use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the capture helper currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No stream, no photo
    Idle,
    /// Stream is live and waiting for a still
    Previewing,
    /// A photo was taken and the stream released
    Captured,
}

pub struct CaptureHelper {
    config: CaptureConfig,
    camera: Arc<dyn CameraDevice>,
    stream: Option<Box<dyn MediaStream>>,
    photo: Option<Photo>,
}

impl CaptureHelper {
    pub fn new(config: CaptureConfig, camera: Arc<dyn CameraDevice>) -> Self {
        Self {
            config,
            camera,
            stream: None,
            photo: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        if self.stream.is_some() {
            CaptureState::Previewing
        } else if self.photo.is_some() {
            CaptureState::Captured
        } else {
            CaptureState::Idle
        }
    }

    pub fn facing(&self) -> FacingMode {
        self.config.facing
    }

    /// Acquire the preview stream. A permission failure leaves nothing held.
    pub async fn start(&mut self) -> Result<()> {
        self.release_stream();

        let stream = self.camera.open(self.config.facing).await.map_err(|e| {
            warn!("Could not open {} camera: {}", self.config.facing.as_str(), e);
            e
        })?;

        info!("Photo preview started ({} camera)", self.config.facing.as_str());
        self.stream = Some(stream);
        Ok(())
    }

    /// Grab one frame, encode it and release the stream
    pub async fn take_photo(&mut self) -> Result<Photo> {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| ScanError::component("capture", "no preview stream to capture from"))?;

        let frame = stream.next_frame().await;
        stream.stop_tracks();
        let frame = frame?;

        let photo = encode_photo(&frame, self.config.jpeg_quality)?;
        info!(
            "Captured {}x{} photo ({} bytes encoded)",
            frame.width,
            frame.height,
            photo.len()
        );

        self.photo = Some(photo.clone());
        Ok(photo)
    }

    /// Throw the current photo away and start a new preview
    pub async fn retake(&mut self) -> Result<()> {
        self.photo = None;
        self.start().await
    }

    /// Release the stream, keeping any photo already taken
    pub fn cancel(&mut self) {
        self.release_stream();
    }

    /// Release everything, including the photo
    pub fn reset(&mut self) {
        self.release_stream();
        self.photo = None;
    }

    pub fn photo(&self) -> Option<&Photo> {
        self.photo.as_ref()
    }

    /// Hand the photo over, leaving the helper idle
    pub fn take_captured(&mut self) -> Option<Photo> {
        self.photo.take()
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            debug!("Photo preview stream released");
        }
    }
}

impl Drop for CaptureHelper {
    fn drop(&mut self) {
        self.release_stream();
    }
}

/// Encode a frame as a `data:image/jpeg;base64,` URL
pub fn encode_photo(frame: &VideoFrame, quality: u32) -> Result<Photo> {
    let jpeg = match frame.format {
        FrameFormat::Mjpeg => frame.data.as_ref().clone(),
        FrameFormat::Rgb24 => {
            let expected = frame.width as usize * frame.height as usize * 3;
            if frame.data.len() != expected {
                return Err(ScanError::component(
                    "capture".to_string(),
                    format!(
                        "frame {} has {} bytes, expected {}",
                        frame.id,
                        frame.data.len(),
                        expected
                    ),
                ));
            }

            let mut buf = Vec::new();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100) as u8);
            encoder.encode(&frame.data, frame.width, frame.height, ColorType::Rgb8)?;
            buf
        }
    };

    Ok(Photo::from_data_url(format!(
        "{}{}",
        Photo::JPEG_PREFIX,
        general_purpose::STANDARD.encode(jpeg)
    )))
}
