//! Barcode decoder adapter contract.
//!
//! Decoding itself is delegated to an external component. This module only
//! fixes the seam: how a decoder is configured, started and stopped, and how
//! it hands decoded strings back. Every decoded string is tagged with the
//! scan session it belongs to so the flow can drop anything that arrives
//! after the session ended.

mod scripted;
mod wedge;

pub use scripted::{ScriptedDecoder, ScriptedFailure, ScriptedHandle};
pub use wedge::{KeyboardWedgeDecoder, WedgeFeed};

use crate::camera::FacingMode;
use crate::config::ScannerConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::trace;

/// Symbologies the decoder can be asked to recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeFormat {
    #[serde(rename = "QR_CODE")]
    QrCode,
    #[serde(rename = "EAN_13")]
    Ean13,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "CODE_128")]
    Code128,
    #[serde(rename = "CODE_39")]
    Code39,
    #[serde(rename = "UPC_A")]
    UpcA,
    #[serde(rename = "UPC_E")]
    UpcE,
    #[serde(rename = "ITF")]
    Itf,
    #[serde(rename = "CODE_93")]
    Code93,
}

impl BarcodeFormat {
    pub const ALL: [BarcodeFormat; 9] = [
        BarcodeFormat::QrCode,
        BarcodeFormat::Ean13,
        BarcodeFormat::Ean8,
        BarcodeFormat::Code128,
        BarcodeFormat::Code39,
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::Itf,
        BarcodeFormat::Code93,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeFormat::QrCode => "QR_CODE",
            BarcodeFormat::Ean13 => "EAN_13",
            BarcodeFormat::Ean8 => "EAN_8",
            BarcodeFormat::Code128 => "CODE_128",
            BarcodeFormat::Code39 => "CODE_39",
            BarcodeFormat::UpcA => "UPC_A",
            BarcodeFormat::UpcE => "UPC_E",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::Code93 => "CODE_93",
        }
    }

    /// Best guess from the decoded text alone, for sources that do not
    /// report the symbology (keyboard-wedge scanners)
    pub fn guess(text: &str) -> Option<BarcodeFormat> {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match text.len() {
            13 => Some(BarcodeFormat::Ean13),
            12 => Some(BarcodeFormat::UpcA),
            8 => Some(BarcodeFormat::Ean8),
            _ => None,
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scan box sizing policy: a box proportional to the viewfinder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRegion {
    /// Box width as a fraction of the viewfinder's shorter edge
    pub fraction: f64,
    /// Box height as a fraction of the box width
    pub height_ratio: f64,
}

impl ScanRegion {
    /// Box size in pixels for a viewfinder of the given size
    pub fn qrbox(&self, viewfinder_width: u32, viewfinder_height: u32) -> (u32, u32) {
        let min_edge = viewfinder_width.min(viewfinder_height) as f64;
        let width = (min_edge * self.fraction).floor();
        let height = (width * self.height_ratio).floor();
        (width as u32, height as u32)
    }
}

/// Everything a decoder needs to know to start
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    pub fps: u32,
    pub scan_region: ScanRegion,
    pub aspect_ratio: f64,
    pub disable_flip: bool,
    pub facing: FacingMode,
    pub zoom: f64,
    pub formats: Vec<BarcodeFormat>,
}

impl DecoderConfig {
    pub fn from_scanner(config: &ScannerConfig) -> Self {
        Self {
            fps: config.fps,
            scan_region: ScanRegion {
                fraction: config.region_fraction,
                height_ratio: config.region_height_ratio,
            },
            aspect_ratio: config.aspect_ratio,
            disable_flip: config.disable_flip,
            facing: config.facing,
            zoom: config.zoom,
            formats: config.formats.clone(),
        }
    }

    pub fn accepts(&self, format: BarcodeFormat) -> bool {
        self.formats.contains(&format)
    }
}

/// Identifies one scan session: the span between entering `Scanning` and
/// leaving it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// A decoded string delivered by a decoder
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeEvent {
    pub session: SessionId,
    pub text: String,
    pub format: Option<BarcodeFormat>,
    pub received_at: SystemTime,
}

/// Where a running decoder sends its results
#[derive(Debug, Clone)]
pub struct DecodeSink {
    session: SessionId,
    sender: mpsc::UnboundedSender<DecodeEvent>,
}

impl DecodeSink {
    pub fn new(session: SessionId, sender: mpsc::UnboundedSender<DecodeEvent>) -> Self {
        Self { session, sender }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Success callback. A closed receiver means nobody is listening any
    /// more, which is not an error for the decoder.
    pub fn deliver(&self, text: impl Into<String>, format: Option<BarcodeFormat>) {
        let event = DecodeEvent {
            session: self.session,
            text: text.into(),
            format,
            received_at: SystemTime::now(),
        };
        if self.sender.send(event).is_err() {
            trace!("Decode for {} dropped, receiver closed", self.session);
        }
    }

    /// Error callback. Per-frame decode failures are expected while nothing
    /// is in view and are never surfaced.
    pub fn report_error(&self, details: &str) {
        trace!("Decoder error ignored ({}): {}", self.session, details);
    }
}

/// Contract for an external barcode decoder
#[async_trait]
pub trait DecoderAdapter: Send {
    fn name(&self) -> &'static str;

    /// Begin decoding into `sink`, rendering any preview into `target_id`
    async fn start(&mut self, target_id: &str, config: &DecoderConfig, sink: DecodeSink)
        -> Result<()>;

    /// Stop decoding and release the camera. Stopping a stopped decoder is a
    /// no-op.
    async fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;
}
