use super::types::ShutdownReason;
use crate::camera::{CameraDevice, SyntheticCamera};
use crate::capture::CaptureHelper;
use crate::clock::SystemClock;
use crate::config::ProfilescanConfig;
use crate::controller::{ControllerParts, ScanFlowController};
use crate::decoder::{DecodeEvent, KeyboardWedgeDecoder, WedgeFeed};
use crate::error::Result;
use crate::router::ViewState;
use crate::store::{FileStorage, ProfileStore};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

/// Main application coordinator: owns the scan flow and feeds it decoder
/// results and user input from a single loop
pub struct ScanApp {
    pub(super) config: ProfilescanConfig,
    pub(super) controller: ScanFlowController,
    pub(super) decodes: mpsc::UnboundedReceiver<DecodeEvent>,
    pub(super) wedge: WedgeFeed,

    // Lifecycle management
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
}

impl ScanApp {
    /// Build the application from configuration: file-backed store, keyboard
    /// wedge decoder and the synthetic camera for photos
    pub fn new(config: ProfilescanConfig) -> Result<Self> {
        let storage = FileStorage::open(config.storage.data_path())?;
        let store = ProfileStore::open(Box::new(storage), config.storage.key.clone())?;

        let camera: Arc<dyn CameraDevice> = Arc::new(SyntheticCamera::new(config.camera.clone()));
        let (decoder, wedge) = KeyboardWedgeDecoder::new();

        let parts = ControllerParts {
            scanner: config.scanner.clone(),
            store,
            decoder: Box::new(decoder),
            capture: CaptureHelper::new(config.capture.clone(), camera),
            clock: Box::new(SystemClock),
        };

        info!(
            "Profile data in {} (key '{}')",
            config.storage.data_dir, config.storage.key
        );

        Ok(Self::from_parts(config, parts, wedge))
    }

    /// Build the application around already-constructed parts
    pub fn from_parts(config: ProfilescanConfig, parts: ControllerParts, wedge: WedgeFeed) -> Self {
        let (controller, decodes) = ScanFlowController::new(parts);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Self {
            config,
            controller,
            decodes,
            wedge,
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
        }
    }

    /// View snapshots for the presentation layer
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.controller.subscribe()
    }

    pub fn controller(&self) -> &ScanFlowController {
        &self.controller
    }

    pub fn config(&self) -> &ProfilescanConfig {
        &self.config
    }
}
