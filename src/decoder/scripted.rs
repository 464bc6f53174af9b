use super::{BarcodeFormat, DecodeSink, DecoderAdapter, DecoderConfig};
use crate::camera::{CameraDevice, MediaStream};
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Failure a [`ScriptedDecoder`] reports from `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    PermissionDenied,
    Init,
}

#[derive(Default)]
struct ScriptedState {
    sink: Option<DecodeSink>,
    fail_next_start: Option<ScriptedFailure>,
    start_count: usize,
    stop_count: usize,
    last_target: Option<String>,
}

/// Decoder driven by hand: codes are emitted through a [`ScriptedHandle`]
/// instead of being read from frames. Optionally holds a real camera stream
/// while running so camera exclusivity can be observed.
pub struct ScriptedDecoder {
    state: Arc<Mutex<ScriptedState>>,
    camera: Option<Arc<dyn CameraDevice>>,
    stream: Option<Box<dyn MediaStream>>,
}

/// Control side of a [`ScriptedDecoder`]
#[derive(Clone)]
pub struct ScriptedHandle {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedDecoder {
    pub fn new() -> (Self, ScriptedHandle) {
        let state = Arc::new(Mutex::new(ScriptedState::default()));
        (
            Self {
                state: Arc::clone(&state),
                camera: None,
                stream: None,
            },
            ScriptedHandle { state },
        )
    }

    /// Open a stream from `camera` while running
    pub fn with_camera(mut self, camera: Arc<dyn CameraDevice>) -> Self {
        self.camera = Some(camera);
        self
    }
}

impl ScriptedHandle {
    /// Deliver `code` as if it had just been decoded. Returns false when the
    /// decoder is not running.
    pub fn emit(&self, code: &str) -> bool {
        let state = self.state.lock();
        match &state.sink {
            Some(sink) => {
                sink.deliver(code, BarcodeFormat::guess(code));
                true
            }
            None => false,
        }
    }

    /// Make the next `start` fail
    pub fn fail_next_start(&self, failure: ScriptedFailure) {
        self.state.lock().fail_next_start = Some(failure);
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    pub fn start_count(&self) -> usize {
        self.state.lock().start_count
    }

    pub fn stop_count(&self) -> usize {
        self.state.lock().stop_count
    }

    pub fn last_target(&self) -> Option<String> {
        self.state.lock().last_target.clone()
    }
}

#[async_trait]
impl DecoderAdapter for ScriptedDecoder {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn start(
        &mut self,
        target_id: &str,
        config: &DecoderConfig,
        sink: DecodeSink,
    ) -> Result<()> {
        let failure = self.state.lock().fail_next_start.take();
        match failure {
            Some(ScriptedFailure::PermissionDenied) => {
                return Err(ScanError::PermissionDenied {
                    device: "environment camera".to_string(),
                })
            }
            Some(ScriptedFailure::Init) => {
                return Err(ScanError::decoder("scripted init failure"))
            }
            None => {}
        }

        if let Some(camera) = &self.camera {
            self.stream = Some(camera.open(config.facing).await?);
        }

        let mut state = self.state.lock();
        state.start_count += 1;
        state.last_target = Some(target_id.to_string());
        debug!("Scripted decoder started for {}", sink.session());
        state.sink = Some(sink);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
        }

        let mut state = self.state.lock();
        if state.sink.take().is_some() {
            state.stop_count += 1;
            debug!("Scripted decoder stopped");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.state.lock().sink.is_some()
    }
}
