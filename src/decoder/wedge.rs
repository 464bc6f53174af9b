use super::{BarcodeFormat, DecodeSink, DecoderAdapter, DecoderConfig};
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Longest code a wedge may type before the buffer is considered garbage
const MAX_CODE_LEN: usize = 512;

#[derive(Default)]
struct WedgeState {
    sink: Option<DecodeSink>,
    buffer: String,
}

/// Decoder for keyboard-wedge scanners.
///
/// A wedge scanner decodes in hardware and "types" the code followed by
/// Enter. Keystrokes reach the decoder through a [`WedgeFeed`]; while the
/// decoder is stopped they are discarded.
pub struct KeyboardWedgeDecoder {
    state: Arc<Mutex<WedgeState>>,
}

/// Keystroke entry point for a [`KeyboardWedgeDecoder`]
#[derive(Clone)]
pub struct WedgeFeed {
    state: Arc<Mutex<WedgeState>>,
}

impl KeyboardWedgeDecoder {
    pub fn new() -> (Self, WedgeFeed) {
        let state = Arc::new(Mutex::new(WedgeState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            WedgeFeed { state },
        )
    }
}

impl WedgeFeed {
    pub fn push_char(&self, c: char) {
        let mut state = self.state.lock();
        if state.sink.is_none() || c.is_control() {
            return;
        }
        if state.buffer.len() >= MAX_CODE_LEN {
            warn!("Wedge input exceeded {} characters, discarding", MAX_CODE_LEN);
            state.buffer.clear();
            return;
        }
        state.buffer.push(c);
    }

    pub fn backspace(&self) {
        self.state.lock().buffer.pop();
    }

    /// Terminator typed by the scanner; hands the buffered code to the sink
    pub fn submit(&self) {
        let mut state = self.state.lock();
        let code = std::mem::take(&mut state.buffer);
        let code = code.trim();

        if code.is_empty() {
            return;
        }

        match &state.sink {
            Some(sink) => {
                debug!("Wedge decoded {} characters", code.len());
                sink.deliver(code, BarcodeFormat::guess(code));
            }
            None => debug!("Wedge input ignored while decoder is stopped"),
        }
    }

    /// What has been typed so far in the current code
    pub fn pending(&self) -> String {
        self.state.lock().buffer.clone()
    }
}

#[async_trait]
impl DecoderAdapter for KeyboardWedgeDecoder {
    fn name(&self) -> &'static str {
        "keyboard-wedge"
    }

    async fn start(
        &mut self,
        target_id: &str,
        config: &DecoderConfig,
        sink: DecodeSink,
    ) -> Result<()> {
        if config.formats.is_empty() {
            return Err(ScanError::decoder("no barcode formats enabled"));
        }

        let mut state = self.state.lock();
        if state.sink.is_some() {
            warn!("Keyboard wedge decoder already running, restarting");
        }
        info!(
            "Keyboard wedge decoder listening for {} into '{}'",
            sink.session(),
            target_id
        );
        state.buffer.clear();
        state.sink = Some(sink);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(sink) = state.sink.take() {
            debug!("Keyboard wedge decoder stopped ({})", sink.session());
        }
        state.buffer.clear();
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.state.lock().sink.is_some()
    }
}
