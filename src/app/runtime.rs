use super::{AppInput, ScanApp, ShutdownReason, WedgeInput};
use crate::error::{Result, ScanError};
use crate::events::UserAction;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

impl ScanApp {
    /// Run until the user quits, the input closes, a signal arrives or a
    /// fatal error occurs. Returns why the loop ended.
    pub async fn run(
        &mut self,
        mut inputs: mpsc::UnboundedReceiver<AppInput>,
    ) -> Result<ShutdownReason> {
        info!("Profilescan is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| ScanError::system("Shutdown sender already taken"))?;
        let mut shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| ScanError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let reason = loop {
            // Decoder results go first so a submitted code is handled before
            // any keystroke queued behind it
            tokio::select! {
                biased;

                Some(event) = self.decodes.recv() => {
                    let outcome = self.controller.handle_decode(event).await;
                    if let Some(reason) = Self::check_outcome(outcome) {
                        break reason;
                    }
                }
                input = inputs.recv() => {
                    match input {
                        None => break ShutdownReason::InputClosed,
                        Some(AppInput::Action(UserAction::Quit)) => break ShutdownReason::UserRequest,
                        Some(AppInput::Action(action)) => {
                            let outcome = self.controller.apply(action).await;
                            if let Some(reason) = Self::check_outcome(outcome) {
                                break reason;
                            }
                        }
                        Some(AppInput::Wedge(key)) => self.feed_wedge(key),
                    }
                }
                reason = &mut shutdown_receiver => {
                    break reason.unwrap_or_else(|_| {
                        ShutdownReason::Error("Shutdown channel closed unexpectedly".to_string())
                    });
                }
            }
        };

        info!("Shutdown initiated: {:?}", reason);

        if let Err(e) = self.controller.shutdown().await {
            warn!("Error releasing scan flow: {}", e);
        }

        info!("Profilescan shutdown complete");
        Ok(reason)
    }

    fn feed_wedge(&self, key: WedgeInput) {
        match key {
            WedgeInput::Char(c) => self.wedge.push_char(c),
            WedgeInput::Backspace => self.wedge.backspace(),
            WedgeInput::Submit => self.wedge.submit(),
        }
    }

    /// Fatal errors end the loop; anything else has already been shown to
    /// the user by the controller
    fn check_outcome(outcome: Result<()>) -> Option<ShutdownReason> {
        match outcome {
            Ok(()) => None,
            Err(e) if e.is_fatal() => {
                error!("Fatal error: {}", e);
                Some(ShutdownReason::Error(e.to_string()))
            }
            Err(e) => {
                warn!("Recoverable error escaped the scan flow: {}", e);
                None
            }
        }
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // Handle SIGTERM - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            } else {
                debug!("Ctrl+C handler unavailable");
            }
        });
    }
}
