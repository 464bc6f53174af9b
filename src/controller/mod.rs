//! Scan flow controller: the state machine behind the scanner.
//!
//! ```text
//!            request_scan             decode (unknown)
//!   Idle ----------------> Scanning ------------------> Registering
//!    ^                        |                              |
//!    |                        | decode (known)               | submit
//!    |                        v                              v
//!    +---- cancel ------ ProfileShown <----------------------+
//! ```
//!
//! Every path out of `Scanning` stops the decoder first, and a session only
//! ever honours one decode.

#[cfg(test)]
mod tests;

use crate::capture::{CaptureHelper, CaptureState};
use crate::clock::Clock;
use crate::config::ScannerConfig;
use crate::decoder::{DecodeEvent, DecodeSink, DecoderAdapter, DecoderConfig, SessionId};
use crate::error::{Result, ScanError};
use crate::events::{FormEdit, UserAction};
use crate::profile::Profile;
use crate::router::{
    HomeView, ListEntry, ListView, Notice, PhotoStatus, ProfileOrigin, ProfileView, RegisterForm,
    RegisterView, ScannerView, View, ViewRouter, ViewState,
};
use crate::store::ProfileStore;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Scanning { session: SessionId },
    ProfileShown { barcode: String, origin: ProfileOrigin },
    Registering { barcode: String },
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::Scanning { .. } => "scanning",
            FlowState::ProfileShown { .. } => "profile_shown",
            FlowState::Registering { .. } => "registering",
        }
    }
}

/// Everything the controller needs, gathered in one place
pub struct ControllerParts {
    pub scanner: ScannerConfig,
    pub store: ProfileStore,
    pub decoder: Box<dyn DecoderAdapter>,
    pub capture: CaptureHelper,
    pub clock: Box<dyn Clock>,
}

pub struct ScanFlowController {
    target_id: String,
    decoder_config: DecoderConfig,
    store: ProfileStore,
    router: ViewRouter,
    decoder: Box<dyn DecoderAdapter>,
    capture: CaptureHelper,
    clock: Box<dyn Clock>,
    decode_sender: mpsc::UnboundedSender<DecodeEvent>,
    state: FlowState,
    sessions_started: u64,
}

impl ScanFlowController {
    /// Build the controller. Decoded strings arrive on the returned receiver
    /// and must be fed back through [`ScanFlowController::handle_decode`].
    pub fn new(parts: ControllerParts) -> (Self, mpsc::UnboundedReceiver<DecodeEvent>) {
        let (decode_sender, decode_receiver) = mpsc::unbounded_channel();
        let router = ViewRouter::new(parts.store.len());

        let controller = Self {
            target_id: parts.scanner.target_id.clone(),
            decoder_config: DecoderConfig::from_scanner(&parts.scanner),
            store: parts.store,
            router,
            decoder: parts.decoder,
            capture: parts.capture,
            clock: parts.clock,
            decode_sender,
            state: FlowState::Idle,
            sessions_started: 0,
        };

        (controller, decode_receiver)
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn view_state(&self) -> ViewState {
        self.router.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.router.subscribe()
    }

    pub fn decoder_running(&self) -> bool {
        self.decoder.is_running()
    }

    /// Apply one user action. Only fatal errors are returned; everything else
    /// ends up as a notice on screen.
    pub async fn apply(&mut self, action: UserAction) -> Result<()> {
        debug!("Action: {} (state: {})", action.description(), self.state.name());

        match action {
            UserAction::ScanRequested => self.request_scan().await,
            UserAction::Cancel => self.cancel().await,
            UserAction::ShowList => self.show_list().await,
            UserAction::MoveSelection(delta) => {
                self.router.move_list_selection(delta);
                Ok(())
            }
            UserAction::OpenSelected => {
                if let View::List(list) = self.router.view() {
                    if let Some(entry) = list.selected_entry() {
                        let barcode = entry.barcode.clone();
                        return self.open_profile(&barcode).await;
                    }
                }
                Ok(())
            }
            UserAction::OpenProfile { barcode } => self.open_profile(&barcode).await,
            UserAction::EditForm(edit) => {
                self.edit_form(edit);
                Ok(())
            }
            UserAction::SubmitRegistration => self.submit_registration().await,
            UserAction::StartPhoto => {
                self.start_photo_capture().await;
                Ok(())
            }
            UserAction::TakePhoto => {
                self.take_photo().await;
                Ok(())
            }
            UserAction::RetakePhoto => {
                self.retake_photo().await;
                Ok(())
            }
            UserAction::CancelPhoto => {
                self.cancel_photo();
                Ok(())
            }
            UserAction::DismissNotice => {
                self.router.clear_notice();
                Ok(())
            }
            UserAction::Quit => self.shutdown().await,
        }
    }

    /// Idle -> Scanning
    pub async fn request_scan(&mut self) -> Result<()> {
        if let FlowState::Scanning { session } = self.state {
            debug!("Already scanning ({})", session);
            return Ok(());
        }

        // The decoder stream and the photo preview never overlap
        self.capture.reset();
        self.state = FlowState::Idle;

        self.sessions_started += 1;
        let session = SessionId(self.sessions_started);
        let sink = DecodeSink::new(session, self.decode_sender.clone());

        match self
            .decoder
            .start(&self.target_id, &self.decoder_config, sink)
            .await
        {
            Ok(()) => {
                info!("Scanning started ({}, {} decoder)", session, self.decoder.name());
                self.state = FlowState::Scanning { session };
                self.router.show(View::Scanner(ScannerView {
                    target_id: self.target_id.clone(),
                    session,
                    formats: self.decoder_config.formats.clone(),
                }));
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let e = match e {
                    ScanError::PermissionDenied { .. } | ScanError::DecoderInit { .. } => e,
                    other => ScanError::decoder(other.to_string()),
                };
                warn!("Scanner failed to start: {}", e);
                self.stop_decoder().await;
                self.state = FlowState::Idle;
                self.router
                    .show_with_notice(self.home_view(), Notice::error(e.user_message()));
                Ok(())
            }
        }
    }

    /// Scanning -> ProfileShown | Registering
    pub async fn handle_decode(&mut self, event: DecodeEvent) -> Result<()> {
        let FlowState::Scanning { session } = self.state else {
            debug!(
                "Ignoring decode from {} outside a scan session (state: {})",
                event.session,
                self.state.name()
            );
            return Ok(());
        };

        if event.session != session {
            debug!("Ignoring stale decode from {} (active: {})", event.session, session);
            return Ok(());
        }

        let barcode = event.text.trim().to_string();
        if barcode.is_empty() {
            debug!("Ignoring empty decode in {}", session);
            return Ok(());
        }

        // Close the session before touching anything else so a second decode
        // already in the channel finds no session to land in
        self.state = FlowState::Idle;
        self.stop_decoder().await;

        info!(
            "Decoded {} ({})",
            barcode,
            event.format.map(|f| f.as_str()).unwrap_or("unknown format")
        );

        match self.store.record_scan(&barcode, self.clock.now())? {
            Some(profile) => {
                info!(
                    "Known code {}, scan #{} recorded",
                    barcode,
                    profile.scan_count()
                );
                self.show_profile(&profile, ProfileOrigin::Scan);
            }
            None => {
                info!("Unknown code {}, starting registration", barcode);
                self.capture.reset();
                self.state = FlowState::Registering {
                    barcode: barcode.clone(),
                };
                self.router.show(View::Register(RegisterView {
                    barcode,
                    form: RegisterForm::default(),
                    photo: PhotoStatus::None,
                }));
            }
        }

        Ok(())
    }

    pub fn edit_form(&mut self, edit: FormEdit) {
        if !matches!(self.state, FlowState::Registering { .. }) {
            debug!("Ignoring form edit outside registration");
            return;
        }

        self.router.update_register(|register| {
            let form = &mut register.form;
            match edit {
                FormEdit::Insert(c) => form.field_mut(form.focus).push(c),
                FormEdit::Backspace => {
                    form.field_mut(form.focus).pop();
                }
                FormEdit::NextField => form.focus = form.focus.next(),
                FormEdit::Set {
                    first_name,
                    last_name,
                } => {
                    form.first_name = first_name;
                    form.last_name = last_name;
                }
            }
        });
    }

    /// Registering -> ProfileShown, or stay put with a notice
    pub async fn submit_registration(&mut self) -> Result<()> {
        let FlowState::Registering { barcode } = &self.state else {
            debug!("Ignoring submit outside registration");
            return Ok(());
        };
        let barcode = barcode.clone();

        let form = match self.router.view() {
            View::Register(register) => register.form,
            _ => RegisterForm::default(),
        };

        let first_name = form.first_name.trim();
        let last_name = form.last_name.trim();

        let missing = if first_name.is_empty() {
            Some("first_name")
        } else if last_name.is_empty() {
            Some("last_name")
        } else {
            None
        };
        if let Some(field) = missing {
            let e = ScanError::Validation { field };
            debug!("Registration rejected: {}", e);
            self.router.notify(Notice::error(e.user_message()));
            return Ok(());
        }

        let photo = self.capture.take_captured();
        self.capture.reset();

        let profile = Profile::register(
            barcode.clone(),
            first_name,
            last_name,
            photo,
            self.clock.now(),
        );
        self.store.put(profile.clone())?;

        info!(
            "Registered {} ({} profile(s) stored)",
            barcode,
            self.store.len()
        );
        self.show_profile(&profile, ProfileOrigin::Scan);
        Ok(())
    }

    pub async fn start_photo_capture(&mut self) {
        if !matches!(self.state, FlowState::Registering { .. }) {
            return;
        }

        if let Err(e) = self.capture.start().await {
            self.router.notify(Notice::error(e.user_message()));
        }
        self.sync_photo_status();
    }

    pub async fn take_photo(&mut self) {
        if !matches!(self.state, FlowState::Registering { .. }) {
            return;
        }

        if let Err(e) = self.capture.take_photo().await {
            warn!("Photo capture failed: {}", e);
            self.router.notify(Notice::error(e.user_message()));
        }
        self.sync_photo_status();
    }

    pub async fn retake_photo(&mut self) {
        if !matches!(self.state, FlowState::Registering { .. }) {
            return;
        }

        if let Err(e) = self.capture.retake().await {
            self.router.notify(Notice::error(e.user_message()));
        }
        self.sync_photo_status();
    }

    pub fn cancel_photo(&mut self) {
        self.capture.cancel();
        self.sync_photo_status();
    }

    /// Any state -> Idle
    pub async fn cancel(&mut self) -> Result<()> {
        self.leave_current_state().await;
        info!("Back to home");
        self.router.show(self.home_view());
        Ok(())
    }

    /// List every profile. Browsing never records a scan.
    pub async fn show_list(&mut self) -> Result<()> {
        self.leave_current_state().await;

        let entries: Vec<ListEntry> = self
            .store
            .list()
            .iter()
            .map(ListEntry::from_profile)
            .collect();
        debug!("Listing {} profile(s)", entries.len());

        self.router.show(View::List(ListView {
            entries,
            selected: 0,
        }));
        Ok(())
    }

    /// Show a stored profile without recording a scan
    pub async fn open_profile(&mut self, barcode: &str) -> Result<()> {
        match self.store.get(barcode) {
            Some(profile) => {
                self.leave_current_state().await;
                self.show_profile(&profile, ProfileOrigin::List);
            }
            None => {
                warn!("No profile stored for {}", barcode);
                self.router
                    .notify(Notice::error(format!("No profile for code {}", barcode)));
            }
        }
        Ok(())
    }

    /// Release the decoder and the camera
    pub async fn shutdown(&mut self) -> Result<()> {
        self.leave_current_state().await;
        debug!("Scan flow shut down");
        Ok(())
    }

    fn show_profile(&mut self, profile: &Profile, origin: ProfileOrigin) {
        self.state = FlowState::ProfileShown {
            barcode: profile.barcode().to_string(),
            origin,
        };
        self.router
            .show(View::Profile(ProfileView::from_profile(profile, origin)));
    }

    /// Stop whatever the current state holds and drop to Idle
    async fn leave_current_state(&mut self) {
        if matches!(self.state, FlowState::Scanning { .. }) || self.decoder.is_running() {
            self.stop_decoder().await;
        }
        self.capture.reset();
        self.state = FlowState::Idle;
    }

    async fn stop_decoder(&mut self) {
        if let Err(e) = self.decoder.stop().await {
            warn!("Error stopping {} decoder: {}", self.decoder.name(), e);
        }
    }

    fn sync_photo_status(&self) {
        let status = match self.capture.state() {
            CaptureState::Idle => PhotoStatus::None,
            CaptureState::Previewing => PhotoStatus::Previewing,
            CaptureState::Captured => PhotoStatus::Captured,
        };
        self.router.update_register(|register| register.photo = status);
    }

    fn home_view(&self) -> View {
        View::Home(HomeView {
            profile_count: self.store.len(),
        })
    }
}
