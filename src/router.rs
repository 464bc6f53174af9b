//! View router: the single source of what the presentation layer shows.
//!
//! The router never touches the profile store. It holds one immutable
//! [`ViewState`] at a time and publishes every replacement on a `watch`
//! channel; front-ends render whatever the latest snapshot says.

use crate::decoder::{BarcodeFormat, SessionId};
use crate::profile::{Photo, Profile};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

/// How a profile came to be on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOrigin {
    /// Reached through a scan (or a fresh registration), which was recorded
    Scan,
    /// Browsed to from the list; nothing was recorded
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HomeView {
    pub profile_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScannerView {
    pub target_id: String,
    pub session: SessionId,
    pub formats: Vec<BarcodeFormat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub barcode: String,
    pub first_name: String,
    pub last_name: String,
    pub photo: Option<Photo>,
    pub scan_count: usize,
    /// Newest first
    pub history: Vec<DateTime<Utc>>,
    pub origin: ProfileOrigin,
}

impl ProfileView {
    pub fn from_profile(profile: &Profile, origin: ProfileOrigin) -> Self {
        Self {
            barcode: profile.barcode().to_string(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            photo: profile.photo.clone(),
            scan_count: profile.scan_count(),
            history: profile.scans().iter().rev().copied().collect(),
            origin,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    FirstName,
    LastName,
}

impl FormField {
    pub fn next(self) -> Self {
        match self {
            FormField::FirstName => FormField::LastName,
            FormField::LastName => FormField::FirstName,
        }
    }
}

/// Partially filled registration form
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub focus: FormField,
}

impl RegisterForm {
    pub fn field_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::FirstName => &mut self.first_name,
            FormField::LastName => &mut self.last_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoStatus {
    None,
    Previewing,
    Captured,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterView {
    pub barcode: String,
    pub form: RegisterForm,
    pub photo: PhotoStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub barcode: String,
    pub display_name: String,
    pub scan_count: usize,
    pub has_photo: bool,
}

impl ListEntry {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            barcode: profile.barcode().to_string(),
            display_name: profile.display_name(),
            scan_count: profile.scan_count(),
            has_photo: profile.photo.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub entries: Vec<ListEntry>,
    pub selected: usize,
}

impl ListView {
    /// An empty list renders an invitation to scan instead of rows
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn selected_entry(&self) -> Option<&ListEntry> {
        self.entries.get(self.selected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Home(HomeView),
    Scanner(ScannerView),
    Profile(ProfileView),
    Register(RegisterView),
    List(ListView),
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            View::Home(_) => "home",
            View::Scanner(_) => "scanner",
            View::Profile(_) => "profile",
            View::Register(_) => "register",
            View::List(_) => "list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Message shown on top of the current view until the next navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub view: View,
    pub notice: Option<Notice>,
    /// Bumped on every change
    pub revision: u64,
}

pub struct ViewRouter {
    sender: watch::Sender<ViewState>,
}

impl ViewRouter {
    pub fn new(profile_count: usize) -> Self {
        let (sender, _) = watch::channel(ViewState {
            view: View::Home(HomeView { profile_count }),
            notice: None,
            revision: 0,
        });
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> ViewState {
        self.sender.borrow().clone()
    }

    pub fn view(&self) -> View {
        self.sender.borrow().view.clone()
    }

    /// Navigate to `view`, clearing any notice
    pub fn show(&self, view: View) {
        debug!("View -> {}", view.name());
        self.replace(view, None);
    }

    /// Navigate to `view` with a notice on top
    pub fn show_with_notice(&self, view: View, notice: Notice) {
        debug!("View -> {} ({})", view.name(), notice.message);
        self.replace(view, Some(notice));
    }

    /// Put a notice on the current view
    pub fn notify(&self, notice: Notice) {
        let view = self.view();
        self.replace(view, Some(notice));
    }

    pub fn clear_notice(&self) {
        if self.sender.borrow().notice.is_some() {
            let view = self.view();
            self.replace(view, None);
        }
    }

    /// Edit the register view in place. Returns false on any other view.
    pub fn update_register<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut RegisterView),
    {
        let mut current = self.current();
        let View::Register(register) = &mut current.view else {
            return false;
        };
        edit(register);
        self.replace(current.view, current.notice);
        true
    }

    /// Move the list selection by `delta`, clamped to the entries
    pub fn move_list_selection(&self, delta: isize) -> bool {
        let mut current = self.current();
        let View::List(list) = &mut current.view else {
            return false;
        };
        if list.entries.is_empty() {
            return false;
        }
        let last = list.entries.len() as isize - 1;
        list.selected = (list.selected as isize + delta).clamp(0, last) as usize;
        self.replace(current.view, current.notice);
        true
    }

    fn replace(&self, view: View, notice: Option<Notice>) {
        let revision = self.sender.borrow().revision + 1;
        self.sender.send_replace(ViewState {
            view,
            notice,
            revision,
        });
    }
}
