use serde::{Deserialize, Serialize};

/// Edits to the registration form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormEdit {
    /// Type a character into the focused field
    Insert(char),
    /// Delete the last character of the focused field
    Backspace,
    /// Move focus to the other field
    NextField,
    /// Replace both fields at once
    Set {
        first_name: String,
        last_name: String,
    },
}

/// Everything a user can ask the scan flow to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserAction {
    /// Open the scanner
    ScanRequested,
    /// Back / close, from any view
    Cancel,
    /// Show every stored profile
    ShowList,
    /// Move the list selection
    MoveSelection(isize),
    /// Open the selected list entry
    OpenSelected,
    /// Open a profile by barcode without recording a scan
    OpenProfile { barcode: String },
    /// Edit the registration form
    EditForm(FormEdit),
    /// Submit the registration form
    SubmitRegistration,
    /// Turn on the photo preview
    StartPhoto,
    /// Capture the still
    TakePhoto,
    /// Drop the photo and preview again
    RetakePhoto,
    /// Turn off the preview, keeping nothing new
    CancelPhoto,
    /// Hide the current notice
    DismissNotice,
    /// Leave the application
    Quit,
}

impl UserAction {
    /// Get a human-readable description of the action
    pub fn description(&self) -> String {
        match self {
            UserAction::ScanRequested => "Scan requested".to_string(),
            UserAction::Cancel => "Cancel".to_string(),
            UserAction::ShowList => "Show profile list".to_string(),
            UserAction::MoveSelection(delta) => format!("Move selection by {}", delta),
            UserAction::OpenSelected => "Open selected profile".to_string(),
            UserAction::OpenProfile { barcode } => format!("Open profile {}", barcode),
            UserAction::EditForm(FormEdit::Set { .. }) => "Set form fields".to_string(),
            UserAction::EditForm(edit) => format!("Edit form: {:?}", edit),
            UserAction::SubmitRegistration => "Submit registration".to_string(),
            UserAction::StartPhoto => "Start photo preview".to_string(),
            UserAction::TakePhoto => "Take photo".to_string(),
            UserAction::RetakePhoto => "Retake photo".to_string(),
            UserAction::CancelPhoto => "Cancel photo".to_string(),
            UserAction::DismissNotice => "Dismiss notice".to_string(),
            UserAction::Quit => "Quit".to_string(),
        }
    }

    /// Get the action type as a string for filtering
    pub fn action_type(&self) -> &'static str {
        match self {
            UserAction::ScanRequested => "scan_requested",
            UserAction::Cancel => "cancel",
            UserAction::ShowList => "show_list",
            UserAction::MoveSelection(_) => "move_selection",
            UserAction::OpenSelected => "open_selected",
            UserAction::OpenProfile { .. } => "open_profile",
            UserAction::EditForm(_) => "edit_form",
            UserAction::SubmitRegistration => "submit_registration",
            UserAction::StartPhoto => "start_photo",
            UserAction::TakePhoto => "take_photo",
            UserAction::RetakePhoto => "retake_photo",
            UserAction::CancelPhoto => "cancel_photo",
            UserAction::DismissNotice => "dismiss_notice",
            UserAction::Quit => "quit",
        }
    }
}
