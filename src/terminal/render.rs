//! Text rendering of view snapshots. Pure functions so they can be tested
//! without a terminal.

use crate::router::{
    FormField, HomeView, ListView, NoticeLevel, PhotoStatus, ProfileOrigin, ProfileView,
    RegisterView, ScannerView, View, ViewState,
};

const TITLE: &str = "PROFILESCAN";

/// Render the whole screen, notice first
pub fn render(state: &ViewState) -> Vec<String> {
    let mut lines = vec![TITLE.to_string(), String::new()];

    if let Some(notice) = &state.notice {
        let marker = match notice.level {
            NoticeLevel::Info => "i",
            NoticeLevel::Error => "!",
        };
        lines.push(format!("[{}] {}", marker, notice.message));
        lines.push(String::new());
    }

    match &state.view {
        View::Home(home) => render_home(home, &mut lines),
        View::Scanner(scanner) => render_scanner(scanner, &mut lines),
        View::Profile(profile) => render_profile(profile, &mut lines),
        View::Register(register) => render_register(register, &mut lines),
        View::List(list) => render_list(list, &mut lines),
    }

    lines
}

fn render_home(home: &HomeView, lines: &mut Vec<String>) {
    lines.push(format!("{} profile(s) registered", home.profile_count));
    lines.push(String::new());
    lines.push("[s] scan  [l] list  [q] quit".to_string());
}

fn render_scanner(scanner: &ScannerView, lines: &mut Vec<String>) {
    lines.push(format!(
        "Scanning ({}): present a code to the reader",
        scanner.session
    ));
    let formats: Vec<&str> = scanner.formats.iter().map(|f| f.as_str()).collect();
    lines.push(format!("Accepted: {}", formats.join(", ")));
    lines.push(String::new());
    lines.push("[Enter] submit typed code  [Esc] cancel".to_string());
}

fn render_profile(profile: &ProfileView, lines: &mut Vec<String>) {
    lines.push(profile.display_name());
    lines.push(format!("Code: {}", profile.barcode));
    lines.push(match &profile.photo {
        Some(photo) => format!("Photo: yes ({} bytes)", photo.len()),
        None => "Photo: none".to_string(),
    });
    lines.push(format!("Scans: {}", profile.scan_count));
    for at in &profile.history {
        lines.push(format!("  {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    lines.push(String::new());
    lines.push(match profile.origin {
        ProfileOrigin::Scan => "[s] scan next  [l] list  [Esc] home".to_string(),
        ProfileOrigin::List => "[l] back to list  [s] scan  [Esc] home".to_string(),
    });
}

fn render_register(register: &RegisterView, lines: &mut Vec<String>) {
    let form = &register.form;
    let cursor = |field: FormField| if form.focus == field { ">" } else { " " };

    lines.push(format!("New code: {}", register.barcode));
    lines.push(String::new());
    lines.push(format!(
        "{} First name: {}",
        cursor(FormField::FirstName),
        form.first_name
    ));
    lines.push(format!(
        "{} Last name:  {}",
        cursor(FormField::LastName),
        form.last_name
    ));
    lines.push(String::new());

    let (status, keys) = match register.photo {
        PhotoStatus::None => ("none", "[F2] start camera"),
        PhotoStatus::Previewing => ("camera on", "[F2] take photo  [Esc] stop camera"),
        PhotoStatus::Captured => ("captured", "[F3] retake"),
    };
    lines.push(format!("Photo: {}", status));
    lines.push(format!(
        "[Tab] switch field  [Enter] save  {}  [Esc] cancel",
        keys
    ));
}

fn render_list(list: &ListView, lines: &mut Vec<String>) {
    if list.is_empty() {
        lines.push("No codes registered yet. Press [s] to scan one.".to_string());
        lines.push(String::new());
        lines.push("[s] scan  [Esc] home".to_string());
        return;
    }

    for (index, entry) in list.entries.iter().enumerate() {
        let marker = if index == list.selected { ">" } else { " " };
        let photo = if entry.has_photo { " [photo]" } else { "" };
        lines.push(format!(
            "{} {}  {}  ({} scans){}",
            marker, entry.barcode, entry.display_name, entry.scan_count, photo
        ));
    }
    lines.push(String::new());
    lines.push("[Up/Down] select  [Enter] open  [Esc] home".to_string());
}
