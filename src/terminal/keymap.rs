//! Key bindings, resolved against whatever view is on screen.

use crate::app::{AppInput, WedgeInput};
use crate::events::{FormEdit, UserAction};
use crate::router::{PhotoStatus, View};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Translate one key press into application input. Returns `None` for keys
/// the current view does not use.
pub fn map_key(view: &View, key: KeyEvent) -> Option<AppInput> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    // Raw mode swallows SIGINT
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(AppInput::Action(UserAction::Quit)),
            _ => None,
        };
    }

    match view {
        View::Home(_) => home_key(key.code),
        View::Scanner(_) => scanner_key(key.code),
        View::Register(register) => register_key(register.photo, key.code),
        View::Profile(_) => profile_key(key.code),
        View::List(_) => list_key(key.code),
    }
    .or_else(|| match key.code {
        KeyCode::Char('?') => Some(AppInput::Action(UserAction::DismissNotice)),
        _ => None,
    })
}

fn home_key(code: KeyCode) -> Option<AppInput> {
    let action = match code {
        KeyCode::Char('s') => UserAction::ScanRequested,
        KeyCode::Char('l') => UserAction::ShowList,
        KeyCode::Char('q') | KeyCode::Esc => UserAction::Quit,
        _ => return None,
    };
    Some(AppInput::Action(action))
}

/// Everything but Esc goes to the wedge decoder, the way a USB scanner types
fn scanner_key(code: KeyCode) -> Option<AppInput> {
    match code {
        KeyCode::Esc => Some(AppInput::Action(UserAction::Cancel)),
        KeyCode::Enter => Some(AppInput::Wedge(WedgeInput::Submit)),
        KeyCode::Backspace => Some(AppInput::Wedge(WedgeInput::Backspace)),
        KeyCode::Char(c) => Some(AppInput::Wedge(WedgeInput::Char(c))),
        _ => None,
    }
}

fn register_key(photo: PhotoStatus, code: KeyCode) -> Option<AppInput> {
    let action = match (code, photo) {
        (KeyCode::F(2), PhotoStatus::None) => UserAction::StartPhoto,
        (KeyCode::F(2), PhotoStatus::Previewing) => UserAction::TakePhoto,
        (KeyCode::F(3), PhotoStatus::Captured) => UserAction::RetakePhoto,
        (KeyCode::Esc, PhotoStatus::Previewing) => UserAction::CancelPhoto,
        (KeyCode::Esc, _) => UserAction::Cancel,
        (KeyCode::Enter, _) => UserAction::SubmitRegistration,
        (KeyCode::Tab, _) | (KeyCode::BackTab, _) => UserAction::EditForm(FormEdit::NextField),
        (KeyCode::Backspace, _) => UserAction::EditForm(FormEdit::Backspace),
        (KeyCode::Char(c), _) => UserAction::EditForm(FormEdit::Insert(c)),
        _ => return None,
    };
    Some(AppInput::Action(action))
}

fn profile_key(code: KeyCode) -> Option<AppInput> {
    let action = match code {
        KeyCode::Esc | KeyCode::Char('b') => UserAction::Cancel,
        KeyCode::Char('s') => UserAction::ScanRequested,
        KeyCode::Char('l') => UserAction::ShowList,
        _ => return None,
    };
    Some(AppInput::Action(action))
}

fn list_key(code: KeyCode) -> Option<AppInput> {
    let action = match code {
        KeyCode::Up | KeyCode::Char('k') => UserAction::MoveSelection(-1),
        KeyCode::Down | KeyCode::Char('j') => UserAction::MoveSelection(1),
        KeyCode::Enter => UserAction::OpenSelected,
        KeyCode::Char('s') => UserAction::ScanRequested,
        KeyCode::Esc | KeyCode::Char('b') => UserAction::Cancel,
        _ => return None,
    };
    Some(AppInput::Action(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{BarcodeFormat, SessionId};
    use crate::router::{HomeView, ListView, RegisterForm, RegisterView, ScannerView};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn register_view(photo: PhotoStatus) -> View {
        View::Register(RegisterView {
            barcode: "42".to_string(),
            form: RegisterForm::default(),
            photo,
        })
    }

    fn scanner_view() -> View {
        View::Scanner(ScannerView {
            target_id: "scanner-region".to_string(),
            session: SessionId(1),
            formats: vec![BarcodeFormat::QrCode],
        })
    }

    #[test]
    fn test_home_keys() {
        let home = View::Home(HomeView { profile_count: 0 });

        assert_eq!(
            map_key(&home, press(KeyCode::Char('s'))),
            Some(AppInput::Action(UserAction::ScanRequested))
        );
        assert_eq!(
            map_key(&home, press(KeyCode::Char('l'))),
            Some(AppInput::Action(UserAction::ShowList))
        );
        assert_eq!(
            map_key(&home, press(KeyCode::Char('q'))),
            Some(AppInput::Action(UserAction::Quit))
        );
        assert_eq!(map_key(&home, press(KeyCode::Char('x'))), None);
    }

    #[test]
    fn test_scanner_keys_feed_wedge() {
        let scanner = scanner_view();

        assert_eq!(
            map_key(&scanner, press(KeyCode::Char('s'))),
            Some(AppInput::Wedge(WedgeInput::Char('s')))
        );
        assert_eq!(
            map_key(&scanner, press(KeyCode::Enter)),
            Some(AppInput::Wedge(WedgeInput::Submit))
        );
        assert_eq!(
            map_key(&scanner, press(KeyCode::Esc)),
            Some(AppInput::Action(UserAction::Cancel))
        );
    }

    #[test]
    fn test_register_photo_keys_follow_status() {
        assert_eq!(
            map_key(&register_view(PhotoStatus::None), press(KeyCode::F(2))),
            Some(AppInput::Action(UserAction::StartPhoto))
        );
        assert_eq!(
            map_key(&register_view(PhotoStatus::Previewing), press(KeyCode::F(2))),
            Some(AppInput::Action(UserAction::TakePhoto))
        );
        assert_eq!(
            map_key(&register_view(PhotoStatus::Captured), press(KeyCode::F(2))),
            None
        );
        assert_eq!(
            map_key(&register_view(PhotoStatus::Captured), press(KeyCode::F(3))),
            Some(AppInput::Action(UserAction::RetakePhoto))
        );
        assert_eq!(
            map_key(&register_view(PhotoStatus::Previewing), press(KeyCode::Esc)),
            Some(AppInput::Action(UserAction::CancelPhoto))
        );
        assert_eq!(
            map_key(&register_view(PhotoStatus::None), press(KeyCode::Esc)),
            Some(AppInput::Action(UserAction::Cancel))
        );
    }

    #[test]
    fn test_register_text_entry() {
        let view = register_view(PhotoStatus::None);

        assert_eq!(
            map_key(&view, press(KeyCode::Char('q'))),
            Some(AppInput::Action(UserAction::EditForm(FormEdit::Insert('q'))))
        );
        assert_eq!(
            map_key(&view, press(KeyCode::Tab)),
            Some(AppInput::Action(UserAction::EditForm(FormEdit::NextField)))
        );
        assert_eq!(
            map_key(&view, press(KeyCode::Enter)),
            Some(AppInput::Action(UserAction::SubmitRegistration))
        );
    }

    #[test]
    fn test_list_keys() {
        let list = View::List(ListView {
            entries: Vec::new(),
            selected: 0,
        });

        assert_eq!(
            map_key(&list, press(KeyCode::Down)),
            Some(AppInput::Action(UserAction::MoveSelection(1)))
        );
        assert_eq!(
            map_key(&list, press(KeyCode::Up)),
            Some(AppInput::Action(UserAction::MoveSelection(-1)))
        );
        assert_eq!(
            map_key(&list, press(KeyCode::Char('s'))),
            Some(AppInput::Action(UserAction::ScanRequested))
        );
    }

    #[test]
    fn test_ctrl_c_quits_everywhere() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);

        assert_eq!(
            map_key(&scanner_view(), ctrl_c),
            Some(AppInput::Action(UserAction::Quit))
        );
        assert_eq!(
            map_key(&register_view(PhotoStatus::None), ctrl_c),
            Some(AppInput::Action(UserAction::Quit))
        );
    }

    #[test]
    fn test_release_events_ignored() {
        let mut key = press(KeyCode::Char('s'));
        key.kind = KeyEventKind::Release;

        assert_eq!(map_key(&View::Home(HomeView { profile_count: 0 }), key), None);
    }
}
