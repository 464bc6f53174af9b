use crate::events::UserAction;

/// Keystrokes meant for a keyboard-wedge scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WedgeInput {
    Char(char),
    Backspace,
    Submit,
}

/// Everything the front-end can send into the application loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppInput {
    Action(UserAction),
    Wedge(WedgeInput),
}

/// Why the application loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
    InputClosed,
}

impl ShutdownReason {
    /// Process exit code for this reason
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Error(_) => 1,
            _ => 0,
        }
    }
}
