mod orchestrator;
mod runtime;
mod types;


pub use orchestrator::ScanApp;
pub use types::{AppInput, ShutdownReason, WedgeInput};
