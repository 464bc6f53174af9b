pub mod app;
pub mod camera;
pub mod capture;
pub mod clock;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod events;
pub mod profile;
pub mod router;
pub mod store;
pub mod terminal;

pub use app::{AppInput, ScanApp, ShutdownReason, WedgeInput};
pub use camera::{CameraDevice, FacingMode, MediaStream, SyntheticCamera, VideoFrame};
pub use capture::{CaptureHelper, CaptureState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ProfilescanConfig;
pub use controller::{ControllerParts, FlowState, ScanFlowController};
pub use decoder::{
    BarcodeFormat, DecodeEvent, DecodeSink, DecoderAdapter, DecoderConfig, KeyboardWedgeDecoder,
    ScriptedDecoder, SessionId, WedgeFeed,
};
pub use error::{Result, ScanError};
pub use events::{FormEdit, UserAction};
pub use profile::{Photo, Profile, ProfileMap, ProfileRecord};
pub use router::{Notice, NoticeLevel, View, ViewRouter, ViewState};
pub use store::{FileStorage, KeyValueStorage, MemoryStorage, ProfileStore};
pub use terminal::TerminalFrontend;
