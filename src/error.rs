use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Camera permission denied for {device}")]
    PermissionDenied { device: String },

    #[error("Decoder failed to initialize: {details}")]
    DecoderInit { details: String },

    #[error("Required field is empty: {field}")]
    Validation { field: &'static str },

    #[error("Profile storage unavailable: {details}")]
    StorageUnavailable { details: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl ScanError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn storage<S: Into<String>>(details: S) -> Self {
        Self::StorageUnavailable {
            details: details.into(),
        }
    }

    pub fn decoder<S: Into<String>>(details: S) -> Self {
        Self::DecoderInit {
            details: details.into(),
        }
    }

    /// Storage loss cannot be recovered from inside the flow; everything else
    /// is reported to the user and the flow returns to a safe state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::StorageUnavailable { .. })
    }

    /// Short message suitable for showing on screen
    pub fn user_message(&self) -> String {
        match self {
            ScanError::PermissionDenied { .. } => {
                "Camera access denied. Check the camera permissions.".to_string()
            }
            ScanError::DecoderInit { .. } => {
                "Could not start the scanner. Check the camera permissions.".to_string()
            }
            ScanError::Validation { .. } => "Please fill in all fields.".to_string(),
            ScanError::StorageUnavailable { .. } => {
                "Profile storage is unavailable.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
