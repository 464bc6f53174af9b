use crate::camera::FacingMode;
use crate::decoder::BarcodeFormat;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Frame pacing works in whole milliseconds
pub const MAX_FPS: u32 = 1000;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProfilescanConfig {
    pub scanner: ScannerConfig,
    pub capture: CaptureConfig,
    pub camera: CameraConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScannerConfig {
    /// Identifier of the element the decoder renders its preview into
    #[serde(default = "default_target_id")]
    pub target_id: String,

    /// Decode attempts per second
    #[serde(default = "default_scanner_fps")]
    pub fps: u32,

    /// Scan box width as a fraction of the viewfinder's shorter edge
    #[serde(default = "default_region_fraction")]
    pub region_fraction: f64,

    /// Scan box height as a fraction of its width (barcodes are wide)
    #[serde(default = "default_region_height_ratio")]
    pub region_height_ratio: f64,

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,

    #[serde(default)]
    pub disable_flip: bool,

    /// Camera the decoder asks for
    #[serde(default = "default_scanner_facing")]
    pub facing: FacingMode,

    #[serde(default = "default_zoom")]
    pub zoom: f64,

    /// Accepted symbologies
    #[serde(default = "default_formats")]
    pub formats: Vec<BarcodeFormat>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Camera used for the profile photo
    #[serde(default = "default_capture_facing")]
    pub facing: FacingMode,

    /// JPEG quality for captured photos (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Frame resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Simulate a user refusing camera access
    #[serde(default)]
    pub deny_permission: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Directory holding the key-value files and logs
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Key the profile map is stored under
    #[serde(default = "default_storage_key")]
    pub key: String,
}

impl StorageConfig {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_path().join("logs")
    }
}

impl ProfilescanConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("profilescan.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let formats: Vec<String> = default_formats()
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();

        let settings = Config::builder()
            .set_default("scanner.target_id", default_target_id())?
            .set_default("scanner.fps", default_scanner_fps())?
            .set_default("scanner.region_fraction", default_region_fraction())?
            .set_default("scanner.region_height_ratio", default_region_height_ratio())?
            .set_default("scanner.aspect_ratio", default_aspect_ratio())?
            .set_default("scanner.disable_flip", false)?
            .set_default("scanner.facing", default_scanner_facing().as_str())?
            .set_default("scanner.zoom", default_zoom())?
            .set_default("scanner.formats", formats)?
            .set_default("capture.facing", default_capture_facing().as_str())?
            .set_default("capture.jpeg_quality", default_jpeg_quality())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.deny_permission", false)?
            .set_default("storage.data_dir", default_data_dir())?
            .set_default("storage.key", default_storage_key())?
            .add_source(File::with_name(&path_str).required(false))
            // PROFILESCAN_STORAGE__DATA_DIR=/var/lib/profilescan
            .add_source(
                Environment::with_prefix("PROFILESCAN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: ProfilescanConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scanner.fps == 0 || self.scanner.fps > MAX_FPS {
            return Err(ConfigError::Message(format!(
                "Scanner fps must be between 1 and {}",
                MAX_FPS
            )));
        }

        if !(self.scanner.region_fraction > 0.0 && self.scanner.region_fraction <= 1.0) {
            return Err(ConfigError::Message(
                "Scanner region_fraction must be in (0, 1]".to_string(),
            ));
        }

        if !(self.scanner.region_height_ratio > 0.0 && self.scanner.region_height_ratio <= 1.0) {
            return Err(ConfigError::Message(
                "Scanner region_height_ratio must be in (0, 1]".to_string(),
            ));
        }

        if self.scanner.formats.is_empty() {
            return Err(ConfigError::Message(
                "At least one barcode format must be enabled".to_string(),
            ));
        }

        if self.capture.jpeg_quality == 0 || self.capture.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Capture jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 || self.camera.fps > MAX_FPS {
            return Err(ConfigError::Message(format!(
                "Camera fps must be between 1 and {}",
                MAX_FPS
            )));
        }

        if self.storage.key.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage key must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Default configuration rendered as TOML
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&Self::default())
    }
}

impl Default for ProfilescanConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig {
                target_id: default_target_id(),
                fps: default_scanner_fps(),
                region_fraction: default_region_fraction(),
                region_height_ratio: default_region_height_ratio(),
                aspect_ratio: default_aspect_ratio(),
                disable_flip: false,
                facing: default_scanner_facing(),
                zoom: default_zoom(),
                formats: default_formats(),
            },
            capture: CaptureConfig {
                facing: default_capture_facing(),
                jpeg_quality: default_jpeg_quality(),
            },
            camera: CameraConfig {
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                deny_permission: false,
            },
            storage: StorageConfig {
                data_dir: default_data_dir(),
                key: default_storage_key(),
            },
        }
    }
}

// Default value functions
fn default_target_id() -> String {
    "scanner-region".to_string()
}
fn default_scanner_fps() -> u32 {
    30
}
fn default_region_fraction() -> f64 {
    0.9
}
fn default_region_height_ratio() -> f64 {
    0.6
}
fn default_aspect_ratio() -> f64 {
    1.0
}
fn default_scanner_facing() -> FacingMode {
    FacingMode::Environment
}
fn default_zoom() -> f64 {
    2.0
}
fn default_formats() -> Vec<BarcodeFormat> {
    BarcodeFormat::ALL.to_vec()
}

fn default_capture_facing() -> FacingMode {
    FacingMode::User
}
fn default_jpeg_quality() -> u32 {
    80
}

fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}

fn default_data_dir() -> String {
    "./profilescan-data".to_string()
}
fn default_storage_key() -> String {
    "barcodeUsers".to_string()
}
