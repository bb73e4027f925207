//! Layered on-disk configuration for optiscan hosts.
//!
//! TOML settings file, environment overrides, and translation to
//! `optiscan_core::ScannerConfig`. Hosts load settings here and hand the
//! resulting config to the engine -- the engine itself never reads disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use optiscan_core::{DeviceProfile, ScannerConfig};
use optiscan_platform::FacingMode;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML settings structs ───────────────────────────────────────────

/// Top-level TOML settings.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Scanner tuning knobs.
    #[serde(default)]
    pub scanner: ScanSettings,
}

/// The `[scanner]` table.
#[derive(Debug, Deserialize, Serialize)]
pub struct ScanSettings {
    /// Device profile: "mobile" or "desktop".
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Facing preference when no device is pinned: "environment" or "user".
    #[serde(default = "default_facing")]
    pub preferred_facing: String,

    /// Cadence of live decode attempts, in milliseconds.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Hold time after a detection before auto-stop, in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Deadline for stream metadata after acquisition, in seconds.
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,

    /// Settle delay between teardown and restart on a camera switch,
    /// in milliseconds.
    #[serde(default = "default_switch_settle_ms")]
    pub switch_settle_ms: u64,

    #[serde(default = "default_true")]
    pub enable_flash: bool,

    #[serde(default = "default_true")]
    pub enable_camera_switch: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            preferred_facing: default_facing(),
            scan_interval_ms: default_scan_interval_ms(),
            cooldown_ms: default_cooldown_ms(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            switch_settle_ms: default_switch_settle_ms(),
            enable_flash: true,
            enable_camera_switch: true,
        }
    }
}

fn default_profile() -> String {
    "desktop".into()
}
fn default_facing() -> String {
    "environment".into()
}
fn default_scan_interval_ms() -> u64 {
    100
}
fn default_cooldown_ms() -> u64 {
    1500
}
fn default_metadata_timeout_secs() -> u64 {
    10
}
fn default_switch_settle_ms() -> u64 {
    500
}
fn default_true() -> bool {
    true
}

// ── Settings file path ──────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn settings_path() -> PathBuf {
    ProjectDirs::from("com", "optiscan", "optiscan").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("settings.toml");
            p
        },
        |dirs| dirs.config_dir().join("settings.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("optiscan");
    p
}

// ── Settings loading ────────────────────────────────────────────────

/// Load settings from the canonical path plus environment overrides.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&settings_path())
}

/// Load settings from an explicit file path plus environment overrides.
///
/// Layering, lowest precedence first: built-in defaults, the TOML file,
/// `OPTISCAN_`-prefixed environment variables (double underscore as the
/// table separator, e.g. `OPTISCAN_SCANNER__COOLDOWN_MS`).
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("OPTISCAN_").split("__"));

    let settings: Settings = figment.extract()?;
    Ok(settings)
}

/// Load settings, returning built-in defaults when the file is missing
/// or unreadable.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_default()
}

// ── Settings saving ─────────────────────────────────────────────────

/// Serialize settings to TOML and write to the canonical path.
pub fn save_settings(settings: &Settings) -> Result<(), ConfigError> {
    let path = settings_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Translation to the engine config ────────────────────────────────

impl ScanSettings {
    /// Build a `ScannerConfig` from validated settings.
    pub fn to_scanner_config(&self) -> Result<ScannerConfig, ConfigError> {
        if self.scan_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "scan_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.metadata_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "metadata_timeout_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let profile: DeviceProfile =
            self.profile
                .parse()
                .map_err(|_| ConfigError::Validation {
                    field: "profile".into(),
                    reason: format!("expected 'mobile' or 'desktop', got '{}'", self.profile),
                })?;
        let preferred_facing: FacingMode =
            self.preferred_facing
                .parse()
                .map_err(|_| ConfigError::Validation {
                    field: "preferred_facing".into(),
                    reason: format!(
                        "expected 'environment' or 'user', got '{}'",
                        self.preferred_facing
                    ),
                })?;

        Ok(ScannerConfig {
            preferred_facing,
            scan_interval: Duration::from_millis(self.scan_interval_ms),
            cooldown: Duration::from_millis(self.cooldown_ms),
            metadata_timeout: Duration::from_secs(self.metadata_timeout_secs),
            switch_settle: Duration::from_millis(self.switch_settle_ms),
            enable_flash: self.enable_flash,
            enable_camera_switch: self.enable_camera_switch,
            profile,
        })
    }
}
