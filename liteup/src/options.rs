//! Configuration for liteup.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Smallest disk image the manager will create, in bytes.
pub const MINIMUM_DISK_SIZE: u64 = 1024 * 1024 * 1024;

/// Share of free space reserved for a new disk image, in percent.
pub const DISK_RESERVE_PERCENT: u8 = 90;

const DEFAULT_PROBE_PATH: &str = "/home";

pub mod envs {
    /// Skip restarts entirely (resolve as success after one scheduling hop).
    pub const SKIP_RESTART: &str = "LITEUP_SKIP_RESTART";
    /// Running on a dev box or test bot where free space probes report zero.
    pub const DEV_ENVIRONMENT: &str = "LITEUP_DEV_ENVIRONMENT";
    pub const FREE_SPACE_PROBE_PATH: &str = "LITEUP_FREE_SPACE_PROBE_PATH";
    pub const LOG_DIR: &str = "LITEUP_LOG_DIR";
}

// ============================================================================
// Manager Options
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerOptions {
    /// Path whose filesystem is probed for free space before creating a disk.
    ///
    /// Default: /home
    #[serde(default = "default_probe_path")]
    pub free_space_probe_path: PathBuf,

    /// Disk images smaller than this are refused.
    ///
    /// Default: 1 GiB
    #[serde(default = "default_minimum_disk_size")]
    pub minimum_disk_size: u64,

    /// Percentage of free space requested for a new disk image.
    ///
    /// Default: 90
    #[serde(default = "default_reserve_percent")]
    pub reserve_percent: u8,

    /// Refuse disk images below `minimum_disk_size`.
    ///
    /// Disable on dev boxes and test bots, where the free space probe is
    /// known to report zero.
    /// Default: true
    #[serde(default = "default_true")]
    pub enforce_minimum_disk_size: bool,

    /// Force one upstream freshness check of the runtime component per
    /// process lifetime.
    ///
    /// Default: true
    #[serde(default = "default_true")]
    pub force_component_update_check: bool,
}

fn default_probe_path() -> PathBuf {
    PathBuf::from(DEFAULT_PROBE_PATH)
}

fn default_minimum_disk_size() -> u64 {
    MINIMUM_DISK_SIZE
}

fn default_reserve_percent() -> u8 {
    DISK_RESERVE_PERCENT
}

fn default_true() -> bool {
    true
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            free_space_probe_path: default_probe_path(),
            minimum_disk_size: default_minimum_disk_size(),
            reserve_percent: default_reserve_percent(),
            enforce_minimum_disk_size: true,
            force_component_update_check: true,
        }
    }
}

impl ManagerOptions {
    /// Options for dev boxes and tests: no minimum disk size.
    pub fn dev() -> Self {
        Self {
            enforce_minimum_disk_size: false,
            ..Default::default()
        }
    }

    /// Disk size to request given `free` bytes available.
    pub fn reserved_disk_size(&self, free: u64) -> u64 {
        let percent = u64::from(self.reserve_percent.min(100));
        // Widen so the multiply cannot overflow near u64::MAX.
        ((u128::from(free) * u128::from(percent)) / 100) as u64
    }
}

// ============================================================================
// Restart Options
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartOptions {
    /// Resolve every restart as success without touching any service.
    ///
    /// For headless and test hosts that have no VM support.
    /// Default: false
    #[serde(default)]
    pub skip_restart: bool,
}

// ============================================================================
// Logging Options
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingOptions {
    /// Filter directive used when `RUST_LOG` is unset.
    ///
    /// Default: "info"
    #[serde(default = "default_log_filter")]
    pub default_filter: String,

    /// Write logs to `{dir}/liteup.log` with daily rotation instead of stderr.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub ansi: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            default_filter: default_log_filter(),
            log_dir: None,
            ansi: true,
        }
    }
}

// ============================================================================
// Top-level Options
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteupOptions {
    #[serde(default)]
    pub manager: ManagerOptions,
    #[serde(default)]
    pub restart: RestartOptions,
    #[serde(default)]
    pub logging: LoggingOptions,
}

impl LiteupOptions {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut options = Self::default();
        options.apply_env()?;
        Ok(options)
    }

    /// Apply environment overrides on top of the current values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(envs::SKIP_RESTART) {
            self.restart.skip_restart = parse_bool(envs::SKIP_RESTART, &value)?;
        }
        if let Some(value) = lookup(envs::DEV_ENVIRONMENT) {
            self.manager.enforce_minimum_disk_size = !parse_bool(envs::DEV_ENVIRONMENT, &value)?;
        }
        if let Some(value) = lookup(envs::FREE_SPACE_PROBE_PATH) {
            self.manager.free_space_probe_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(envs::LOG_DIR) {
            self.logging.log_dir = Some(PathBuf::from(value));
        }
        Ok(())
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
        }),
    }
}
