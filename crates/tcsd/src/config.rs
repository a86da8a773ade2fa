use serde::Deserialize;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// Config file read when `TCSD_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/tcsd/tcsd.toml";

/// Which D-Bus bus the service registers on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    System,
    Session,
}

impl BusKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "system" => Some(Self::System),
            "session" => Some(Self::Session),
            _ => None,
        }
    }
}

/// Daemon configuration.
///
/// The slave address and register map are fixed; only the adapter and
/// service plumbing are configurable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// I2C adapter device path (default: /dev/i2c-1).
    pub i2c_bus: String,
    /// Read and check the ID register before powering on.
    pub verify_identity: bool,
    /// D-Bus bus to serve on.
    pub bus: BusKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            i2c_bus: "/dev/i2c-1".to_string(),
            verify_identity: true,
            bus: BusKind::System,
        }
    }
}

impl Config {
    /// Load the TOML file (if any), then apply `TCSD_*` environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let explicit = lookup("TCSD_CONFIG").map(PathBuf::from);
        Self::load_from(explicit.as_deref(), Path::new(DEFAULT_CONFIG_PATH), lookup)
    }

    /// An explicit path must exist; a missing default path falls back to defaults.
    pub fn load_from(
        explicit: Option<&Path>,
        default_path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if default_path.exists() => Self::from_file(default_path)?,
            None => {
                tracing::debug!(path = %default_path.display(), "no config file, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(lookup);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&src)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml(src: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(src)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bus) = lookup("TCSD_I2C_BUS") {
            self.i2c_bus = bus;
        }
        if let Some(v) = lookup("TCSD_VERIFY_IDENTITY") {
            self.verify_identity = v != "0";
        }
        if let Some(v) = lookup("TCSD_BUS") {
            match BusKind::parse(&v) {
                Some(kind) => self.bus = kind,
                None => tracing::warn!(value = %v, "ignoring invalid TCSD_BUS"),
            }
        }
    }
}
