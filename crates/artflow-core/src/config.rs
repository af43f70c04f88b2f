//! Configuration schema
//!
//! The TOML layout follows the node → universe → device hierarchy:
//!
//! ```toml
//! [[nodes]]
//! host = "192.168.1.50"
//! max_fps = 25
//! refresh_every = 120
//!
//! [nodes.universes.0]
//! output_correction = "quadratic"
//!
//! [[nodes.universes.0.devices]]
//! channel = 1
//! name = "Kitchen"
//! type = "rgbw"
//! transition = 1.5
//! ```
//!
//! Validation is split by level so that a malformed device only blocks
//! itself, a malformed universe only its devices, and a malformed node
//! only its universes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::channel::UNIVERSE_SIZE;
use crate::correction::{CorrectionRegistry, OutputCorrection};
use crate::error::{CoreError, Result};
use crate::fixture::{FixtureKind, DEFAULT_MAX_MIREDS, DEFAULT_MIN_MIREDS};
use crate::logging::LogConfig;
use crate::universe::MAX_UNIVERSE;

/// Default Art-Net UDP port
pub const DEFAULT_PORT: u16 = 6454;
/// Default frame rate
pub const DEFAULT_MAX_FPS: u32 = 25;
/// Highest accepted frame rate
pub const MAX_FPS_LIMIT: u32 = 40;
/// Default forced refresh interval in milliseconds
pub const DEFAULT_REFRESH_EVERY: u32 = 120;
/// Highest accepted refresh interval in milliseconds
pub const MAX_REFRESH_EVERY: u32 = 9999;
/// Highest accepted device transition in seconds
pub const MAX_TRANSITION: f64 = 999.0;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_fps() -> u32 {
    DEFAULT_MAX_FPS
}

fn default_refresh_every() -> u32 {
    DEFAULT_REFRESH_EVERY
}

fn default_min_mireds() -> u16 {
    DEFAULT_MIN_MIREDS
}

fn default_max_mireds() -> u16 {
    DEFAULT_MAX_MIREDS
}

/// Top level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Collect every problem in the file, from nodes down to devices
    pub fn check_all(&self, corrections: &CorrectionRegistry) -> Vec<CoreError> {
        let mut problems = Vec::new();
        for node in &self.nodes {
            if let Err(e) = node.validate() {
                problems.push(e);
                continue;
            }
            for (key, universe) in &node.universes {
                if let Err(e) = universe.validate(key, corrections) {
                    problems.push(e);
                    continue;
                }
                problems.extend(
                    universe
                        .devices
                        .iter()
                        .filter_map(|d| d.validate(corrections).err()),
                );
            }
        }
        problems
    }
}

/// One Art-Net node (host:port)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Frames per second, 1-40
    #[serde(default = "default_max_fps")]
    pub max_fps: u32,
    /// Forced resend interval in milliseconds, 0 resends every frame
    #[serde(default = "default_refresh_every")]
    pub refresh_every: u32,
    /// Universes keyed by universe number
    #[serde(default)]
    pub universes: BTreeMap<String, UniverseConfig>,
}

impl NodeConfig {
    /// Node with defaults and no universes
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            max_fps: DEFAULT_MAX_FPS,
            refresh_every: DEFAULT_REFRESH_EVERY,
            universes: BTreeMap::new(),
        }
    }

    /// Check node-level settings
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(CoreError::invalid_config("node host must not be empty"));
        }
        if !(1..=MAX_FPS_LIMIT).contains(&self.max_fps) {
            return Err(CoreError::invalid_config(format!(
                "max_fps {} for {} must be 1-{}",
                self.max_fps, self.host, MAX_FPS_LIMIT
            )));
        }
        if self.refresh_every > MAX_REFRESH_EVERY {
            return Err(CoreError::invalid_config(format!(
                "refresh_every {} for {} must be 0-{}",
                self.refresh_every, self.host, MAX_REFRESH_EVERY
            )));
        }
        Ok(())
    }

    /// Identity used to share one node between configuration blocks
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Time between frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.max_fps.clamp(1, MAX_FPS_LIMIT)
    }

    /// Maximum time between two sends of an unchanged universe
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.refresh_every))
    }
}

/// One universe of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniverseConfig {
    #[serde(default)]
    pub output_correction: Option<String>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl UniverseConfig {
    /// Check the universe key and its correction name
    pub fn validate(&self, key: &str, corrections: &CorrectionRegistry) -> Result<u16> {
        let number = parse_universe_key(key)?;
        corrections.resolve(self.output_correction.as_deref())?;
        Ok(number)
    }

    /// Resolve the configured correction
    pub fn correction(&self, corrections: &CorrectionRegistry) -> Result<Option<OutputCorrection>> {
        corrections.resolve(self.output_correction.as_deref())
    }
}

/// Parse a universe table key ("0"-"1024")
pub fn parse_universe_key(key: &str) -> Result<u16> {
    let number: u16 = key
        .trim()
        .parse()
        .map_err(|_| CoreError::invalid_config(format!("universe key '{}' is not a number", key)))?;
    if number > MAX_UNIVERSE {
        return Err(CoreError::UniverseRange(number));
    }
    Ok(number)
}

/// One fixture within a universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// First DMX address, 1-512
    pub channel: u16,
    pub name: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    /// Fixture type name; dimmer when omitted
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Default transition in seconds, 0-999
    #[serde(default)]
    pub transition: f64,
    #[serde(default)]
    pub output_correction: Option<String>,
    #[serde(default = "default_min_mireds")]
    pub min_mireds: u16,
    #[serde(default = "default_max_mireds")]
    pub max_mireds: u16,
}

impl DeviceConfig {
    /// Device with defaults
    pub fn new(channel: u16, name: impl Into<String>, kind: FixtureKind) -> Self {
        Self {
            channel,
            name: name.into(),
            friendly_name: None,
            kind: Some(kind.name().to_string()),
            transition: 0.0,
            output_correction: None,
            min_mireds: DEFAULT_MIN_MIREDS,
            max_mireds: DEFAULT_MAX_MIREDS,
        }
    }

    /// Resolve the fixture type
    pub fn fixture_kind(&self) -> Result<FixtureKind> {
        match &self.kind {
            Some(name) => name.parse(),
            None => Ok(FixtureKind::default()),
        }
    }

    /// Name shown to users
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.name)
    }

    /// Check the device and return its fixture type
    pub fn validate(&self, corrections: &CorrectionRegistry) -> Result<FixtureKind> {
        let kind = self.fixture_kind()?;
        let end = u32::from(self.channel) + u32::from(kind.width()) - 1;
        if self.channel == 0 || end > UNIVERSE_SIZE as u32 {
            return Err(CoreError::ChannelRange {
                start: self.channel,
                width: kind.width(),
            });
        }
        if !(0.0..=MAX_TRANSITION).contains(&self.transition) {
            return Err(CoreError::invalid_config(format!(
                "transition {} for {} must be 0-{}",
                self.transition, self.name, MAX_TRANSITION
            )));
        }
        if self.min_mireds >= self.max_mireds {
            return Err(CoreError::invalid_config(format!(
                "min_mireds {} for {} must be below max_mireds {}",
                self.min_mireds, self.name, self.max_mireds
            )));
        }
        corrections.resolve(self.output_correction.as_deref())?;
        Ok(kind)
    }

    /// Resolve the configured correction
    pub fn correction(&self, corrections: &CorrectionRegistry) -> Result<Option<OutputCorrection>> {
        corrections.resolve(self.output_correction.as_deref())
    }
}
