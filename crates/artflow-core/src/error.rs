//! Error types for the fade engine and its configuration
use thiserror::Error;

/// Configuration errors raised while building universes, channels and fades.
///
/// None of these occur at tick time: they are reported when a universe,
/// channel or fade request is set up, and block only the affected item.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Channel does not fit into the 1-512 address space
    #[error("Channel range {start}+{width} is outside 1-512")]
    ChannelRange {
        /// First DMX address (1-based)
        start: u16,
        /// Number of slots
        width: u16,
    },

    /// Channel intersects a channel that already exists in the universe
    #[error("Channel {name} ({start}-{end}) overlaps existing channel {existing}")]
    ChannelOverlap {
        /// Name of the rejected channel
        name: String,
        /// First address of the rejected channel
        start: u16,
        /// Last address of the rejected channel
        end: u16,
        /// Name of the channel it collides with
        existing: String,
    },

    /// Universe number outside 0-1024
    #[error("Universe {0} is outside 0-1024")]
    UniverseRange(u16),

    /// Fixture type name is not known
    #[error("Unknown fixture type: {0}")]
    UnknownFixtureType(String),

    /// Output correction name is not known
    #[error("Unknown output correction: {0}")]
    UnknownCorrection(String),

    /// Fade target does not match the channel width
    #[error("Fade target has {actual} values, channel {channel} is {expected} wide")]
    FadeWidthMismatch {
        /// Channel name
        channel: String,
        /// Channel width
        expected: usize,
        /// Number of target values supplied
        actual: usize,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// TOML parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Creates an invalid configuration error with a custom message.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, CoreError>;
