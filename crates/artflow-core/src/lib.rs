//! ArtFlow Core - Fade Engine and Universe Model
//!
//! This crate contains the network-free part of ArtFlow:
//! - Easing curves and output correction curves
//! - Fades and the channels that run them
//! - Universes and their frame buffers
//! - Fixture target-value policies (dimmer, RGB, warm/cool white, RGBW)
//! - Configuration schema and logging settings
//!
//! ## Example
//!
//! ```rust
//! use artflow_core::{Universe, ValueCurve};
//! use std::time::{Duration, Instant};
//!
//! # fn main() -> artflow_core::Result<()> {
//! let mut universe = Universe::new(0)?;
//! let spot = universe.add_channel(1, 3, "spot")?;
//!
//! let start = Instant::now();
//! spot.lock()
//!     .add_fade_at(&[255, 128, 0], Duration::from_secs(1), ValueCurve::Linear, start)?;
//!
//! universe.tick(start + Duration::from_millis(500));
//! assert_eq!(&universe.frame()[..3], &[128, 64, 0]);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod correction;
pub mod curve;
pub mod error;
pub mod fade;
pub mod fixture;
pub mod logging;
pub mod universe;

// Engine
pub use channel::{
    Channel, ChannelEvent, ChannelHandle, ChannelSnapshot, DEFAULT_NOTIFY_INTERVAL, UNIVERSE_SIZE,
};
pub use correction::{CorrectionRegistry, OutputCorrection};
pub use curve::ValueCurve;
pub use fade::Fade;
pub use universe::{Universe, MAX_UNIVERSE};

// Fixtures
pub use fixture::{
    compute_target, Fixture, FixtureAttributes, FixtureKind, FixtureState, TurnOn,
};

// Configuration
pub use config::{AppConfig, DeviceConfig, NodeConfig, UniverseConfig};
pub use logging::LogConfig;

pub use error::{CoreError, Result};
