//! ArtFlow Control - Art-Net Output and Frame Scheduling
//!
//! This crate puts the universes of `artflow-core` on the wire:
//! - **Art-Net**: ArtDmx packet encoding
//! - **Transport**: non-blocking UDP output, plus an in-memory recorder
//! - **Nodes**: one fixed-rate frame loop per host:port
//! - **Rig**: nodes, universes and fixtures built from configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use artflow_control::Rig;
//! use artflow_core::{AppConfig, CorrectionRegistry};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("artflow.toml")?;
//! let rig = Rig::from_config(&config, &CorrectionRegistry::new());
//! rig.start()?;
//! // ...
//! rig.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`artnet`] - ArtDmx framing
//! - [`transport`] - Frame transports
//! - [`node`] - Per-node frame loop
//! - [`registry`] - Nodes keyed by host:port
//! - [`rig`] - Configuration-driven setup
//! - [`error`] - Error types

/// ArtDmx framing
pub mod artnet;
/// Error types
pub mod error;
/// Per-node frame loop
pub mod node;
/// Nodes keyed by host:port
pub mod registry;
/// Configuration-driven setup
pub mod rig;
/// Frame transports
pub mod transport;

pub use artnet::{build_artdmx_packet, ArtDmx, Sequence, ARTNET_PORT};
pub use error::{ControlError, Result};
pub use node::{Node, NodeOptions, NodeState, TickReport};
pub use registry::NodeRegistry;
pub use rig::{Rig, SkippedItem, EVENT_QUEUE_CAPACITY};
pub use transport::{MemoryTransport, SentFrame, Transport, UdpTransport};
