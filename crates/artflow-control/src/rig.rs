//! Build nodes, universes and fixtures from configuration
//!
//! Malformed entries are skipped and reported instead of aborting setup:
//! a bad node drops its universes, a bad universe drops its devices, and a
//! bad device drops only itself.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use tracing::{error, info};

use artflow_core::{
    AppConfig, ChannelEvent, CorrectionRegistry, DeviceConfig, Fixture, NodeConfig,
    UniverseConfig,
};

use crate::node::Node;
use crate::registry::NodeRegistry;
use crate::transport::{Transport, UdpTransport};
use crate::Result;

/// Events kept for a slow or absent listener; newer ones are dropped
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// A configuration entry that was left out, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub what: String,
    pub error: String,
}

/// Everything a configuration file sets up
#[derive(Debug)]
pub struct Rig {
    registry: NodeRegistry,
    fixtures: Vec<Fixture>,
    events: Receiver<ChannelEvent>,
    skipped: Vec<SkippedItem>,
}

impl Rig {
    /// Build the rig, sending over UDP
    pub fn from_config(config: &AppConfig, corrections: &CorrectionRegistry) -> Self {
        Self::build(config, corrections, |node: &NodeConfig| {
            let transport = UdpTransport::new(&node.host, node.port)?;
            Ok(Box::new(transport) as Box<dyn Transport>)
        })
    }

    /// Build the rig with transports created by `connect`, one per node
    pub fn build<F>(config: &AppConfig, corrections: &CorrectionRegistry, mut connect: F) -> Self
    where
        F: FnMut(&NodeConfig) -> Result<Box<dyn Transport>>,
    {
        let (sender, events) = bounded(EVENT_QUEUE_CAPACITY);
        let mut rig = Self {
            registry: NodeRegistry::new(),
            fixtures: Vec::new(),
            events,
            skipped: Vec::new(),
        };

        for node_config in &config.nodes {
            let address = node_config.address();
            let node = match node_config
                .validate()
                .map_err(Into::into)
                .and_then(|()| rig.registry.get_or_create(node_config, &mut connect))
            {
                Ok(node) => node,
                Err(e) => {
                    rig.skip(format!("node {}", address), e);
                    continue;
                }
            };

            for (key, universe_config) in &node_config.universes {
                let number = match add_universe(&node, key, universe_config, corrections) {
                    Ok(number) => number,
                    Err(e) => {
                        rig.skip(format!("universe {} on {}", key, address), e);
                        continue;
                    }
                };

                for device in &universe_config.devices {
                    match add_device(&node, number, device, corrections, &sender) {
                        Ok(fixture) => rig.fixtures.push(fixture),
                        Err(e) => rig.skip(
                            format!("device {} in universe {} on {}", device.name, number, address),
                            e,
                        ),
                    }
                }
            }
        }

        info!(
            "Rig ready: {} nodes, {} fixtures, {} skipped",
            rig.registry.len(),
            rig.fixtures.len(),
            rig.skipped.len()
        );
        rig
    }

    fn skip(&mut self, what: String, error: impl std::fmt::Display) {
        error!("Skipping {}: {}", what, error);
        self.skipped.push(SkippedItem {
            what,
            error: error.to_string(),
        });
    }

    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    /// First fixture with this name
    pub fn fixture(&self, name: &str) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.name() == name)
    }

    pub fn fixture_mut(&mut self, name: &str) -> Option<&mut Fixture> {
        self.fixtures.iter_mut().find(|f| f.name() == name)
    }

    /// Value-changed and fade-finished notifications of every fixture.
    ///
    /// Holds at most [`EVENT_QUEUE_CAPACITY`] undelivered events.
    pub fn events(&self) -> Receiver<ChannelEvent> {
        self.events.clone()
    }

    /// Entries left out during the build
    pub fn skipped(&self) -> &[SkippedItem] {
        &self.skipped
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Start every node loop
    pub fn start(&self) -> Result<()> {
        self.registry.start_all()
    }

    /// Stop every node loop
    pub async fn stop(&self) {
        self.registry.stop_all().await;
    }
}

fn add_universe(
    node: &Arc<Node>,
    key: &str,
    config: &UniverseConfig,
    corrections: &CorrectionRegistry,
) -> Result<u16> {
    let number = config.validate(key, corrections)?;
    node.universe_or_insert(number, config.correction(corrections)?)?;
    Ok(number)
}

fn add_device(
    node: &Arc<Node>,
    universe: u16,
    config: &DeviceConfig,
    corrections: &CorrectionRegistry,
    events: &Sender<ChannelEvent>,
) -> Result<Fixture> {
    let kind = config.validate(corrections)?;
    let handle = node.add_channel(universe, config.channel, kind.width(), &config.name)?;
    {
        let mut channel = handle.lock();
        channel.set_correction(config.correction(corrections)?);
        channel.subscribe(events.clone());
    }

    let fixture = Fixture::new(config.name.clone(), kind, handle, config.transition)?
        .with_mireds(config.min_mireds, config.max_mireds);
    info!(
        "Fixture '{}' ({}) at {}/{}",
        config.display_name(),
        kind,
        universe,
        config.channel
    );
    Ok(fixture)
}
