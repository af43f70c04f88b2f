//! Nodes keyed by host:port

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use artflow_core::NodeConfig;

use crate::node::{Node, NodeOptions, NodeState};
use crate::transport::Transport;
use crate::Result;

/// Owns every node of the process.
///
/// Configuration blocks naming the same host and port share one node.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a node by `host:port`
    pub fn get(&self, address: &str) -> Option<Arc<Node>> {
        self.nodes.get(address).cloned()
    }

    /// Return the node for `config`, creating it with a transport from
    /// `connect` on first reference.
    ///
    /// An existing node keeps the frame rate and refresh it was created
    /// with.
    pub fn get_or_create<F>(&mut self, config: &NodeConfig, connect: F) -> Result<Arc<Node>>
    where
        F: FnOnce(&NodeConfig) -> Result<Box<dyn Transport>>,
    {
        let address = config.address();
        if let Some(node) = self.nodes.get(&address) {
            return Ok(Arc::clone(node));
        }

        let transport = connect(config)?;
        let node = Arc::new(Node::new(
            config.host.clone(),
            config.port,
            NodeOptions::from(config),
            transport,
        ));
        self.nodes.insert(address, Arc::clone(&node));
        Ok(node)
    }

    /// Every node, ordered by address
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        let mut nodes: Vec<_> = self.nodes.values().cloned().collect();
        nodes.sort_by_key(|n| n.address());
        nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Start every idle node
    pub fn start_all(&self) -> Result<()> {
        for node in self.nodes() {
            if node.state() == NodeState::Idle {
                node.start()?;
            }
        }
        Ok(())
    }

    /// Stop every node and wait for its loop to exit
    pub async fn stop_all(&self) {
        for node in self.nodes() {
            node.stop().await;
        }
        info!("All Art-Net nodes stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn memory(_: &NodeConfig) -> Result<Box<dyn Transport>> {
        Ok(Box::new(MemoryTransport::new()))
    }

    #[test]
    fn test_same_address_shares_node() {
        let mut registry = NodeRegistry::new();
        let config = NodeConfig::new("10.0.0.5");

        let a = registry.get_or_create(&config, memory).unwrap();
        let mut slower = config.clone();
        slower.max_fps = 5;
        let b = registry.get_or_create(&slower, memory).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.frame_interval(), std::time::Duration::from_millis(40));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_port_distinguishes_nodes() {
        let mut registry = NodeRegistry::new();
        let a = NodeConfig::new("10.0.0.5");
        let mut b = a.clone();
        b.port = 6455;

        registry.get_or_create(&a, memory).unwrap();
        registry.get_or_create(&b, memory).unwrap();

        let addresses: Vec<_> = registry.nodes().iter().map(|n| n.address()).collect();
        assert_eq!(addresses, vec!["10.0.0.5:6454", "10.0.0.5:6455"]);
        assert!(registry.get("10.0.0.5:6455").is_some());
        assert!(registry.get("10.0.0.6:6454").is_none());
    }

    #[test]
    fn test_connect_failure_creates_nothing() {
        let mut registry = NodeRegistry::new();
        let result = registry.get_or_create(&NodeConfig::new("10.0.0.5"), |_| {
            Err(crate::ControlError::InvalidAddress("nope".to_string()))
        });
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_start_and_stop_all() {
        let mut registry = NodeRegistry::new();
        registry
            .get_or_create(&NodeConfig::new("10.0.0.1"), memory)
            .unwrap();
        registry
            .get_or_create(&NodeConfig::new("10.0.0.2"), memory)
            .unwrap();

        registry.start_all().unwrap();
        assert!(registry
            .nodes()
            .iter()
            .all(|n| n.state() == NodeState::Running));

        registry.stop_all().await;
        assert!(registry
            .nodes()
            .iter()
            .all(|n| n.state() == NodeState::Stopped));
    }
}
