//! Art-Net nodes and their frame loop
//!
//! A [`Node`] owns the universes sent to one host:port. Once started it
//! ticks every universe at a fixed rate and transmits frames that changed,
//! plus unchanged frames whose refresh interval ran out.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use artflow_core::config::MAX_FPS_LIMIT;
use artflow_core::{ChannelHandle, NodeConfig, OutputCorrection, Universe};

use crate::transport::Transport;
use crate::{error::ControlError, Result};

/// Lifecycle of a node's frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Idle,
    Running,
    Stopped,
}

/// Frame rate and refresh settings of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeOptions {
    /// Frames per second, clamped to 1-40
    pub max_fps: u32,
    /// Resend unchanged frames after this long; `None` never forces a resend
    /// and zero resends on every tick
    pub refresh_every: Option<Duration>,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            max_fps: 25,
            refresh_every: Some(Duration::from_millis(120)),
        }
    }
}

impl From<&NodeConfig> for NodeOptions {
    fn from(config: &NodeConfig) -> Self {
        Self {
            max_fps: config.max_fps,
            refresh_every: Some(config.refresh_interval()),
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Frames handed to the transport
    pub sent: usize,
    /// Frames the transport rejected
    pub failed: usize,
}

/// One Art-Net destination and the universes sent to it
pub struct Node {
    host: String,
    port: u16,
    frame_interval: Duration,
    refresh_every: Option<Duration>,
    universes: Mutex<BTreeMap<u16, Universe>>,
    transport: Mutex<Box<dyn Transport>>,
    state: Mutex<NodeState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Create an idle node
    pub fn new(
        host: impl Into<String>,
        port: u16,
        options: NodeOptions,
        transport: Box<dyn Transport>,
    ) -> Self {
        let host = host.into();
        let fps = options.max_fps.clamp(1, MAX_FPS_LIMIT);
        info!(
            "Art-Net node {}:{} created ({} fps, refresh {:?})",
            host, port, fps, options.refresh_every
        );

        Self {
            host,
            port,
            frame_interval: Duration::from_secs(1) / fps,
            refresh_every: options.refresh_every,
            universes: Mutex::new(BTreeMap::new()),
            transport: Mutex::new(transport),
            state: Mutex::new(NodeState::Idle),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn refresh_every(&self) -> Option<Duration> {
        self.refresh_every
    }

    pub fn state(&self) -> NodeState {
        *self.state.lock()
    }

    /// Add a new universe; fails if it already exists
    pub fn add_universe(&self, number: u16) -> Result<()> {
        let mut universes = self.universes.lock();
        if universes.contains_key(&number) {
            return Err(ControlError::Core(artflow_core::CoreError::invalid_config(
                format!("universe {} already exists on {}", number, self.address()),
            )));
        }
        universes.insert(number, Universe::new(number)?);
        info!("Node {}: added universe {}", self.address(), number);
        Ok(())
    }

    /// Create the universe on first reference.
    ///
    /// `correction` is only applied when the universe is created. Returns
    /// whether it was created.
    pub fn universe_or_insert(&self, number: u16, correction: Option<OutputCorrection>) -> Result<bool> {
        let mut universes = self.universes.lock();
        if universes.contains_key(&number) {
            return Ok(false);
        }
        let mut universe = Universe::new(number)?;
        universe.set_correction(correction);
        universes.insert(number, universe);
        info!(
            "Node {}: added universe {} (correction {})",
            self.address(),
            number,
            correction.map_or("none", |c| c.name())
        );
        Ok(true)
    }

    pub fn has_universe(&self, number: u16) -> bool {
        self.universes.lock().contains_key(&number)
    }

    /// Universe numbers in ascending order
    pub fn universe_numbers(&self) -> Vec<u16> {
        self.universes.lock().keys().copied().collect()
    }

    /// Run `f` against a universe while holding the universe lock
    pub fn with_universe<R>(&self, number: u16, f: impl FnOnce(&mut Universe) -> R) -> Option<R> {
        self.universes.lock().get_mut(&number).map(f)
    }

    /// Add a channel to an existing universe
    pub fn add_channel(
        &self,
        universe: u16,
        start: u16,
        width: u16,
        name: &str,
    ) -> Result<ChannelHandle> {
        self.with_universe(universe, |u| u.add_channel(start, width, name))
            .ok_or_else(|| {
                ControlError::Core(artflow_core::CoreError::invalid_config(format!(
                    "universe {} does not exist on {}",
                    universe,
                    self.address()
                )))
            })?
            .map_err(ControlError::from)
    }

    /// Tick every universe and send what needs sending.
    ///
    /// A transport failure is logged and leaves the universe unsent, so
    /// the next tick tries again; it never stops the remaining universes.
    pub fn tick(&self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        let mut universes = self.universes.lock();
        let mut transport = self.transport.lock();

        for universe in universes.values_mut() {
            universe.tick(now);
            if !universe.needs_send(now, self.refresh_every) {
                continue;
            }
            match transport.send(universe.number(), universe.frame()) {
                Ok(()) => {
                    universe.mark_sent(now);
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(
                        "Node {}: universe {} not sent: {}",
                        self.address(),
                        universe.number(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Start the frame loop on the current tokio runtime.
    ///
    /// Fails without a runtime, leaving the node idle.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            ControlError::NodeState(format!("node {} needs a tokio runtime: {}", self.address(), e))
        })?;
        {
            let mut state = self.state.lock();
            if *state != NodeState::Idle {
                return Err(ControlError::NodeState(format!(
                    "node {} cannot start from {:?}",
                    self.address(),
                    *state
                )));
            }
            *state = NodeState::Running;
        }

        let node = Arc::clone(self);
        let cancel = self.cancel.clone();
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(node.frame_interval);
            // A late tick moves on to the next boundary instead of bursting
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        node.tick(Instant::now());
                    }
                }
            }
            debug!("Node {} frame loop exited", node.address());
        });

        *self.task.lock() = Some(handle);
        info!("Node {} started", self.address());
        Ok(())
    }

    /// Stop the frame loop, letting an in-flight tick finish
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Node {} frame loop ended abnormally: {}", self.address(), e);
            }
        }
        *self.state.lock() = NodeState::Stopped;
        info!("Node {} stopped", self.address());
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("frame_interval", &self.frame_interval)
            .field("refresh_every", &self.refresh_every)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use artflow_core::ValueCurve;

    fn node(options: NodeOptions) -> (Node, MemoryTransport) {
        let transport = MemoryTransport::new();
        let node = Node::new("127.0.0.1", 6454, options, Box::new(transport.clone()));
        (node, transport)
    }

    #[test]
    fn test_fps_clamped() {
        let (n, _) = node(NodeOptions {
            max_fps: 100,
            refresh_every: None,
        });
        assert_eq!(n.frame_interval(), Duration::from_millis(25));

        let (n, _) = node(NodeOptions {
            max_fps: 0,
            refresh_every: None,
        });
        assert_eq!(n.frame_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = NodeConfig::new("10.0.0.1");
        config.refresh_every = 0;
        let options = NodeOptions::from(&config);
        assert_eq!(options.max_fps, 25);
        assert_eq!(options.refresh_every, Some(Duration::ZERO));
    }

    #[test]
    fn test_universe_management() {
        let (n, _) = node(NodeOptions::default());
        n.add_universe(1).unwrap();
        assert!(n.add_universe(1).is_err());
        assert!(!n.universe_or_insert(1, None).unwrap());
        assert!(n
            .universe_or_insert(2, Some(OutputCorrection::Cubic))
            .unwrap());
        assert!(n.universe_or_insert(2000, None).is_err());
        assert_eq!(n.universe_numbers(), vec![1, 2]);
        assert_eq!(
            n.with_universe(2, |u| u.correction()),
            Some(Some(OutputCorrection::Cubic))
        );
    }

    #[test]
    fn test_add_channel_requires_universe() {
        let (n, _) = node(NodeOptions::default());
        assert!(n.add_channel(0, 1, 1, "dimmer").is_err());
        n.add_universe(0).unwrap();
        assert!(n.add_channel(0, 1, 1, "dimmer").is_ok());
        assert!(matches!(
            n.add_channel(0, 1, 3, "rgb"),
            Err(ControlError::Core(artflow_core::CoreError::ChannelOverlap { .. }))
        ));
    }

    #[test]
    fn test_send_suppression_and_refresh() {
        let t0 = Instant::now();
        let (n, transport) = node(NodeOptions {
            max_fps: 25,
            refresh_every: Some(Duration::from_millis(120)),
        });
        n.add_universe(0).unwrap();
        n.add_channel(0, 1, 1, "dimmer").unwrap();

        assert_eq!(n.tick(t0).sent, 1);
        assert_eq!(n.tick(t0 + Duration::from_millis(40)).sent, 0);
        assert_eq!(transport.frame_count(), 1);

        assert_eq!(n.tick(t0 + Duration::from_millis(120)).sent, 1);
        assert_eq!(transport.frame_count(), 2);
    }

    #[test]
    fn test_zero_refresh_resends_every_tick() {
        let t0 = Instant::now();
        let (n, transport) = node(NodeOptions {
            max_fps: 25,
            refresh_every: Some(Duration::ZERO),
        });
        n.add_universe(0).unwrap();
        for i in 0..3 {
            n.tick(t0 + Duration::from_millis(40 * i));
        }
        assert_eq!(transport.frame_count(), 3);
    }

    #[test]
    fn test_changes_are_sent() {
        let t0 = Instant::now();
        let (n, transport) = node(NodeOptions {
            max_fps: 25,
            refresh_every: None,
        });
        n.add_universe(4).unwrap();
        let ch = n.add_channel(4, 2, 2, "ww").unwrap();

        n.tick(t0);
        ch.lock()
            .add_fade_at(&[100, 200], Duration::from_millis(80), ValueCurve::Linear, t0)
            .unwrap();
        n.tick(t0 + Duration::from_millis(40));
        n.tick(t0 + Duration::from_millis(80));
        n.tick(t0 + Duration::from_millis(120));

        let frames = transport.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].data, vec![0, 0, 0, 0]);
        assert_eq!(frames[1].data, vec![0, 50, 100, 0]);
        assert_eq!(frames[2].universe, 4);
        assert_eq!(frames[2].data, vec![0, 100, 200, 0]);
    }

    #[test]
    fn test_failed_send_is_retried_next_tick() {
        let t0 = Instant::now();
        let (n, transport) = node(NodeOptions {
            max_fps: 25,
            refresh_every: None,
        });
        n.add_universe(0).unwrap();
        n.add_universe(1).unwrap();

        transport.fail_next(1);
        let report = n.tick(t0);
        assert_eq!(report, TickReport { sent: 1, failed: 1 });

        let report = n.tick(t0 + Duration::from_millis(40));
        assert_eq!(report, TickReport { sent: 1, failed: 0 });
        assert_eq!(transport.frame_count(), 2);
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let (n, transport) = node(NodeOptions::default());
        let n = Arc::new(n);
        n.add_universe(0).unwrap();

        assert!(matches!(n.start(), Err(ControlError::NodeState(_))));
        assert_eq!(n.state(), NodeState::Idle);
        assert_eq!(transport.frame_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_loop_skips_missed_ticks() {
        let transport = MemoryTransport::new();
        let n = Arc::new(Node::new(
            "127.0.0.1",
            6454,
            NodeOptions {
                max_fps: 40,
                refresh_every: Some(Duration::ZERO),
            },
            Box::new(transport.clone()),
        ));
        n.add_universe(0).unwrap();
        n.start().unwrap();

        // First tick fires right away, the next one is due at 25ms
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(transport.frame_count(), 1);

        // Ten intervals pass at once: one catch-up tick, not ten
        tokio::time::advance(Duration::from_millis(250)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.frame_count(), 2);

        // Back on the 25ms grid afterwards
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.frame_count(), 3);

        n.stop().await;
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let transport = MemoryTransport::new();
        let n = Arc::new(Node::new(
            "127.0.0.1",
            6454,
            NodeOptions {
                max_fps: 40,
                refresh_every: Some(Duration::ZERO),
            },
            Box::new(transport.clone()),
        ));
        n.add_universe(0).unwrap();
        assert_eq!(n.state(), NodeState::Idle);

        n.start().unwrap();
        assert_eq!(n.state(), NodeState::Running);
        assert!(n.start().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        n.stop().await;
        assert_eq!(n.state(), NodeState::Stopped);

        let sent = transport.frame_count();
        assert!(sent >= 2, "only {} frames sent", sent);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.frame_count(), sent);
        assert!(n.start().is_err());
    }
}
