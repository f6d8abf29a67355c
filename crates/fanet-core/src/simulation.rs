//! Discrete-Event FANET Simulation
//!
//! This module drives a swarm of [`ProtocolEngine`]s without hardware. It
//! models:
//!
//! - One GCS (address 10.0.0.1) and N UAVs (10.0.0.2 onward)
//! - A unit-disk radio: a datagram reaches every node within `radio_range`
//! - Fixed link latency
//! - UAV movement through [`BounceMobility`]
//!
//! Engines reach the shared clock, event queue and medium through small
//! adapter types implementing the collaborator traits.
//!
//! ## Example
//!
//! ```ignore
//! use fanet_core::simulation::{FanetSimulator, ScenarioConfig};
//!
//! let config = ScenarioConfig::default().with_uav_count(5).with_seed(7);
//! let mut sim = FanetSimulator::new(config)?;
//! sim.run();
//!
//! let stats = sim.stats();
//! println!("Delivery ratio: {:.1}%", stats.delivery_ratio() * 100.0);
//! ```

use crate::config::{check_seconds, secs, FanetConfig, RoutingMode};
use crate::error::{FanetError, Result};
use crate::mesh::diagnostics::TracingSink;
use crate::mesh::engine::{Collaborators, ProtocolEngine};
use crate::mesh::packet::{NodeAddress, Position, Role};
use crate::mesh::traits::{
    EngineStats, MessageHandler, PositionProvider, Scheduler, StatisticsSource, TimerHandle,
    TimerHandler, Transport,
};
use crate::mobility::{BounceMobility, Bounds, Mobility, StaticMobility};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Address of the ground control station
pub const GCS_ADDRESS: NodeAddress = NodeAddress::new(10, 0, 0, 1);

/// Scenario configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Number of UAVs (the GCS comes on top)
    pub uav_count: usize,
    /// Fixed GCS position
    pub gcs_position: Position,
    /// Explicit UAV start positions; random inside `bounds` when empty
    pub uav_positions: Vec<Position>,
    /// Flight area and altitude band
    pub bounds: Bounds,
    /// UAV speed range (m/s)
    pub min_speed: f64,
    pub max_speed: f64,
    /// Mobility update interval (seconds)
    pub mobility_interval: f64,
    /// Whether UAVs move at all
    pub mobility: bool,
    /// Radio range of the medium (meters)
    pub radio_range: f64,
    /// One-way link latency (seconds)
    pub link_latency: f64,
    /// Simulated duration (seconds)
    pub duration: f64,
    /// Seed for placement, mobility and per-node engines
    pub seed: u64,
    /// Template applied to every node
    pub node: FanetConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            uav_count: 5,
            gcs_position: Position::new(1000.0, 1000.0, 0.0),
            uav_positions: Vec::new(),
            bounds: Bounds::default(),
            min_speed: 10.0,
            max_speed: 20.0,
            mobility_interval: 1.0,
            mobility: true,
            radio_range: 1000.0,
            link_latency: 0.001,
            duration: 400.0,
            seed: 42,
            node: FanetConfig::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn with_uav_count(mut self, count: usize) -> Self {
        self.uav_count = count;
        self
    }

    /// Place UAVs explicitly; also sets the UAV count
    pub fn with_uav_positions(mut self, positions: Vec<Position>) -> Self {
        self.uav_count = positions.len();
        self.uav_positions = positions;
        self
    }

    pub fn with_gcs_position(mut self, position: Position) -> Self {
        self.gcs_position = position;
        self
    }

    /// Set both the medium range and every node's transmission range
    pub fn with_range(mut self, meters: f64) -> Self {
        self.radio_range = meters;
        self.node.max_transmission_range = meters;
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = secs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_mobility(mut self, enabled: bool) -> Self {
        self.mobility = enabled;
        self
    }

    pub fn with_routing_mode(mut self, mode: RoutingMode) -> Self {
        self.node.routing_mode = mode;
        self
    }

    /// Load a scenario from a JSON file. Missing fields take defaults.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| FanetError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn duration(&self) -> Duration {
        secs(self.duration)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.radio_range.is_finite() || self.radio_range <= 0.0 {
            return Err(FanetError::Config(format!(
                "radio_range must be positive, got {}",
                self.radio_range
            )));
        }
        for (name, value) in [
            ("mobility_interval", self.mobility_interval),
            ("duration", self.duration),
        ] {
            if value <= 0.0 {
                return Err(FanetError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
            check_seconds(name, value)?;
        }
        if self.link_latency < 0.0 {
            return Err(FanetError::Config(format!(
                "link_latency must be non-negative, got {}",
                self.link_latency
            )));
        }
        check_seconds("link_latency", self.link_latency)?;
        let b = &self.bounds;
        if b.min_x >= b.max_x || b.min_y >= b.max_y || b.min_z >= b.max_z {
            return Err(FanetError::Config("bounds must have min < max on every axis".into()));
        }
        if self.min_speed < 0.0 || self.min_speed > self.max_speed {
            return Err(FanetError::Config(format!(
                "invalid speed range [{}, {}]",
                self.min_speed, self.max_speed
            )));
        }
        if !self.uav_positions.is_empty() && self.uav_positions.len() != self.uav_count {
            return Err(FanetError::Config(format!(
                "{} UAV positions given for {} UAVs",
                self.uav_positions.len(),
                self.uav_count
            )));
        }
        if self.uav_count > 60_000 {
            return Err(FanetError::Config("too many UAVs".into()));
        }
        self.node.validate()
    }
}

/// Simulation statistics
#[derive(Debug, Clone, Default)]
pub struct SimStats {
    /// Simulated time reached
    pub elapsed: Duration,
    /// Datagrams handed to the medium
    pub datagrams_sent: u64,
    /// Receptions scheduled by the medium
    pub datagrams_delivered: u64,
    /// Unicasts whose destination was unknown or out of range
    pub datagrams_lost: u64,
    /// Sensor payloads originated by UAVs
    pub sensor_sent: u64,
    /// Sensor payloads delivered at the GCS
    pub sensor_delivered: u64,
    /// Per-node statistics
    pub per_node: Vec<NodeStats>,
}

impl SimStats {
    /// Sensor delivery ratio (0.0 - 1.0)
    pub fn delivery_ratio(&self) -> f64 {
        if self.sensor_sent == 0 {
            0.0
        } else {
            self.sensor_delivered as f64 / self.sensor_sent as f64
        }
    }
}

/// Per-node statistics
#[derive(Debug, Clone)]
pub struct NodeStats {
    pub index: usize,
    pub address: NodeAddress,
    pub role: Role,
    pub position: Position,
    pub crashed: bool,
    pub engine: EngineStats,
}

#[derive(Debug)]
enum EventKind {
    Timer { node: usize, handle: TimerHandle },
    Deliver { node: usize, payload: Rc<[u8]>, sender: NodeAddress },
    Move,
}

#[derive(Debug)]
struct Event {
    at: Duration,
    seq: u64,
    kind: EventKind,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// A datagram waiting for the medium
struct Outgoing {
    from: usize,
    to: Option<NodeAddress>,
    payload: Vec<u8>,
}

/// Clock, event queue and medium shared by every node adapter
#[derive(Default)]
struct SimCore {
    now: Duration,
    seq: u64,
    next_timer: u64,
    queue: BinaryHeap<Reverse<Event>>,
    cancelled: HashSet<TimerHandle>,
    outbox: Vec<Outgoing>,
    positions: Vec<Position>,
}

impl SimCore {
    fn push(&mut self, at: Duration, kind: EventKind) {
        self.seq += 1;
        self.queue.push(Reverse(Event {
            at,
            seq: self.seq,
            kind,
        }));
    }

    /// Next live event due at or before `deadline`
    fn pop_until(&mut self, deadline: Duration) -> Option<Event> {
        loop {
            match self.queue.peek() {
                Some(Reverse(event)) if event.at <= deadline => {}
                _ => return None,
            }
            let Reverse(event) = self.queue.pop()?;
            if let EventKind::Timer { handle, .. } = &event.kind {
                if self.cancelled.remove(handle) {
                    continue;
                }
            }
            self.now = event.at;
            return Some(event);
        }
    }
}

type SharedCore = Rc<RefCell<SimCore>>;

struct SimScheduler {
    core: SharedCore,
    node: usize,
}

impl Scheduler for SimScheduler {
    fn now(&self) -> Duration {
        self.core.borrow().now
    }

    fn schedule_after(&mut self, delay: Duration) -> TimerHandle {
        let mut core = self.core.borrow_mut();
        core.next_timer += 1;
        let handle = TimerHandle::new(core.next_timer);
        let at = core.now.saturating_add(delay);
        core.push(
            at,
            EventKind::Timer {
                node: self.node,
                handle,
            },
        );
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.core.borrow_mut().cancelled.insert(handle);
    }
}

struct SimTransport {
    core: SharedCore,
    node: usize,
}

impl Transport for SimTransport {
    fn send_unicast(&mut self, payload: Vec<u8>, destination: NodeAddress, _port: u16) {
        self.core.borrow_mut().outbox.push(Outgoing {
            from: self.node,
            to: Some(destination),
            payload,
        });
    }

    fn send_broadcast(&mut self, payload: Vec<u8>, _port: u16) {
        self.core.borrow_mut().outbox.push(Outgoing {
            from: self.node,
            to: None,
            payload,
        });
    }
}

struct SimPosition {
    core: SharedCore,
    node: usize,
}

impl PositionProvider for SimPosition {
    fn current_position(&self) -> Position {
        self.core
            .borrow()
            .positions
            .get(self.node)
            .copied()
            .unwrap_or_default()
    }
}

/// Simulated node wrapper
struct SimNode {
    engine: ProtocolEngine,
    mobility: Box<dyn Mobility>,
    address: NodeAddress,
    crashed: bool,
}

/// Medium counters
#[derive(Debug, Default)]
struct MediumCounters {
    sent: u64,
    delivered: u64,
    lost: u64,
}

/// Multi-node FANET simulator
pub struct FanetSimulator {
    config: ScenarioConfig,
    core: SharedCore,
    nodes: Vec<SimNode>,
    index: HashMap<NodeAddress, usize>,
    medium: MediumCounters,
}

impl FanetSimulator {
    /// Build the GCS and UAVs and start every engine
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        config.validate()?;

        let core = SharedCore::default();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let b = config.bounds;

        let mut placements = vec![(config.gcs_position, true)];
        for i in 0..config.uav_count {
            let position = match config.uav_positions.get(i) {
                Some(p) => *p,
                None => Position::new(
                    rng.gen_range(b.min_x..b.max_x),
                    rng.gen_range(b.min_y..b.max_y),
                    rng.gen_range(b.min_z..b.max_z),
                ),
            };
            placements.push((position, false));
        }
        core.borrow_mut().positions = placements.iter().map(|(p, _)| *p).collect();

        let base = GCS_ADDRESS.to_u32();
        let mut nodes = Vec::with_capacity(placements.len());
        let mut index = HashMap::new();

        for (i, (position, is_gcs)) in placements.into_iter().enumerate() {
            let address = NodeAddress::from_u32(base + i as u32);
            let node_config = FanetConfig {
                node_index: i as u32,
                address,
                is_gcs,
                seed: config.seed.wrapping_add(i as u64),
                gcs_address: config.node.gcs_address.or(Some(GCS_ADDRESS)),
                ..config.node.clone()
            };

            let mobility: Box<dyn Mobility> = if is_gcs || !config.mobility {
                Box::new(StaticMobility::new(position))
            } else {
                Box::new(BounceMobility::new(
                    position,
                    b,
                    config.min_speed,
                    config.max_speed,
                    config.seed.wrapping_mul(31).wrapping_add(i as u64),
                ))
            };

            let engine = ProtocolEngine::new(
                node_config,
                Collaborators {
                    position: Box::new(SimPosition {
                        core: core.clone(),
                        node: i,
                    }),
                    transport: Box::new(SimTransport {
                        core: core.clone(),
                        node: i,
                    }),
                    scheduler: Box::new(SimScheduler {
                        core: core.clone(),
                        node: i,
                    }),
                    diagnostics: Box::new(TracingSink),
                },
            )?;

            index.insert(address, i);
            nodes.push(SimNode {
                engine,
                mobility,
                address,
                crashed: false,
            });
        }

        info!(
            "Initialized {} nodes (1 GCS, {} UAVs), range {:.0}m",
            nodes.len(),
            config.uav_count,
            config.radio_range
        );

        let mut sim = Self {
            config,
            core,
            nodes,
            index,
            medium: MediumCounters::default(),
        };

        for node in &mut sim.nodes {
            node.engine.start();
        }
        if sim.config.mobility && sim.config.uav_count > 0 {
            let at = sim.mobility_interval();
            sim.core.borrow_mut().push(at, EventKind::Move);
        }
        sim.flush_outbox();

        Ok(sim)
    }

    fn mobility_interval(&self) -> Duration {
        secs(self.config.mobility_interval)
    }

    fn link_latency(&self) -> Duration {
        secs(self.config.link_latency)
    }

    /// Run for the configured duration, then finalize every node
    pub fn run(&mut self) {
        let stop = AtomicBool::new(false);
        self.run_until(self.config.duration(), &stop);
        self.stop_all();
    }

    /// Process events up to `deadline`.
    ///
    /// Returns `false` if `stop` was raised; every node is then finalized.
    pub fn run_until(&mut self, deadline: Duration, stop: &AtomicBool) -> bool {
        loop {
            if stop.load(Ordering::Relaxed) {
                info!("Stop requested at {:.2}s", self.now().as_secs_f64());
                self.stop_all();
                return false;
            }

            let next = self.core.borrow_mut().pop_until(deadline);
            let Some(event) = next else {
                break;
            };

            match event.kind {
                EventKind::Timer { node, handle } => self.nodes[node].engine.on_timer(handle),
                EventKind::Deliver {
                    node,
                    payload,
                    sender,
                } => self.nodes[node].engine.on_message(&payload, sender),
                EventKind::Move => self.step_mobility(),
            }
            self.flush_outbox();
        }

        let mut core = self.core.borrow_mut();
        if core.now < deadline {
            core.now = deadline;
        }
        true
    }

    fn step_mobility(&mut self) {
        let dt = self.mobility_interval();
        {
            let mut core = self.core.borrow_mut();
            for (i, node) in self.nodes.iter_mut().enumerate() {
                if node.crashed {
                    continue;
                }
                node.mobility.advance(dt);
                core.positions[i] = node.mobility.position();
            }
        }
        let at = self.now().saturating_add(dt);
        self.core.borrow_mut().push(at, EventKind::Move);
    }

    fn flush_outbox(&mut self) {
        let outgoing = std::mem::take(&mut self.core.borrow_mut().outbox);
        for datagram in outgoing {
            self.transmit(datagram);
        }
    }

    /// Hand a datagram to the unit-disk medium
    fn transmit(&mut self, datagram: Outgoing) {
        let latency = self.link_latency();
        let range = self.config.radio_range;
        let mut core = self.core.borrow_mut();
        let at = core.now.saturating_add(latency);
        let origin = core.positions[datagram.from];
        let sender = self.nodes[datagram.from].address;
        let payload: Rc<[u8]> = datagram.payload.into();

        self.medium.sent += 1;

        match datagram.to {
            None => {
                for j in 0..self.nodes.len() {
                    if j != datagram.from && origin.distance_to(&core.positions[j]) <= range {
                        core.push(
                            at,
                            EventKind::Deliver {
                                node: j,
                                payload: payload.clone(),
                                sender,
                            },
                        );
                        self.medium.delivered += 1;
                    }
                }
            }
            Some(destination) => match self.index.get(&destination) {
                Some(&j)
                    if j != datagram.from
                        && origin.distance_to(&core.positions[j]) <= range =>
                {
                    core.push(
                        at,
                        EventKind::Deliver {
                            node: j,
                            payload,
                            sender,
                        },
                    );
                    self.medium.delivered += 1;
                }
                _ => {
                    debug!("Datagram {} -> {} lost", sender, destination);
                    self.medium.lost += 1;
                }
            },
        }
    }

    /// Finalize every node through its stop path
    pub fn stop_all(&mut self) {
        for node in &mut self.nodes {
            node.engine.stop();
        }
    }

    /// Crash one node: it finalizes and stops moving
    pub fn crash_node(&mut self, idx: usize) -> Result<()> {
        let node = self
            .nodes
            .get_mut(idx)
            .ok_or_else(|| FanetError::Simulation(format!("no node with index {}", idx)))?;
        node.crashed = true;
        node.engine.crash();
        info!("Node {} ({}) crashed", idx, node.address);
        Ok(())
    }

    /// Current simulated time
    pub fn now(&self) -> Duration {
        self.core.borrow().now
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// GCS plus UAVs
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn engine(&self, idx: usize) -> Option<&ProtocolEngine> {
        self.nodes.get(idx).map(|n| &n.engine)
    }

    pub fn node_position(&self, idx: usize) -> Option<Position> {
        self.core.borrow().positions.get(idx).copied()
    }

    pub fn node_address(&self, idx: usize) -> Option<NodeAddress> {
        self.nodes.get(idx).map(|n| n.address)
    }

    pub fn node_stats(&self, idx: usize) -> Option<NodeStats> {
        let node = self.nodes.get(idx)?;
        Some(NodeStats {
            index: idx,
            address: node.address,
            role: node.engine.role(),
            position: self.node_position(idx).unwrap_or_default(),
            crashed: node.crashed,
            engine: node.engine.stats(),
        })
    }

    pub fn stats(&self) -> SimStats {
        let per_node: Vec<NodeStats> = (0..self.nodes.len())
            .filter_map(|i| self.node_stats(i))
            .collect();

        let sensor_sent = per_node
            .iter()
            .filter(|n| n.role == Role::Uav)
            .map(|n| n.engine.data_packets_sent)
            .sum();
        let sensor_delivered = per_node
            .iter()
            .filter(|n| n.role == Role::Gcs)
            .map(|n| n.engine.data_packets_received)
            .sum();

        SimStats {
            elapsed: self.now(),
            datagrams_sent: self.medium.sent,
            datagrams_delivered: self.medium.delivered,
            datagrams_lost: self.medium.lost,
            sensor_sent,
            sensor_delivered,
            per_node,
        }
    }

    /// Adjacency from each node's neighbor table
    pub fn topology(&self) -> Vec<Vec<usize>> {
        self.nodes
            .iter()
            .map(|node| {
                node.engine
                    .neighbors()
                    .iter()
                    .filter_map(|n| self.index.get(&n.address).copied())
                    .collect()
            })
            .collect()
    }

    /// Whether every node is reachable from the GCS over neighbor links
    pub fn is_connected(&self) -> bool {
        if self.nodes.is_empty() {
            return true;
        }

        let adj = self.topology();
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![0usize];

        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;

            for &neighbor in &adj[node] {
                if !visited[neighbor] {
                    stack.push(neighbor);
                }
            }
        }

        visited.iter().all(|&v| v)
    }

    pub fn print_summary(&self) {
        let stats = self.stats();
        println!("\n=== FANET Simulation Summary ===");
        println!("Simulated time: {:.1}s", stats.elapsed.as_secs_f64());
        println!("Nodes: {} (1 GCS, {} UAVs)", self.nodes.len(), self.config.uav_count);
        println!();
        println!("Sensor data:");
        println!("  Sent by UAVs: {}", stats.sensor_sent);
        println!("  Received at GCS: {}", stats.sensor_delivered);
        println!("  Delivery ratio: {:.1}%", stats.delivery_ratio() * 100.0);
        println!();
        println!("Datagrams:");
        println!("  Transmitted: {}", stats.datagrams_sent);
        println!("  Received: {}", stats.datagrams_delivered);
        println!("  Lost (range): {}", stats.datagrams_lost);
        println!();
        println!("Per-node stats:");
        for n in &stats.per_node {
            println!(
                "  Node {:2} {:3} {}: TX={} RX={} data_tx={} data_rx={} relayed={} neighbors={} routes={}{}",
                n.index,
                n.role,
                n.address,
                n.engine.packets_sent,
                n.engine.packets_received,
                n.engine.data_packets_sent,
                n.engine.data_packets_received,
                n.engine.relays_forwarded,
                n.engine.neighbor_count,
                n.engine.route_count,
                if n.crashed { " (crashed)" } else { "" }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::engine::EngineState;

    fn close_pair() -> ScenarioConfig {
        ScenarioConfig::default()
            .with_gcs_position(Position::new(0.0, 0.0, 0.0))
            .with_uav_positions(vec![Position::new(300.0, 0.0, 100.0)])
            .with_mobility(false)
    }

    #[test]
    fn test_simulator_creation() {
        let sim = FanetSimulator::new(ScenarioConfig::default().with_uav_count(4)).unwrap();
        assert_eq!(sim.node_count(), 5);
        assert_eq!(sim.node_address(0), Some(GCS_ADDRESS));
        assert_eq!(sim.node_address(4), Some(NodeAddress::new(10, 0, 0, 5)));
        assert!(sim.engine(0).unwrap().is_gcs());
        assert!(!sim.engine(1).unwrap().is_gcs());
        assert_eq!(sim.engine(2).unwrap().known_gcs(), Some(GCS_ADDRESS));

        let bounds = Bounds::default();
        for i in 1..5 {
            assert!(bounds.contains(&sim.node_position(i).unwrap()));
        }
    }

    #[test]
    fn test_close_nodes_deliver_directly() {
        let mut sim = FanetSimulator::new(close_pair()).unwrap();
        let stop = AtomicBool::new(false);

        // While discovery is still running both sides see each other
        sim.run_until(Duration::from_secs(50), &stop);
        assert_eq!(sim.topology(), vec![vec![1], vec![0]]);
        assert!(sim.is_connected());

        sim.run();

        let stats = sim.stats();
        assert_eq!(stats.sensor_sent, 20);
        assert_eq!(stats.sensor_delivered, 20);
        assert!((stats.delivery_ratio() - 1.0).abs() < 1e-9);
        assert_eq!(stats.datagrams_lost, 0);
        assert_eq!(sim.engine(1).unwrap().state(), EngineState::Finalized);
    }

    #[test]
    fn test_isolated_uav_delivers_nothing() {
        let config = ScenarioConfig::default()
            .with_gcs_position(Position::new(0.0, 0.0, 0.0))
            .with_uav_positions(vec![Position::new(1900.0, 1900.0, 100.0)])
            .with_mobility(false);
        let mut sim = FanetSimulator::new(config).unwrap();
        sim.run();

        let stats = sim.stats();
        assert_eq!(stats.sensor_delivered, 0);
        assert!(!sim.is_connected());
        assert!(sim.engine(1).unwrap().neighbors().is_empty());
    }

    #[test]
    fn test_stop_flag_finalizes_early() {
        let mut sim = FanetSimulator::new(close_pair()).unwrap();
        let stop = AtomicBool::new(false);

        assert!(sim.run_until(Duration::from_secs(50), &stop));
        assert_eq!(sim.now(), Duration::from_secs(50));

        stop.store(true, Ordering::Relaxed);
        assert!(!sim.run_until(Duration::from_secs(400), &stop));
        for i in 0..sim.node_count() {
            assert_eq!(sim.engine(i).unwrap().state(), EngineState::Finalized);
        }
    }

    #[test]
    fn test_crash_node() {
        let mut sim = FanetSimulator::new(close_pair()).unwrap();
        assert!(matches!(sim.crash_node(9), Err(FanetError::Simulation(_))));

        sim.crash_node(1).unwrap();
        sim.run();

        assert_eq!(sim.stats().sensor_sent, 0);
        assert!(sim.node_stats(1).unwrap().crashed);
    }

    #[test]
    fn test_mobility_moves_uavs_only() {
        let config = ScenarioConfig::default().with_uav_count(2).with_duration(30.0);
        let mut sim = FanetSimulator::new(config).unwrap();
        let gcs = sim.node_position(0).unwrap();
        let uav = sim.node_position(1).unwrap();

        sim.run();

        assert_eq!(sim.node_position(0).unwrap(), gcs);
        assert_ne!(sim.node_position(1).unwrap(), uav);
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let config = ScenarioConfig::default().with_uav_count(6).with_seed(11);
        let mut a = FanetSimulator::new(config.clone()).unwrap();
        let mut b = FanetSimulator::new(config).unwrap();
        a.run();
        b.run();

        let (sa, sb) = (a.stats(), b.stats());
        assert_eq!(sa.datagrams_sent, sb.datagrams_sent);
        assert_eq!(sa.sensor_delivered, sb.sensor_delivered);
    }

    #[test]
    fn test_scenario_validation() {
        assert!(ScenarioConfig::default().validate().is_ok());

        let bad = ScenarioConfig {
            radio_range: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let mismatched = ScenarioConfig {
            uav_count: 3,
            uav_positions: vec![Position::default()],
            ..Default::default()
        };
        assert!(mismatched.validate().is_err());

        let speeds = ScenarioConfig {
            min_speed: 30.0,
            max_speed: 10.0,
            ..Default::default()
        };
        assert!(FanetSimulator::new(speeds).is_err());
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let long_run = ScenarioConfig::default().with_duration(1e20);
        assert!(matches!(long_run.validate(), Err(FanetError::Config(_))));
        assert!(FanetSimulator::new(long_run).is_err());

        let mut late_finalize = ScenarioConfig::default();
        late_finalize.node.intervals.finalize_after = 1e20;
        assert!(FanetSimulator::new(late_finalize).is_err());

        let slow_link = ScenarioConfig {
            link_latency: f64::INFINITY,
            ..Default::default()
        };
        assert!(slow_link.validate().is_err());

        // Largest values that still fit run without overflowing the clock
        let mut edge = close_pair().with_duration(60.0);
        edge.node.intervals.finalize_after = 1e18;
        let mut sim = FanetSimulator::new(edge).expect("durations fit");
        sim.run();
        assert!(sim.now() <= Duration::from_secs(60));
    }

    #[test]
    fn test_scenario_json_defaults() {
        let config: ScenarioConfig =
            serde_json::from_str(r#"{"uav_count": 3, "node": {"max_transmission_range": 500.0}}"#)
                .unwrap();
        assert_eq!(config.uav_count, 3);
        assert_eq!(config.radio_range, 1000.0);
        assert_eq!(config.node.max_transmission_range, 500.0);
        assert_eq!(config.node.limits.max_ttl, 8);
    }
}
