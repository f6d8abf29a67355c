//! FANET protocol engine
//!
//! One [`ProtocolEngine`] runs per node. It owns the node's neighbor table,
//! routing table and RREQ cache, and reacts to two kinds of input:
//!
//! - **Timers** fired by the [`Scheduler`]: discovery beacons, sensor data
//!   rounds (UAV only), connectivity checks and a one-shot forced
//!   finalization.
//! - **Datagrams** delivered by the driver through [`MessageHandler`].
//!
//! ## Data delivery
//!
//! ```text
//!   GCS neighbor in range? ──yes──► SENSOR_DATA (unicast, direct)
//!          │ no
//!          ▼
//!   route to known GCS?   ──yes──► MESH_DATA to next hop (ttl = max_ttl)
//!          │ no
//!          ▼
//!   GCS address known?    ──yes──► RREQ broadcast + SENSOR_DATA broadcast
//!          │ no
//!          ▼
//!   SENSOR_DATA broadcast (last resort)
//! ```
//!
//! In [`RoutingMode::SingleHopRelay`] the middle steps are replaced by a
//! DATA_RELAY through the best UAV neighbor.

use super::codec::MessageCodec;
use super::diagnostics::Signal;
use super::neighbor::NeighborTable;
use super::packet::{
    Beacon, DataRelay, MeshData, NodeAddress, Position, ProtocolMessage, Role, RouteReply,
    RouteRequest, SensorData, RELAY_DESTINATION_GCS,
};
use super::routing::{RouteRequestCache, RoutingTable};
use super::traits::{
    DiagnosticsSink, EngineStats, MessageHandler, PositionProvider, Scheduler, StatisticsSource,
    TimerHandle, TimerHandler, Transport,
};
use crate::config::{FanetConfig, RoutingMode};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Periodic and one-shot timers owned by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Discovery,
    DataTransmission,
    ConnectivityCheck,
    ForceFinalize,
}

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, timers not yet scheduled
    Idle,
    /// Timers scheduled
    Running,
    /// All timers cancelled; inputs are ignored
    Finalized,
}

/// Outcome of one data transmission round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStrategy {
    /// SENSOR_DATA unicast to a GCS neighbor
    Direct,
    /// MESH_DATA unicast to the next hop toward the GCS
    Mesh,
    /// RREQ for the GCS plus a broadcast of the payload
    RouteDiscovery,
    /// DATA_RELAY through the best UAV neighbor
    Relay,
    /// Payload broadcast with no GCS known
    Broadcast,
    /// Nothing could be sent
    Unreachable,
}

/// External collaborators injected into an engine
pub struct Collaborators {
    pub position: Box<dyn PositionProvider>,
    pub transport: Box<dyn Transport>,
    pub scheduler: Box<dyn Scheduler>,
    pub diagnostics: Box<dyn DiagnosticsSink>,
}

/// Per-node protocol state machine
pub struct ProtocolEngine {
    config: FanetConfig,
    neighbors: NeighborTable,
    routes: RoutingTable,
    rreq_cache: RouteRequestCache,
    position: Box<dyn PositionProvider>,
    transport: Box<dyn Transport>,
    scheduler: Box<dyn Scheduler>,
    diagnostics: Box<dyn DiagnosticsSink>,
    /// Outstanding timer per kind; firings of other handles are stale
    timers: HashMap<TimerKind, TimerHandle>,
    state: EngineState,
    discovery_rounds: u32,
    data_rounds: u32,
    connectivity_checks: u32,
    rreq_sequence: u32,
    /// Configured GCS, or the last one heard in discovery
    known_gcs: Option<NodeAddress>,
    last_strategy: Option<DeliveryStrategy>,
    rng: StdRng,
    stats: EngineStats,
}

impl fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("address", &self.config.address)
            .field("role", &self.role())
            .field("state", &self.state)
            .field("neighbors", &self.neighbors.len())
            .field("routes", &self.routes.len())
            .field("timers", &self.timers)
            .finish()
    }
}

impl ProtocolEngine {
    /// Create an engine. The configuration is validated first.
    pub fn new(config: FanetConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        info!(
            "FANET config: {} {} maxRange={}m port={}",
            role_of(&config),
            config.node_index,
            config.max_transmission_range,
            config.local_port
        );

        Ok(Self {
            neighbors: NeighborTable::new(),
            routes: RoutingTable::new(config.route_timeout()),
            rreq_cache: RouteRequestCache::new(),
            position: collaborators.position,
            transport: collaborators.transport,
            scheduler: collaborators.scheduler,
            diagnostics: collaborators.diagnostics,
            timers: HashMap::new(),
            state: EngineState::Idle,
            discovery_rounds: 0,
            data_rounds: 0,
            connectivity_checks: 0,
            rreq_sequence: 0,
            known_gcs: config.gcs_address,
            last_strategy: None,
            rng: StdRng::seed_from_u64(config.seed),
            stats: EngineStats::default(),
            config,
        })
    }

    pub fn address(&self) -> NodeAddress {
        self.config.address
    }

    pub fn role(&self) -> Role {
        role_of(&self.config)
    }

    pub fn is_gcs(&self) -> bool {
        self.config.is_gcs
    }

    pub fn config(&self) -> &FanetConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn rreq_cache(&self) -> &RouteRequestCache {
        &self.rreq_cache
    }

    /// GCS this node delivers to when it is not a direct neighbor
    pub fn known_gcs(&self) -> Option<NodeAddress> {
        self.known_gcs
    }

    /// Strategy picked by the most recent data round
    pub fn last_strategy(&self) -> Option<DeliveryStrategy> {
        self.last_strategy
    }

    /// (discovery, data, connectivity) rounds completed
    pub fn rounds(&self) -> (u32, u32, u32) {
        (self.discovery_rounds, self.data_rounds, self.connectivity_checks)
    }

    /// Whether a timer of this kind is outstanding
    pub fn has_timer(&self, kind: TimerKind) -> bool {
        self.timers.contains_key(&kind)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Schedule the first round of every timer plus forced finalization
    pub fn start(&mut self) {
        if self.state != EngineState::Idle {
            return;
        }
        self.state = EngineState::Running;

        let start = self.config.start_time();
        let discovery = start.saturating_add(self.jitter(1.0, 3.0));
        let connectivity = start.saturating_add(self.jitter(10.0, 15.0));
        self.schedule_at(TimerKind::Discovery, discovery);
        if !self.is_gcs() {
            let data = start.saturating_add(self.jitter(5.0, 8.0));
            self.schedule_at(TimerKind::DataTransmission, data);
        }
        self.schedule_at(TimerKind::ConnectivityCheck, connectivity);
        let finalize = start.saturating_add(self.config.finalize_after());
        self.schedule_at(TimerKind::ForceFinalize, finalize);

        info!(
            "FANET ready: {} {} at {}",
            self.role(),
            self.config.node_index,
            self.position.current_position()
        );
    }

    /// External stop signal
    pub fn stop(&mut self) {
        self.finalize("stop");
    }

    /// External crash signal
    pub fn crash(&mut self) {
        self.finalize("crash");
    }

    fn finalize(&mut self, reason: &str) {
        if self.state == EngineState::Finalized {
            return;
        }
        for (_, handle) in self.timers.drain() {
            self.scheduler.cancel(handle);
        }
        self.state = EngineState::Finalized;

        info!(
            "FANET stats - {} {} ({}): sent={} recv={} data_sent={} data_recv={} neighbors={}",
            self.role(),
            self.config.node_index,
            reason,
            self.stats.packets_sent,
            self.stats.packets_received,
            self.stats.data_packets_sent,
            self.stats.data_packets_received,
            self.neighbors.len()
        );
    }

    fn jitter(&mut self, low: f64, high: f64) -> Duration {
        Duration::from_secs_f64(self.rng.gen_range(low..high))
    }

    fn schedule_at(&mut self, kind: TimerKind, at: Duration) {
        let delay = at.saturating_sub(self.scheduler.now());
        self.schedule(kind, delay);
    }

    fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        let handle = self.scheduler.schedule_after(delay);
        if let Some(previous) = self.timers.insert(kind, handle) {
            self.scheduler.cancel(previous);
        }
    }

    fn fire(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Discovery => {
                self.send_neighbor_discovery();
                self.discovery_rounds += 1;
                if self.discovery_rounds < self.config.limits.max_discovery_rounds {
                    self.schedule(kind, self.config.discovery_interval());
                }
            }
            TimerKind::DataTransmission => {
                self.send_sensor_data();
                self.data_rounds += 1;
                if self.data_rounds < self.config.limits.max_data_transmissions {
                    self.schedule(kind, self.config.data_interval());
                }
            }
            TimerKind::ConnectivityCheck => {
                self.check_connectivity();
                self.connectivity_checks += 1;
                if self.connectivity_checks < self.config.limits.max_connectivity_checks {
                    self.schedule(kind, self.config.connectivity_interval());
                }
            }
            TimerKind::ForceFinalize => self.finalize("forced finalization"),
        }
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    fn beacon(&self) -> Beacon {
        Beacon {
            node_index: self.config.node_index,
            timestamp: self.scheduler.now().as_secs_f64(),
            position: self.position.current_position(),
            role: self.role(),
        }
    }

    fn unicast(&mut self, message: &ProtocolMessage, destination: NodeAddress) -> bool {
        let payload = match MessageCodec::encode(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode {}: {}", message.message_type(), e);
                return false;
            }
        };
        trace!("{} -> {}: {}", self.address(), destination, message.message_type());
        self.transport
            .send_unicast(payload, destination, self.config.dest_port);
        self.count_sent();
        true
    }

    fn broadcast(&mut self, message: &ProtocolMessage) -> bool {
        let payload = match MessageCodec::encode(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode {}: {}", message.message_type(), e);
                return false;
            }
        };
        trace!("{} -> broadcast: {}", self.address(), message.message_type());
        self.transport.send_broadcast(payload, self.config.dest_port);
        self.count_sent();
        true
    }

    fn count_sent(&mut self) {
        self.stats.packets_sent += 1;
        self.emit(Signal::PacketsSent(self.stats.packets_sent));
    }

    fn emit(&mut self, signal: Signal) {
        self.diagnostics.emit(self.config.address, signal);
    }

    /// Broadcast a discovery beacon with our position and role
    pub fn send_neighbor_discovery(&mut self) {
        let beacon = self.beacon();
        debug!(
            "Discovery: {} {} @ {}",
            beacon.role, beacon.node_index, beacon.position
        );
        self.broadcast(&ProtocolMessage::NeighborDiscovery(beacon));
    }

    fn sensor_reading(&mut self, position: Position) -> String {
        let temperature: f64 = self.rng.gen_range(20.0..35.0);
        let battery: f64 = self.rng.gen_range(60.0..100.0);
        format!(
            "UAV_{}_SENSOR: Pos({:.1},{:.1},{:.1}) Temp:{:.1} Bat:{:.0}% T:{:.2}",
            self.config.node_index,
            position.x,
            position.y,
            position.z,
            temperature,
            battery,
            self.scheduler.now().as_secs_f64()
        )
    }

    /// Generate one sensor reading and deliver it toward the GCS.
    ///
    /// Returns the strategy used, or `None` on a GCS (which never originates
    /// sensor data).
    pub fn send_sensor_data(&mut self) -> Option<DeliveryStrategy> {
        if self.is_gcs() {
            return None;
        }

        let now = self.scheduler.now();
        let position = self.position.current_position();
        let payload = self.sensor_reading(position);
        let source_node = self.config.node_index;
        let range = self.config.max_transmission_range;

        let direct_gcs = self.neighbors.find_gcs_in_range(range).map(|n| n.address);

        let strategy = if let Some(gcs) = direct_gcs {
            self.unicast(
                &ProtocolMessage::SensorData(SensorData {
                    source_node,
                    payload,
                }),
                gcs,
            );
            debug!("Sensor data: UAV{} -> GCS {} (direct)", source_node, gcs);
            DeliveryStrategy::Direct
        } else {
            match self.config.routing_mode {
                RoutingMode::Mesh => self.deliver_over_mesh(payload, now),
                RoutingMode::SingleHopRelay => self.deliver_via_relay(payload, now),
            }
        };

        if strategy != DeliveryStrategy::Unreachable {
            self.stats.data_packets_sent += 1;
            self.emit(Signal::DataPacketsSent(self.stats.data_packets_sent));
        }
        self.last_strategy = Some(strategy);
        Some(strategy)
    }

    fn deliver_over_mesh(&mut self, payload: String, now: Duration) -> DeliveryStrategy {
        let source_node = self.config.node_index;

        let Some(gcs) = self.known_gcs else {
            if self.neighbors.is_empty() {
                self.stats.undeliverable += 1;
                warn!("No path to GCS for sensor data (UAV{}): no neighbors", source_node);
            }
            self.broadcast(&ProtocolMessage::SensorData(SensorData {
                source_node,
                payload,
            }));
            debug!("Sensor data: UAV{} broadcast (no GCS known)", source_node);
            return DeliveryStrategy::Broadcast;
        };

        if let Some(next_hop) = self.routes.lookup(&gcs, now) {
            let message = ProtocolMessage::MeshData(MeshData {
                source_node,
                payload,
                destination: gcs,
                ttl: self.config.limits.max_ttl,
            });
            self.unicast(&message, next_hop);
            debug!("Sensor data: UAV{} -> {} -> GCS {} (mesh)", source_node, next_hop, gcs);
            return DeliveryStrategy::Mesh;
        }

        self.originate_route_request(gcs);
        self.broadcast(&ProtocolMessage::SensorData(SensorData {
            source_node,
            payload,
        }));
        debug!(
            "Sensor data: UAV{} broadcast while discovering route to {}",
            source_node, gcs
        );
        DeliveryStrategy::RouteDiscovery
    }

    fn deliver_via_relay(&mut self, payload: String, now: Duration) -> DeliveryStrategy {
        let source_node = self.config.node_index;
        let range = self.config.max_transmission_range;

        match self.neighbors.best_relay(range, now).map(|n| n.address) {
            Some(relay) => {
                let message = ProtocolMessage::DataRelay(DataRelay {
                    source_node,
                    payload,
                    final_destination: RELAY_DESTINATION_GCS.to_string(),
                    hop_count: 1,
                });
                self.unicast(&message, relay);
                debug!("Sensor data: UAV{} -> {} -> GCS (relay)", source_node, relay);
                DeliveryStrategy::Relay
            }
            None => {
                self.stats.undeliverable += 1;
                warn!("No path to GCS for sensor data (UAV{})", source_node);
                DeliveryStrategy::Unreachable
            }
        }
    }

    /// Flood a route request for `destination`
    pub fn originate_route_request(&mut self, destination: NodeAddress) {
        let now = self.scheduler.now();
        self.rreq_sequence += 1;
        let sequence_number = self.rreq_sequence;
        let originator = self.address();

        // Our own flood must not be processed when neighbors echo it back
        self.rreq_cache.seen(originator, sequence_number, now);

        let request = RouteRequest {
            destination,
            originator,
            sequence_number,
            hop_count: 0,
            ttl: self.config.limits.max_ttl,
        };
        if self.broadcast(&ProtocolMessage::RouteRequest(request)) {
            self.stats.route_requests_sent += 1;
        }
        debug!("RREQ {} for {} (seq {})", originator, destination, sequence_number);
    }

    /// Unicast a route reply one hop back toward its originator.
    ///
    /// Fails silently when no route to the originator is known.
    pub fn send_route_reply(&mut self, reply: RouteReply) -> bool {
        let now = self.scheduler.now();
        let Some(next_hop) = self.routes.lookup(&reply.originator, now) else {
            debug!("RREP for {} dropped: no route to originator {}", reply.destination, reply.originator);
            return false;
        };

        let sent = self.unicast(&ProtocolMessage::RouteReply(reply), next_hop);
        if sent {
            self.stats.route_replies_sent += 1;
        }
        sent
    }

    /// Evict stale state and report neighbor connectivity
    pub fn check_connectivity(&mut self) {
        let now = self.scheduler.now();
        let removed = self
            .neighbors
            .evict_expired(now, self.config.neighbor_timeout());
        if removed > 0 {
            debug!("Cleaned {} expired neighbors", removed);
        }
        self.rreq_cache
            .evict_older_than(now, self.config.rreq_cache_lifetime());

        let total = self.neighbors.len();
        let uavs = self.neighbors.uav_count();
        let gcs_connected = self.neighbors.gcs_count() > 0;

        info!(
            "Connectivity: {} {} has {} neighbors ({} UAVs, {})",
            self.role(),
            self.config.node_index,
            total,
            uavs,
            if gcs_connected { "GCS connected" } else { "no GCS" }
        );

        if !self.is_gcs() && !gcs_connected && uavs > 0 {
            let range = self.config.max_transmission_range;
            if let Some(relay) = self.neighbors.best_relay(range, now) {
                info!("  Relay available: {}", relay.address);
            }
        }

        self.stats.neighbor_count = total;
        self.emit(Signal::NeighborsFound {
            total,
            uavs,
            gcs_connected,
        });
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    fn dispatch(&mut self, message: ProtocolMessage, sender: NodeAddress) {
        match message {
            ProtocolMessage::NeighborDiscovery(beacon) => self.on_neighbor_discovery(beacon, sender),
            ProtocolMessage::NeighborResponse(beacon) => self.on_neighbor_response(beacon, sender),
            ProtocolMessage::SensorData(data) => self.on_sensor_data(data, sender),
            ProtocolMessage::DataRelay(relay) => self.on_data_relay(relay, sender),
            ProtocolMessage::RouteRequest(request) => self.on_route_request(request, sender),
            ProtocolMessage::RouteReply(reply) => self.on_route_reply(reply, sender),
            ProtocolMessage::MeshData(data) => self.on_mesh_data(data, sender),
        }
    }

    /// Range-check a beacon and record the sender. Returns `true` if admitted.
    fn learn_neighbor(&mut self, beacon: &Beacon, sender: NodeAddress) -> bool {
        let own = self.position.current_position();
        let distance = own.distance_to(&beacon.position);
        let range = self.config.max_transmission_range;

        trace!(
            "Distance check: {} {} @ {} <- {} @ {} = {:.0}m (max: {:.0}m)",
            self.role(),
            self.config.node_index,
            own,
            beacon.role,
            beacon.position,
            distance,
            range
        );

        if distance > range {
            debug!(
                "Beacon ignored: {} out of range ({:.0}m > {:.0}m)",
                sender, distance, range
            );
            return false;
        }

        let now = self.scheduler.now();
        let is_new = self
            .neighbors
            .upsert(sender, beacon.position, beacon.role, own, now);
        if beacon.role.is_gcs() {
            self.known_gcs = Some(sender);
        }
        if is_new {
            info!("New neighbor: {} {} @ {:.0}m", beacon.role, sender, distance);
        }
        true
    }

    fn on_neighbor_discovery(&mut self, beacon: Beacon, sender: NodeAddress) {
        if !self.learn_neighbor(&beacon, sender) {
            return;
        }
        let response = ProtocolMessage::NeighborResponse(self.beacon());
        self.unicast(&response, sender);
        debug!("Discovery response: {} -> {} {}", self.address(), beacon.role, sender);
    }

    fn on_neighbor_response(&mut self, beacon: Beacon, sender: NodeAddress) {
        if self.learn_neighbor(&beacon, sender) {
            debug!("Response processed: {} {} added as neighbor", beacon.role, sender);
        }
    }

    fn deliver_locally(&mut self, source_node: u32, hops: Option<u8>) {
        self.stats.data_packets_received += 1;
        self.emit(Signal::DataPacketsReceived(self.stats.data_packets_received));
        match hops {
            Some(hops) => info!("Sensor data received: UAV{} -> GCS ({} hops)", source_node, hops),
            None => info!("Sensor data received: UAV{} -> GCS", source_node),
        }
    }

    fn count_failure(&mut self) {
        self.stats.relay_failures += 1;
        self.emit(Signal::DeliveryFailed(self.stats.relay_failures));
    }

    fn count_relay(&mut self) {
        self.stats.relays_forwarded += 1;
        self.emit(Signal::RelayForwarded(self.stats.relays_forwarded));
    }

    fn on_sensor_data(&mut self, data: SensorData, sender: NodeAddress) {
        if !self.is_gcs() {
            trace!("SENSOR_DATA from {} ignored by UAV", sender);
            return;
        }
        self.deliver_locally(data.source_node, None);
    }

    fn on_data_relay(&mut self, relay: DataRelay, sender: NodeAddress) {
        if relay.final_destination != RELAY_DESTINATION_GCS {
            debug!("DATA_RELAY from {} for unknown destination {:?}", sender, relay.final_destination);
            return;
        }
        if self.is_gcs() {
            self.deliver_locally(relay.source_node, Some(relay.hop_count));
            return;
        }
        if relay.hop_count > self.config.limits.max_hop_count {
            warn!("Max hop count exceeded ({}), dropping relay from {}", relay.hop_count, sender);
            self.count_failure();
            return;
        }

        let range = self.config.max_transmission_range;
        match self.neighbors.find_gcs_in_range(range).map(|n| n.address) {
            Some(gcs) => {
                let hop_count = relay.hop_count.saturating_add(1);
                let forwarded = ProtocolMessage::DataRelay(DataRelay { hop_count, ..relay });
                if self.unicast(&forwarded, gcs) {
                    self.count_relay();
                    debug!("Data relayed to {} (hop {})", gcs, hop_count);
                }
            }
            None => {
                warn!("Relay failed - no path to GCS (from {})", sender);
                self.count_failure();
            }
        }
    }

    fn on_route_request(&mut self, request: RouteRequest, sender: NodeAddress) {
        let now = self.scheduler.now();

        if request.ttl == 0 {
            debug!("RREQ from {} dropped: ttl exhausted", request.originator);
            return;
        }
        if self
            .rreq_cache
            .seen(request.originator, request.sequence_number, now)
        {
            self.stats.duplicate_route_requests += 1;
            trace!(
                "RREQ {}#{} via {} is a duplicate",
                request.originator,
                request.sequence_number,
                sender
            );
            return;
        }

        // Reverse path toward the originator
        let hops_to_originator = request.hop_count.saturating_add(1);
        self.routes
            .update(request.originator, sender, hops_to_originator, now);

        if request.destination == self.address() {
            debug!("RREQ {}#{} reached destination", request.originator, request.sequence_number);
            self.send_route_reply(RouteReply {
                destination: self.address(),
                originator: request.originator,
                hop_count: 0,
            });
            return;
        }

        // The requester is our next hop, so it has lost the route we rely on
        if self.routes.lookup(&request.destination, now) == Some(sender) {
            debug!(
                "Route to {} via {} is broken; flooding RREQ {}#{} instead",
                request.destination, sender, request.originator, request.sequence_number
            );
            self.routes.invalidate(&request.destination);
        }

        if let Some(hop_count) = self
            .routes
            .route(&request.destination, now)
            .map(|r| r.hop_count)
        {
            debug!(
                "RREQ {}#{} answered from route cache ({} hops to {})",
                request.originator, request.sequence_number, hop_count, request.destination
            );
            self.send_route_reply(RouteReply {
                destination: request.destination,
                originator: request.originator,
                hop_count,
            });
            return;
        }

        if request.ttl > 1 {
            let forwarded = RouteRequest {
                hop_count: hops_to_originator,
                ttl: request.ttl - 1,
                ..request
            };
            self.broadcast(&ProtocolMessage::RouteRequest(forwarded));
        } else {
            debug!("RREQ {}#{} dies here (ttl 1)", request.originator, request.sequence_number);
        }
    }

    fn on_route_reply(&mut self, reply: RouteReply, sender: NodeAddress) {
        let now = self.scheduler.now();
        let hop_count = reply.hop_count.saturating_add(1);
        self.routes.update(reply.destination, sender, hop_count, now);

        if reply.originator == self.address() {
            info!(
                "Route to {} established via {} ({} hops)",
                reply.destination, sender, hop_count
            );
            return;
        }

        self.send_route_reply(RouteReply { hop_count, ..reply });
    }

    fn on_mesh_data(&mut self, data: MeshData, sender: NodeAddress) {
        if data.destination == self.address() {
            if self.is_gcs() {
                self.deliver_locally(data.source_node, None);
            } else {
                debug!("MESH_DATA from UAV{} addressed to a UAV; not consumed", data.source_node);
            }
            return;
        }

        let now = self.scheduler.now();
        match self.routes.lookup(&data.destination, now) {
            Some(next_hop) if data.ttl > 1 => {
                let forwarded = ProtocolMessage::MeshData(MeshData {
                    ttl: data.ttl - 1,
                    ..data
                });
                if self.unicast(&forwarded, next_hop) {
                    self.count_relay();
                }
            }
            Some(_) => {
                debug!("MESH_DATA from {} dropped: ttl exhausted", sender);
                self.count_failure();
            }
            None => {
                debug!("MESH_DATA from {} dropped: no route to {}", sender, data.destination);
                self.count_failure();
            }
        }
    }
}

impl TimerHandler for ProtocolEngine {
    fn on_timer(&mut self, handle: TimerHandle) {
        if self.state != EngineState::Running {
            return;
        }
        let kind = self
            .timers
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(k, _)| *k);
        let Some(kind) = kind else {
            trace!("Ignoring stale {:?}", handle);
            return;
        };
        self.timers.remove(&kind);
        self.fire(kind);
    }
}

impl MessageHandler for ProtocolEngine {
    fn on_message(&mut self, payload: &[u8], sender: NodeAddress) {
        if self.state == EngineState::Finalized {
            return;
        }

        self.stats.packets_received += 1;
        self.emit(Signal::PacketsReceived(self.stats.packets_received));

        if sender.is_loopback() || sender == self.address() {
            debug!("DROPPED: ignoring own/loopback message from {}", sender);
            self.stats.dropped_self += 1;
            return;
        }

        let message = match MessageCodec::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                debug!("Invalid packet format from {}: {}", sender, e);
                self.stats.dropped_malformed += 1;
                return;
            }
        };

        if let Some(sender_position) = message.position() {
            let distance = self
                .position
                .current_position()
                .distance_to(&sender_position);
            if distance > self.config.max_transmission_range {
                debug!(
                    "DROPPED: message from {} out of range ({:.0}m > {:.0}m)",
                    sender, distance, self.config.max_transmission_range
                );
                self.stats.dropped_out_of_range += 1;
                return;
            }
        }

        trace!("Message received: {} from {}", message.message_type(), sender);
        self.dispatch(message, sender);
    }
}

impl StatisticsSource for ProtocolEngine {
    fn stats(&self) -> EngineStats {
        EngineStats {
            neighbor_count: self.neighbors.len(),
            route_count: self.routes.valid_count(),
            ..self.stats.clone()
        }
    }
}

fn role_of(config: &FanetConfig) -> Role {
    if config.is_gcs {
        Role::Gcs
    } else {
        Role::Uav
    }
}
