//! Node configuration
//!
//! All durations are stored as seconds (`f64`) so configs stay readable as
//! JSON; accessor methods hand out `Duration`s to the engine.

use crate::error::{FanetError, Result};
use crate::mesh::packet::NodeAddress;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a UAV delivers sensor data when the GCS is not a direct neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Reactive RREQ/RREP mesh routing with broadcast fallback
    #[default]
    Mesh,
    /// Single relay through the best UAV neighbor
    SingleHopRelay,
}

/// Protocol bound constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolLimits {
    /// Discovery beacons sent before the discovery timer stops
    pub max_discovery_rounds: u32,
    /// Sensor rounds a UAV runs
    pub max_data_transmissions: u32,
    /// Connectivity checks before the check timer stops
    pub max_connectivity_checks: u32,
    /// DATA_RELAY packets with a larger hop count are dropped
    pub max_hop_count: u8,
    /// Initial TTL for RREQ and MESH_DATA
    pub max_ttl: u8,
    /// Routes older than this are invalid (seconds)
    pub route_timeout: f64,
    /// RREQ dedup records older than this are evicted (seconds)
    pub rreq_cache_lifetime: f64,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            max_discovery_rounds: 10,
            max_data_transmissions: 20,
            max_connectivity_checks: 10,
            max_hop_count: 5,
            max_ttl: 8,
            route_timeout: 60.0,
            rreq_cache_lifetime: 120.0,
        }
    }
}

/// Periodic timer intervals (seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerIntervals {
    pub discovery: f64,
    pub data: f64,
    pub connectivity: f64,
    /// Offset after start at which the node is force-finalized
    pub finalize_after: f64,
}

impl Default for TimerIntervals {
    fn default() -> Self {
        Self {
            discovery: 10.0,
            data: 15.0,
            connectivity: 30.0,
            finalize_after: 400.0,
        }
    }
}

/// Per-node FANET configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanetConfig {
    /// Node index (shows up in beacons and sensor payloads)
    pub node_index: u32,
    /// This node's address
    pub address: NodeAddress,
    /// Whether this node is a ground control station
    pub is_gcs: bool,
    /// Local UDP port
    pub local_port: u16,
    /// Destination UDP port
    pub dest_port: u16,
    /// Application start time (seconds)
    pub start_time: f64,
    /// Neighbors not heard for this long are evicted (seconds)
    pub neighbor_timeout: f64,
    /// Maximum transmission range (meters)
    pub max_transmission_range: f64,
    /// Well-known GCS address, if any
    pub gcs_address: Option<NodeAddress>,
    /// Data delivery mode
    pub routing_mode: RoutingMode,
    /// Seed for timer jitter and sensor readings
    pub seed: u64,
    pub limits: ProtocolLimits,
    pub intervals: TimerIntervals,
}

impl Default for FanetConfig {
    fn default() -> Self {
        Self {
            node_index: 0,
            address: NodeAddress::UNSPECIFIED,
            is_gcs: false,
            local_port: 5000,
            dest_port: 5000,
            start_time: 0.0,
            neighbor_timeout: 30.0,
            max_transmission_range: 1000.0,
            gcs_address: None,
            routing_mode: RoutingMode::Mesh,
            seed: 42,
            limits: ProtocolLimits::default(),
            intervals: TimerIntervals::default(),
        }
    }
}

impl FanetConfig {
    /// Configuration for a UAV
    pub fn uav(node_index: u32, address: NodeAddress) -> Self {
        Self {
            node_index,
            address,
            seed: 42u64.wrapping_add(node_index as u64),
            ..Default::default()
        }
    }

    /// Configuration for a ground control station
    pub fn gcs(node_index: u32, address: NodeAddress) -> Self {
        Self {
            is_gcs: true,
            ..Self::uav(node_index, address)
        }
    }

    pub fn with_range(mut self, meters: f64) -> Self {
        self.max_transmission_range = meters;
        self
    }

    pub fn with_gcs_address(mut self, address: NodeAddress) -> Self {
        self.gcs_address = Some(address);
        self
    }

    pub fn with_routing_mode(mut self, mode: RoutingMode) -> Self {
        self.routing_mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_start_time(mut self, secs: f64) -> Self {
        self.start_time = secs;
        self
    }

    pub fn with_neighbor_timeout(mut self, secs: f64) -> Self {
        self.neighbor_timeout = secs;
        self
    }

    pub fn with_limits(mut self, limits: ProtocolLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_intervals(mut self, intervals: TimerIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn start_time(&self) -> Duration {
        secs(self.start_time)
    }

    pub fn neighbor_timeout(&self) -> Duration {
        secs(self.neighbor_timeout)
    }

    pub fn route_timeout(&self) -> Duration {
        secs(self.limits.route_timeout)
    }

    pub fn rreq_cache_lifetime(&self) -> Duration {
        secs(self.limits.rreq_cache_lifetime)
    }

    pub fn discovery_interval(&self) -> Duration {
        secs(self.intervals.discovery)
    }

    pub fn data_interval(&self) -> Duration {
        secs(self.intervals.data)
    }

    pub fn connectivity_interval(&self) -> Duration {
        secs(self.intervals.connectivity)
    }

    pub fn finalize_after(&self) -> Duration {
        secs(self.intervals.finalize_after)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("neighbor_timeout", self.neighbor_timeout),
            ("limits.route_timeout", self.limits.route_timeout),
            ("limits.rreq_cache_lifetime", self.limits.rreq_cache_lifetime),
            ("intervals.discovery", self.intervals.discovery),
            ("intervals.data", self.intervals.data),
            ("intervals.connectivity", self.intervals.connectivity),
            ("intervals.finalize_after", self.intervals.finalize_after),
        ];
        for (name, value) in durations {
            if value <= 0.0 {
                return Err(FanetError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
            check_seconds(name, value)?;
        }
        if !self.max_transmission_range.is_finite() || self.max_transmission_range <= 0.0 {
            return Err(FanetError::Config(format!(
                "max_transmission_range must be positive, got {}",
                self.max_transmission_range
            )));
        }
        if self.start_time < 0.0 {
            return Err(FanetError::Config(format!(
                "start_time must be non-negative, got {}",
                self.start_time
            )));
        }
        check_seconds("start_time", self.start_time)?;
        if self.limits.max_ttl == 0 {
            return Err(FanetError::Config("limits.max_ttl must be at least 1".into()));
        }
        if self.address.is_broadcast() || self.address.is_loopback() {
            return Err(FanetError::Config(format!(
                "{} cannot be used as a node address",
                self.address
            )));
        }
        Ok(())
    }
}

pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

/// Reject values that do not fit a `Duration` (NaN, infinite, or too large)
pub(crate) fn check_seconds(name: &str, value: f64) -> Result<()> {
    Duration::try_from_secs_f64(value)
        .map(|_| ())
        .map_err(|e| FanetError::Config(format!("{} = {} is not a usable duration: {}", name, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FanetConfig::default();
        assert_eq!(config.limits.max_hop_count, 5);
        assert_eq!(config.discovery_interval(), Duration::from_secs(10));
        assert_eq!(config.data_interval(), Duration::from_secs(15));
        assert_eq!(config.connectivity_interval(), Duration::from_secs(30));
        assert_eq!(config.routing_mode, RoutingMode::Mesh);
    }

    #[test]
    fn test_builders() {
        let gcs = NodeAddress::new(10, 0, 0, 1);
        let config = FanetConfig::uav(3, NodeAddress::new(10, 0, 0, 4))
            .with_range(750.0)
            .with_gcs_address(gcs)
            .with_routing_mode(RoutingMode::SingleHopRelay);

        assert!(!config.is_gcs);
        assert_eq!(config.node_index, 3);
        assert_eq!(config.max_transmission_range, 750.0);
        assert_eq!(config.gcs_address, Some(gcs));
        assert!(FanetConfig::gcs(0, gcs).is_gcs);
    }

    #[test]
    fn test_validate() {
        let good = FanetConfig::uav(1, NodeAddress::new(10, 0, 0, 2));
        assert!(good.validate().is_ok());

        let bad_range = good.clone().with_range(0.0);
        assert!(matches!(bad_range.validate(), Err(FanetError::Config(_))));

        let mut bad_ttl = good.clone();
        bad_ttl.limits.max_ttl = 0;
        assert!(bad_ttl.validate().is_err());

        let loopback = FanetConfig::uav(1, NodeAddress::LOOPBACK);
        assert!(loopback.validate().is_err());

        let mut huge_finalize = good.clone();
        huge_finalize.intervals.finalize_after = 1e20;
        assert!(matches!(huge_finalize.validate(), Err(FanetError::Config(_))));

        let mut nan_timeout = good.clone();
        nan_timeout.neighbor_timeout = f64::NAN;
        assert!(nan_timeout.validate().is_err());

        let mut huge_start = good;
        huge_start.start_time = f64::INFINITY;
        assert!(huge_start.validate().is_err());
    }

    #[test]
    fn test_json_partial_config() {
        let json = r#"{"is_gcs": true, "limits": {"max_ttl": 4}, "routing_mode": "single_hop_relay"}"#;
        let config: FanetConfig = serde_json::from_str(json).unwrap();
        assert!(config.is_gcs);
        assert_eq!(config.limits.max_ttl, 4);
        assert_eq!(config.limits.max_hop_count, 5);
        assert_eq!(config.routing_mode, RoutingMode::SingleHopRelay);
        assert_eq!(config.local_port, 5000);
    }
}
