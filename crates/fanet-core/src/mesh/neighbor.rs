//! Neighbor discovery and management
//!
//! This module tracks peers heard directly through discovery beacons. Every
//! entry records where the peer was, what it is (UAV or GCS), when it was last
//! heard and how far away it was at that moment. Callers are responsible for
//! range admission; the table stores whatever it is given.

use super::packet::{NodeAddress, Position, Role};
use std::collections::BTreeMap;
use std::time::Duration;

/// A directly heard peer
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborEntry {
    /// Peer address
    pub address: NodeAddress,
    /// Peer position from its last beacon
    pub position: Position,
    /// Peer role
    pub role: Role,
    /// Simulated time the peer was last heard
    pub last_seen: Duration,
    /// Distance from us when the peer was last heard (meters)
    pub distance: f64,
}

impl NeighborEntry {
    /// Time since this neighbor was last heard
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_seen)
    }

    /// Check if the entry is older than the freshness window
    pub fn is_expired(&self, now: Duration, timeout: Duration) -> bool {
        self.age(now) > timeout
    }

    /// Relay preference: close and recently heard neighbors score higher
    pub fn relay_score(&self, now: Duration) -> f64 {
        let proximity = 1.0 / (1.0 + self.distance / 100.0);
        let recency = 1.0 / (1.0 + self.age(now).as_secs_f64());
        proximity * recency
    }
}

/// Neighbor table keyed by address
///
/// Iteration follows address order, which makes "first GCS" and relay
/// tie-breaking deterministic.
#[derive(Debug, Default)]
pub struct NeighborTable {
    neighbors: BTreeMap<NodeAddress, NeighborEntry>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a neighbor.
    ///
    /// The distance is computed from `own_position`. Returns `true` when the
    /// address was not in the table before.
    pub fn upsert(
        &mut self,
        address: NodeAddress,
        position: Position,
        role: Role,
        own_position: Position,
        now: Duration,
    ) -> bool {
        let entry = NeighborEntry {
            address,
            position,
            role,
            last_seen: now,
            distance: own_position.distance_to(&position),
        };
        self.neighbors.insert(address, entry).is_none()
    }

    /// Remove every neighbor not heard within `timeout`
    pub fn evict_expired(&mut self, now: Duration, timeout: Duration) -> usize {
        let before = self.neighbors.len();
        self.neighbors.retain(|_, n| !n.is_expired(now, timeout));
        before - self.neighbors.len()
    }

    /// First GCS in the table, regardless of distance
    pub fn find_gcs(&self) -> Option<&NeighborEntry> {
        self.neighbors.values().find(|n| n.role.is_gcs())
    }

    /// First GCS within `max_range`
    pub fn find_gcs_in_range(&self, max_range: f64) -> Option<&NeighborEntry> {
        self.neighbors
            .values()
            .find(|n| n.role.is_gcs() && n.distance <= max_range)
    }

    /// Best UAV to relay through, by [`NeighborEntry::relay_score`].
    ///
    /// Ties keep the first neighbor encountered.
    pub fn best_relay(&self, max_range: f64, now: Duration) -> Option<&NeighborEntry> {
        let mut best: Option<(&NeighborEntry, f64)> = None;
        for neighbor in self
            .neighbors
            .values()
            .filter(|n| !n.role.is_gcs() && n.distance <= max_range)
        {
            let score = neighbor.relay_score(now);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((neighbor, score)),
            }
        }
        best.map(|(n, _)| n)
    }

    /// Get a neighbor by address
    pub fn get(&self, address: &NodeAddress) -> Option<&NeighborEntry> {
        self.neighbors.get(address)
    }

    /// All neighbors in address order
    pub fn iter(&self) -> impl Iterator<Item = &NeighborEntry> {
        self.neighbors.values()
    }

    /// Number of GCS neighbors
    pub fn gcs_count(&self) -> usize {
        self.neighbors.values().filter(|n| n.role.is_gcs()).count()
    }

    /// Number of UAV neighbors
    pub fn uav_count(&self) -> usize {
        self.neighbors.len() - self.gcs_count()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> NodeAddress {
        NodeAddress::new(10, 0, 0, last)
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_upsert_computes_distance() {
        let mut table = NeighborTable::new();
        let origin = Position::new(0.0, 0.0, 0.0);

        assert!(table.upsert(addr(2), Position::new(400.0, 0.0, 0.0), Role::Gcs, origin, secs(1)));
        let entry = table.get(&addr(2)).unwrap();
        assert!((entry.distance - 400.0).abs() < 1e-9);
        assert_eq!(entry.role, Role::Gcs);

        // Refresh overwrites and is not "new"
        assert!(!table.upsert(addr(2), Position::new(300.0, 0.0, 0.0), Role::Gcs, origin, secs(5)));
        let entry = table.get(&addr(2)).unwrap();
        assert!((entry.distance - 300.0).abs() < 1e-9);
        assert_eq!(entry.last_seen, secs(5));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_evict_expired_freshness() {
        let mut table = NeighborTable::new();
        let origin = Position::default();
        table.upsert(addr(2), Position::new(10.0, 0.0, 0.0), Role::Uav, origin, secs(0));
        table.upsert(addr(3), Position::new(20.0, 0.0, 0.0), Role::Uav, origin, secs(20));

        // Exactly at the timeout is still fresh
        assert_eq!(table.evict_expired(secs(30), secs(30)), 0);

        assert_eq!(table.evict_expired(secs(31), secs(30)), 1);
        assert!(table.get(&addr(2)).is_none());
        assert!(table.get(&addr(3)).is_some());
        assert!(table.iter().all(|n| !n.is_expired(secs(31), secs(30))));
    }

    #[test]
    fn test_find_gcs_ignores_range() {
        let mut table = NeighborTable::new();
        let origin = Position::default();
        table.upsert(addr(4), Position::new(100.0, 0.0, 0.0), Role::Uav, origin, secs(0));
        assert!(table.find_gcs().is_none());

        table.upsert(addr(1), Position::new(5000.0, 0.0, 0.0), Role::Gcs, origin, secs(0));
        assert_eq!(table.find_gcs().unwrap().address, addr(1));
        assert!(table.find_gcs_in_range(1000.0).is_none());
        assert!(table.find_gcs_in_range(6000.0).is_some());
    }

    #[test]
    fn test_best_relay_prefers_close_and_recent() {
        let mut table = NeighborTable::new();
        let origin = Position::default();
        table.upsert(addr(2), Position::new(500.0, 0.0, 0.0), Role::Uav, origin, secs(10));
        table.upsert(addr(3), Position::new(100.0, 0.0, 0.0), Role::Uav, origin, secs(10));
        table.upsert(addr(1), Position::new(10.0, 0.0, 0.0), Role::Gcs, origin, secs(10));

        // GCS is never a relay; the closer UAV wins
        assert_eq!(table.best_relay(1000.0, secs(10)).unwrap().address, addr(3));

        // A stale close neighbor loses to a fresh farther one
        table.upsert(addr(3), Position::new(100.0, 0.0, 0.0), Role::Uav, origin, secs(0));
        assert_eq!(table.best_relay(1000.0, secs(10)).unwrap().address, addr(2));

        // Range bound excludes everything
        assert!(table.best_relay(50.0, secs(10)).is_none());
    }

    #[test]
    fn test_best_relay_tie_keeps_first() {
        let mut table = NeighborTable::new();
        let origin = Position::default();
        table.upsert(addr(7), Position::new(0.0, 200.0, 0.0), Role::Uav, origin, secs(3));
        table.upsert(addr(5), Position::new(200.0, 0.0, 0.0), Role::Uav, origin, secs(3));

        assert_eq!(table.best_relay(1000.0, secs(3)).unwrap().address, addr(5));
    }

    #[test]
    fn test_role_counts() {
        let mut table = NeighborTable::new();
        let origin = Position::default();
        table.upsert(addr(1), Position::default(), Role::Gcs, origin, secs(0));
        table.upsert(addr(2), Position::default(), Role::Uav, origin, secs(0));
        table.upsert(addr(3), Position::default(), Role::Uav, origin, secs(0));

        assert_eq!(table.gcs_count(), 1);
        assert_eq!(table.uav_count(), 2);
        assert!(!table.is_empty());
    }
}
