//! Reactive mesh routing state
//!
//! - **RoutingTable**: best known next hop per destination, learned from
//!   RREQ reverse paths and RREP forward paths. Entries expire lazily.
//! - **RouteRequestCache**: (originator, sequence number) ledger that makes
//!   every node process a given RREQ exactly once.

use super::packet::NodeAddress;
use std::collections::HashMap;
use std::time::Duration;

/// A route to a destination node
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    /// Destination node
    pub destination: NodeAddress,
    /// Neighbor to hand packets to
    pub next_hop: NodeAddress,
    /// Hops from us to the destination
    pub hop_count: u8,
    /// Simulated time the route was learned
    pub timestamp: Duration,
    /// Cleared once the route ages out
    pub valid: bool,
}

impl RouteEntry {
    /// Check if the route is older than `timeout`
    pub fn is_expired(&self, now: Duration, timeout: Duration) -> bool {
        now.saturating_sub(self.timestamp) > timeout
    }
}

/// Routing table for mesh forwarding
///
/// Expired routes are invalidated in place on access and kept in storage.
#[derive(Debug)]
pub struct RoutingTable {
    routes: HashMap<NodeAddress, RouteEntry>,
    timeout: Duration,
}

impl RoutingTable {
    /// Create a routing table whose routes live for `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            routes: HashMap::new(),
            timeout,
        }
    }

    /// Add or improve a route.
    ///
    /// The route is stored when there is no entry, the entry is invalid, or
    /// `hop_count` is strictly better. Returns `true` if the table changed.
    pub fn update(
        &mut self,
        destination: NodeAddress,
        next_hop: NodeAddress,
        hop_count: u8,
        now: Duration,
    ) -> bool {
        self.expire(&destination, now);

        if let Some(existing) = self.routes.get(&destination) {
            if existing.valid && hop_count >= existing.hop_count {
                return false;
            }
        }

        self.routes.insert(
            destination,
            RouteEntry {
                destination,
                next_hop,
                hop_count,
                timestamp: now,
                valid: true,
            },
        );
        true
    }

    /// Next hop toward `destination`, if a valid route exists
    pub fn lookup(&mut self, destination: &NodeAddress, now: Duration) -> Option<NodeAddress> {
        self.route(destination, now).map(|r| r.next_hop)
    }

    /// Full route toward `destination`, if valid
    pub fn route(&mut self, destination: &NodeAddress, now: Duration) -> Option<&RouteEntry> {
        self.expire(destination, now);
        self.routes.get(destination).filter(|r| r.valid)
    }

    /// Mark a route invalid without removing it
    pub fn invalidate(&mut self, destination: &NodeAddress) {
        if let Some(route) = self.routes.get_mut(destination) {
            route.valid = false;
        }
    }

    /// Stored entry regardless of validity
    pub fn entry(&self, destination: &NodeAddress) -> Option<&RouteEntry> {
        self.routes.get(destination)
    }

    /// All stored entries, valid or not
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.values()
    }

    /// Number of entries flagged valid (without running expiry)
    pub fn valid_count(&self) -> usize {
        self.routes.values().filter(|r| r.valid).count()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn expire(&mut self, destination: &NodeAddress, now: Duration) {
        let timeout = self.timeout;
        if let Some(route) = self.routes.get_mut(destination) {
            if route.valid && route.is_expired(now, timeout) {
                route.valid = false;
            }
        }
    }
}

/// RREQ duplicate suppression ledger
#[derive(Debug, Default)]
pub struct RouteRequestCache {
    /// (originator, sequence number) -> first sighting
    seen: HashMap<(NodeAddress, u32), Duration>,
}

impl RouteRequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this RREQ was already recorded. Otherwise records it
    /// and returns `false`.
    pub fn seen(&mut self, originator: NodeAddress, sequence_number: u32, now: Duration) -> bool {
        let key = (originator, sequence_number);
        if self.seen.contains_key(&key) {
            return true;
        }
        self.seen.insert(key, now);
        false
    }

    /// Drop records first seen more than `lifetime` ago
    pub fn evict_older_than(&mut self, now: Duration, lifetime: Duration) -> usize {
        let before = self.seen.len();
        self.seen
            .retain(|_, first_seen| now.saturating_sub(*first_seen) <= lifetime);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
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
    fn test_update_if_better() {
        let mut table = RoutingTable::new(secs(60));
        let gcs = addr(1);

        assert!(table.update(gcs, addr(6), 3, secs(0)));

        // Worse path is ignored
        assert!(!table.update(gcs, addr(7), 5, secs(1)));
        assert_eq!(table.lookup(&gcs, secs(1)), Some(addr(6)));

        // Equal hop count is not an improvement either
        assert!(!table.update(gcs, addr(7), 3, secs(1)));
        assert_eq!(table.entry(&gcs).unwrap().next_hop, addr(6));

        // Shorter path replaces
        assert!(table.update(gcs, addr(8), 1, secs(2)));
        let route = table.route(&gcs, secs(2)).unwrap();
        assert_eq!(route.next_hop, addr(8));
        assert_eq!(route.hop_count, 1);
    }

    #[test]
    fn test_lazy_expiry_keeps_entry() {
        let mut table = RoutingTable::new(secs(60));
        let dest = addr(9);
        table.update(dest, addr(2), 2, secs(0));

        assert!(table.lookup(&dest, secs(60)).is_some());
        assert!(table.lookup(&dest, secs(61)).is_none());

        // Invalidated, not deleted
        assert_eq!(table.len(), 1);
        assert!(!table.entry(&dest).unwrap().valid);
        assert_eq!(table.valid_count(), 0);
    }

    #[test]
    fn test_invalid_entry_accepts_worse_route() {
        let mut table = RoutingTable::new(secs(60));
        let dest = addr(9);
        table.update(dest, addr(2), 1, secs(0));
        table.invalidate(&dest);

        assert!(table.update(dest, addr(3), 6, secs(5)));
        assert_eq!(table.lookup(&dest, secs(5)), Some(addr(3)));

        // An aged-out route is also replaceable without an explicit lookup
        assert!(table.update(dest, addr(4), 9, secs(100)));
        assert_eq!(table.lookup(&dest, secs(100)), Some(addr(4)));
    }

    #[test]
    fn test_rreq_dedup() {
        let mut cache = RouteRequestCache::new();
        let origin = addr(5);

        assert!(!cache.seen(origin, 7, secs(0)));
        assert!(cache.seen(origin, 7, secs(1)));
        assert!(cache.seen(origin, 7, secs(500)));

        // Different sequence number or originator is new
        assert!(!cache.seen(origin, 8, secs(2)));
        assert!(!cache.seen(addr(6), 7, secs(2)));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_rreq_cache_eviction() {
        let mut cache = RouteRequestCache::new();
        cache.seen(addr(5), 1, secs(0));
        cache.seen(addr(5), 2, secs(50));

        assert_eq!(cache.evict_older_than(secs(100), secs(60)), 1);
        assert_eq!(cache.len(), 1);
        assert!(!cache.seen(addr(5), 1, secs(100)));
        assert!(cache.seen(addr(5), 2, secs(100)));
    }
}
