//! Collaborator and capability traits
//!
//! The protocol engine never touches sockets, clocks or mobility models
//! directly. Everything outside the protocol is reached through the
//! collaborator traits below, injected at construction:
//!
//! - [`PositionProvider`]: current 3D position of this node
//! - [`Transport`]: unicast and broadcast datagram delivery
//! - [`Scheduler`]: simulated clock and one-shot timers
//! - [`DiagnosticsSink`]: write-only counters and gauges
//!
//! The engine in turn exposes its capabilities to the driver through
//! [`TimerHandler`], [`MessageHandler`] and [`StatisticsSource`].

use super::diagnostics::Signal;
use super::packet::{NodeAddress, Position};
use std::fmt;
use std::time::Duration;

/// Opaque handle for a scheduled timer
///
/// Handles are issued by the [`Scheduler`]; the engine only compares them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn new(id: u64) -> Self {
        TimerHandle(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerHandle({})", self.0)
    }
}

/// Source of this node's current position
pub trait PositionProvider {
    /// Position snapshot at the current simulated time
    fn current_position(&self) -> Position;
}

/// Datagram transport
///
/// Sends never fail from the engine's point of view; an unreachable peer
/// simply never answers.
pub trait Transport {
    /// Send a payload to one node
    fn send_unicast(&mut self, payload: Vec<u8>, destination: NodeAddress, port: u16);

    /// Send a payload to every node that can hear us
    fn send_broadcast(&mut self, payload: Vec<u8>, port: u16);
}

/// Simulated clock and timer service
pub trait Scheduler {
    /// Current simulated time
    fn now(&self) -> Duration;

    /// Arrange for [`TimerHandler::on_timer`] to be called after `delay`
    fn schedule_after(&mut self, delay: Duration) -> TimerHandle;

    /// Cancel a pending timer. Cancelling a fired or unknown handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Write-only statistics output
pub trait DiagnosticsSink {
    fn emit(&mut self, node: NodeAddress, signal: Signal);
}

/// Reacts to timer expiry
pub trait TimerHandler {
    fn on_timer(&mut self, handle: TimerHandle);
}

/// Reacts to inbound datagrams
pub trait MessageHandler {
    /// `sender` is the transport-level source address
    fn on_message(&mut self, payload: &[u8], sender: NodeAddress);
}

/// Supplies protocol statistics
pub trait StatisticsSource {
    fn stats(&self) -> EngineStats;
}

/// Per-node protocol counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    /// Datagrams handed to the transport
    pub packets_sent: u64,
    /// Datagrams received, before admission
    pub packets_received: u64,
    /// Sensor payloads originated by this UAV
    pub data_packets_sent: u64,
    /// Sensor payloads delivered at this GCS
    pub data_packets_received: u64,
    /// Route requests originated
    pub route_requests_sent: u64,
    /// Route replies sent or forwarded
    pub route_replies_sent: u64,
    /// Data packets forwarded on behalf of others
    pub relays_forwarded: u64,
    /// Data packets dropped for lack of route, TTL or hop budget
    pub relay_failures: u64,
    /// Sensor payloads with no recipient at all
    pub undeliverable: u64,
    /// Messages dropped by the range admission check
    pub dropped_out_of_range: u64,
    /// Messages dropped because they came from us or loopback
    pub dropped_self: u64,
    /// Messages dropped because they could not be decoded
    pub dropped_malformed: u64,
    /// RREQs suppressed by the dedup cache
    pub duplicate_route_requests: u64,
    /// Current neighbor count
    pub neighbor_count: usize,
    /// Current valid route count
    pub route_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_handle_identity() {
        let a = TimerHandle::new(3);
        assert_eq!(a, TimerHandle::new(3));
        assert_ne!(a, TimerHandle::new(4));
        assert_eq!(a.id(), 3);
        assert_eq!(format!("{:?}", a), "TimerHandle(3)");
    }

    #[test]
    fn test_engine_stats_default() {
        let stats = EngineStats::default();
        assert_eq!(stats.packets_sent, 0);
        assert_eq!(stats.neighbor_count, 0);
    }
}
