//! Diagnostics signals and sinks

use super::packet::NodeAddress;
use super::traits::DiagnosticsSink;
use std::cell::RefCell;
use std::rc::Rc;

/// A statistics sample emitted by the engine. Counters are cumulative.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    PacketsSent(u64),
    PacketsReceived(u64),
    DataPacketsSent(u64),
    DataPacketsReceived(u64),
    RelayForwarded(u64),
    DeliveryFailed(u64),
    /// Connectivity check result
    NeighborsFound {
        total: usize,
        uavs: usize,
        gcs_connected: bool,
    },
}

/// Forwards signals to `tracing` at trace level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&mut self, node: NodeAddress, signal: Signal) {
        tracing::trace!(%node, ?signal, "diagnostics");
    }
}

/// Collects signals into a shared buffer
///
/// Clones share the same buffer, so one clone can be handed to an engine
/// while another is kept for inspection.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    signals: Rc<RefCell<Vec<(NodeAddress, Signal)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn signals(&self) -> Vec<(NodeAddress, Signal)> {
        self.signals.borrow().clone()
    }

    /// Most recent neighbor report for `node`
    pub fn last_neighbor_report(&self, node: NodeAddress) -> Option<Signal> {
        self.signals
            .borrow()
            .iter()
            .rev()
            .find(|(n, s)| *n == node && matches!(s, Signal::NeighborsFound { .. }))
            .map(|(_, s)| s.clone())
    }

    pub fn len(&self) -> usize {
        self.signals.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.borrow().is_empty()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn emit(&mut self, node: NodeAddress, signal: Signal) {
        self.signals.borrow_mut().push((node, signal));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_shares_buffer() {
        let sink = RecordingSink::new();
        let mut handle = sink.clone();
        let node = NodeAddress::new(10, 0, 0, 2);

        handle.emit(node, Signal::PacketsSent(1));
        handle.emit(
            node,
            Signal::NeighborsFound {
                total: 2,
                uavs: 1,
                gcs_connected: true,
            },
        );

        assert_eq!(sink.len(), 2);
        assert!(matches!(
            sink.last_neighbor_report(node),
            Some(Signal::NeighborsFound { total: 2, .. })
        ));
        assert!(sink.last_neighbor_report(NodeAddress::new(10, 0, 0, 9)).is_none());
    }
}
