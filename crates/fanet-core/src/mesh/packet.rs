//! FANET message types
//!
//! This module defines the addressing, geometry and message structures
//! exchanged between UAVs and the ground control station. Messages are a
//! plain sum type; the wire representation lives in [`super::codec`].
//!
//! ## Message Types
//!
//! ```text
//! ┌──────────────────────┬──────┬──────────────────────────────────────────┐
//! │ Type                 │ Tag  │ Purpose                                  │
//! ├──────────────────────┼──────┼──────────────────────────────────────────┤
//! │ NEIGHBOR_DISCOVERY   │  1   │ periodic beacon (broadcast)              │
//! │ NEIGHBOR_RESPONSE    │  2   │ beacon answer (unicast)                  │
//! │ SENSOR_DATA          │  3   │ UAV reading for the GCS                  │
//! │ DATA_RELAY           │  4   │ single-relay sensor data (legacy)        │
//! │ ROUTE_REQUEST        │  5   │ RREQ flood                               │
//! │ ROUTE_REPLY          │  6   │ RREP back along the reverse path         │
//! │ MESH_DATA            │  7   │ sensor data routed hop by hop            │
//! └──────────────────────┴──────┴──────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Network address of a node - opaque, unique per node, never mutated
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeAddress(Ipv4Addr);

impl NodeAddress {
    /// Limited broadcast address (255.255.255.255)
    pub const BROADCAST: NodeAddress = NodeAddress(Ipv4Addr::BROADCAST);

    /// Loopback address (127.0.0.1)
    pub const LOOPBACK: NodeAddress = NodeAddress(Ipv4Addr::LOCALHOST);

    /// Unset address (0.0.0.0)
    pub const UNSPECIFIED: NodeAddress = NodeAddress(Ipv4Addr::UNSPECIFIED);

    /// Create an address from its four octets
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        NodeAddress(Ipv4Addr::new(a, b, c, d))
    }

    /// Convert to u32
    pub fn to_u32(&self) -> u32 {
        u32::from(self.0)
    }

    /// Create from a u32
    pub fn from_u32(value: u32) -> Self {
        NodeAddress(Ipv4Addr::from(value))
    }

    /// Check if this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        self.0.is_broadcast()
    }

    /// Check if this is a loopback address
    pub fn is_loopback(&self) -> bool {
        self.0.is_loopback()
    }

    /// Check if this is unset
    pub fn is_unspecified(&self) -> bool {
        self.0.is_unspecified()
    }
}

impl From<Ipv4Addr> for NodeAddress {
    fn from(addr: Ipv4Addr) -> Self {
        NodeAddress(addr)
    }
}

impl FromStr for NodeAddress {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<Ipv4Addr>().map(NodeAddress)
    }
}

impl fmt::Debug for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddress({})", self.0)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 3D position in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position in meters
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.0},{:.0},{:.0})", self.x, self.y, self.z)
    }
}

/// Role of a node in the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    /// Aerial mesh node; originates and relays sensor data
    #[default]
    Uav,
    /// Ground control station; the data sink
    Gcs,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Uav => "UAV",
            Role::Gcs => "GCS",
        }
    }

    /// Parse a wire token. Anything that is not "GCS" is a UAV.
    pub fn from_token(token: &str) -> Self {
        if token.trim() == "GCS" {
            Role::Gcs
        } else {
            Role::Uav
        }
    }

    pub fn is_gcs(&self) -> bool {
        matches!(self, Role::Gcs)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message type tags as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    NeighborDiscovery = 1,
    NeighborResponse = 2,
    SensorData = 3,
    DataRelay = 4,
    RouteRequest = 5,
    RouteReply = 6,
    MeshData = 7,
}

impl MessageType {
    /// All message types in tag order
    pub const ALL: [MessageType; 7] = [
        MessageType::NeighborDiscovery,
        MessageType::NeighborResponse,
        MessageType::SensorData,
        MessageType::DataRelay,
        MessageType::RouteRequest,
        MessageType::RouteReply,
        MessageType::MeshData,
    ];

    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| *t as u8 == tag)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageType::NeighborDiscovery => "NEIGHBOR_DISCOVERY",
            MessageType::NeighborResponse => "NEIGHBOR_RESPONSE",
            MessageType::SensorData => "SENSOR_DATA",
            MessageType::DataRelay => "DATA_RELAY",
            MessageType::RouteRequest => "ROUTE_REQUEST",
            MessageType::RouteReply => "ROUTE_REPLY",
            MessageType::MeshData => "MESH_DATA",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Discovery beacon, used by both NEIGHBOR_DISCOVERY and NEIGHBOR_RESPONSE
#[derive(Debug, Clone, PartialEq)]
pub struct Beacon {
    /// Sender's node index
    pub node_index: u32,
    /// Send time in seconds of simulated time
    pub timestamp: f64,
    /// Sender's position at send time
    pub position: Position,
    /// Sender's role
    pub role: Role,
}

/// Sensor reading addressed to the GCS
#[derive(Debug, Clone, PartialEq)]
pub struct SensorData {
    pub source_node: u32,
    pub payload: String,
}

/// Final destination of a legacy relay packet. Only the GCS is defined.
pub const RELAY_DESTINATION_GCS: &str = "GCS";

/// Sensor reading carried through one relay toward the GCS
#[derive(Debug, Clone, PartialEq)]
pub struct DataRelay {
    pub source_node: u32,
    pub payload: String,
    pub final_destination: String,
    pub hop_count: u8,
}

/// Route request (RREQ)
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    /// Node a route is wanted for
    pub destination: NodeAddress,
    /// Node that started the discovery
    pub originator: NodeAddress,
    /// Originator's RREQ sequence number (dedup only)
    pub sequence_number: u32,
    /// Hops travelled so far
    pub hop_count: u8,
    /// Remaining hop budget
    pub ttl: u8,
}

/// Route reply (RREP)
#[derive(Debug, Clone, PartialEq)]
pub struct RouteReply {
    /// Node the route leads to
    pub destination: NodeAddress,
    /// Node that asked for the route; the reply travels toward it
    pub originator: NodeAddress,
    /// Hops from the replying node to `destination`
    pub hop_count: u8,
}

/// Sensor data routed hop by hop over the mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub source_node: u32,
    pub payload: String,
    pub destination: NodeAddress,
    pub ttl: u8,
}

/// A FANET protocol message
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    NeighborDiscovery(Beacon),
    NeighborResponse(Beacon),
    SensorData(SensorData),
    DataRelay(DataRelay),
    RouteRequest(RouteRequest),
    RouteReply(RouteReply),
    MeshData(MeshData),
}

impl ProtocolMessage {
    /// Type tag of this message
    pub fn message_type(&self) -> MessageType {
        match self {
            ProtocolMessage::NeighborDiscovery(_) => MessageType::NeighborDiscovery,
            ProtocolMessage::NeighborResponse(_) => MessageType::NeighborResponse,
            ProtocolMessage::SensorData(_) => MessageType::SensorData,
            ProtocolMessage::DataRelay(_) => MessageType::DataRelay,
            ProtocolMessage::RouteRequest(_) => MessageType::RouteRequest,
            ProtocolMessage::RouteReply(_) => MessageType::RouteReply,
            ProtocolMessage::MeshData(_) => MessageType::MeshData,
        }
    }

    /// Sender position, for messages that carry one
    pub fn position(&self) -> Option<Position> {
        match self {
            ProtocolMessage::NeighborDiscovery(b) | ProtocolMessage::NeighborResponse(b) => {
                Some(b.position)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_distance() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(2.0, 3.0, 6.0);
        assert!((a.distance_to(&b) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_address_classes() {
        assert!(NodeAddress::BROADCAST.is_broadcast());
        assert!(NodeAddress::LOOPBACK.is_loopback());
        assert!(NodeAddress::UNSPECIFIED.is_unspecified());

        let addr: NodeAddress = "10.0.0.7".parse().unwrap();
        assert_eq!(addr, NodeAddress::new(10, 0, 0, 7));
        assert_eq!(NodeAddress::from_u32(addr.to_u32()), addr);
        assert_eq!(addr.to_string(), "10.0.0.7");
    }

    #[test]
    fn test_role_tokens() {
        assert_eq!(Role::from_token("GCS"), Role::Gcs);
        assert_eq!(Role::from_token("UAV"), Role::Uav);
        assert_eq!(Role::from_token("anything"), Role::Uav);
    }

    #[test]
    fn test_message_type_tags() {
        assert_eq!(MessageType::from_u8(5), Some(MessageType::RouteRequest));
        assert_eq!(MessageType::from_u8(0), None);
        assert_eq!(MessageType::from_u8(8), None);
        assert_eq!(MessageType::MeshData.name(), "MESH_DATA");
    }

    #[test]
    fn test_only_beacons_carry_position() {
        let beacon = Beacon {
            node_index: 1,
            timestamp: 0.0,
            position: Position::new(1.0, 2.0, 3.0),
            role: Role::Uav,
        };
        assert!(ProtocolMessage::NeighborResponse(beacon).position().is_some());

        let rreq = ProtocolMessage::RouteRequest(RouteRequest {
            destination: NodeAddress::new(10, 0, 0, 1),
            originator: NodeAddress::new(10, 0, 0, 2),
            sequence_number: 1,
            hop_count: 0,
            ttl: 5,
        });
        assert!(rreq.position().is_none());
    }
}
