//! FANET Mesh Protocol
//!
//! This module implements the per-node protocol that lets a swarm of UAVs
//! discover each other, learn routes and deliver sensor readings to a ground
//! control station (GCS). The architecture separates concerns into:
//!
//! - **Packet**: addresses, positions and the seven message kinds
//! - **Codec**: the self-describing JSON envelope used on the wire
//! - **Neighbor**: table of directly heard peers and relay selection
//! - **Routing**: reactive routes plus RREQ duplicate suppression
//! - **Traits**: collaborator seams (position, transport, clock, diagnostics)
//! - **Engine**: the protocol state machine tying it all together
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Driver (simulator, runtime)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//!          │ on_timer / on_message                     ▲ send / schedule
//!          ▼                                           │
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ProtocolEngine                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐     │
//! │  │  discovery  │  │ sensor data │  │  RREQ/RREP  │  │connectivity │     │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └─────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────────────────┐
//! │  NeighborTable   │ │  RoutingTable    │ │  RouteRequestCache           │
//! └──────────────────┘ └──────────────────┘ └──────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use fanet_core::mesh::{Collaborators, ProtocolEngine};
//! use fanet_core::config::FanetConfig;
//!
//! let config = FanetConfig::uav(1, "10.0.0.2".parse()?);
//! let mut engine = ProtocolEngine::new(config, collaborators)?;
//! engine.start();
//!
//! // Driver loop
//! engine.on_timer(handle);
//! engine.on_message(&payload, sender);
//! ```

pub mod codec;
pub mod diagnostics;
pub mod engine;
pub mod neighbor;
pub mod packet;
pub mod routing;
pub mod traits;

// Re-export main types
pub use codec::{format_position_info, parse_position_info, MessageCodec};
pub use diagnostics::{RecordingSink, Signal, TracingSink};
pub use engine::{Collaborators, DeliveryStrategy, EngineState, ProtocolEngine, TimerKind};
pub use neighbor::{NeighborEntry, NeighborTable};
pub use packet::{
    Beacon, DataRelay, MeshData, MessageType, NodeAddress, Position, ProtocolMessage, Role,
    RouteReply, RouteRequest, SensorData, RELAY_DESTINATION_GCS,
};
pub use routing::{RouteEntry, RouteRequestCache, RoutingTable};
pub use traits::{
    DiagnosticsSink, EngineStats, MessageHandler, PositionProvider, Scheduler, StatisticsSource,
    TimerHandle, TimerHandler, Transport,
};
