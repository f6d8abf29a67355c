//! # FANET Core Library
//!
//! This crate implements the per-node protocol of a Flying Ad-hoc Network
//! (FANET): a swarm of UAVs that discover each other with position beacons,
//! learn multi-hop routes on demand, and deliver sensor readings to a ground
//! control station (GCS).
//!
//! ## Overview
//!
//! - **Neighbor discovery**: periodic beacons carrying position and role,
//!   admitted only within the maximum transmission range
//! - **Reactive routing**: RREQ floods bounded by TTL, RREP along the reverse
//!   path, routes that age out
//! - **Data delivery**: direct to the GCS when possible, otherwise over the
//!   mesh, with broadcast as last resort
//! - **Simulation**: a discrete-event harness with mobility and a unit-disk
//!   radio for running whole swarms
//!
//! ## Example
//!
//! ```rust,no_run
//! use fanet_core::simulation::{FanetSimulator, ScenarioConfig};
//!
//! let config = ScenarioConfig::default().with_uav_count(8).with_range(800.0);
//! let mut sim = FanetSimulator::new(config).expect("valid scenario");
//! sim.run();
//! sim.print_summary();
//! ```

pub mod config;
pub mod error;
pub mod mesh;
pub mod mobility;
pub mod simulation;

pub use config::{FanetConfig, ProtocolLimits, RoutingMode, TimerIntervals};
pub use error::{CodecError, FanetError, Result};
pub use mesh::{MessageCodec, NodeAddress, Position, ProtocolEngine, ProtocolMessage, Role};
pub use simulation::{FanetSimulator, ScenarioConfig, SimStats};
