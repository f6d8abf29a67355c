//! FANET Command-Line Interface
//!
//! This CLI provides tools for:
//! - Simulating UAV swarms delivering sensor data to a ground station
//! - Printing and editing scenario configurations
//! - Decoding wire payloads

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fanet_core::mesh::{MessageCodec, MessageType, ProtocolMessage};
use fanet_core::simulation::{FanetSimulator, ScenarioConfig};
use fanet_core::{ProtocolLimits, RoutingMode, TimerIntervals};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fanet")]
#[command(author, version, about = "FANET mesh protocol simulator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a swarm scenario and print the summary
    Simulate {
        /// Scenario file (JSON); defaults are used for missing fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of UAVs
        #[arg(short, long)]
        uavs: Option<usize>,

        /// Radio and transmission range in meters
        #[arg(short, long)]
        range: Option<f64>,

        /// Simulated duration in seconds
        #[arg(short, long)]
        duration: Option<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Keep every UAV at its start position
        #[arg(long = "static")]
        static_nodes: bool,

        /// Data delivery mode
        #[arg(long, value_enum)]
        mode: Option<Mode>,

        /// Print the neighbor topology after the run
        #[arg(long)]
        topology: bool,
    },

    /// Print the default scenario configuration as JSON
    Config,

    /// Show protocol constants and message types
    Info,

    /// Decode a wire payload
    Decode {
        /// JSON envelope, e.g. '{"messageType":3,"fields":{...}}'
        payload: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// RREQ/RREP mesh routing
    Mesh,
    /// Single relay through the best UAV neighbor
    Relay,
}

impl From<Mode> for RoutingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mesh => RoutingMode::Mesh,
            Mode::Relay => RoutingMode::SingleHopRelay,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_simulate(
    config_path: Option<PathBuf>,
    uavs: Option<usize>,
    range: Option<f64>,
    duration: Option<f64>,
    seed: Option<u64>,
    static_nodes: bool,
    mode: Option<Mode>,
    topology: bool,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => ScenarioConfig::from_file(path)
            .with_context(|| format!("Failed to load scenario {}", path.display()))?,
        None => ScenarioConfig::default(),
    };

    if let Some(n) = uavs {
        config.uav_positions.clear();
        config = config.with_uav_count(n);
    }
    if let Some(meters) = range {
        config = config.with_range(meters);
    }
    if let Some(secs) = duration {
        config = config.with_duration(secs);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if static_nodes {
        config = config.with_mobility(false);
    }
    if let Some(mode) = mode {
        config = config.with_routing_mode(mode.into());
    }

    println!("=== FANET Swarm Simulation ===");
    println!();
    println!("UAVs:     {}", config.uav_count);
    println!("Range:    {:.0} m", config.radio_range);
    println!("Duration: {:.0} s", config.duration);
    println!("Seed:     {}", config.seed);
    println!("Mobility: {}", if config.mobility { "bounce" } else { "static" });
    println!("Mode:     {:?}", config.node.routing_mode);

    let mut sim = FanetSimulator::new(config).context("Invalid scenario")?;

    // Setup Ctrl+C handler
    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    ctrlc::set_handler(move || {
        s.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let started = Instant::now();
    let deadline = sim.config().duration();
    if sim.run_until(deadline, &stop) {
        sim.stop_all();
    } else {
        warn!("Simulation interrupted at {:.1}s", sim.now().as_secs_f64());
    }
    info!("Simulation finished in {:?}", started.elapsed());

    sim.print_summary();

    if topology {
        println!();
        println!("Topology (neighbor tables):");
        for (i, neighbors) in sim.topology().iter().enumerate() {
            let addr = sim
                .node_address(i)
                .map(|a| a.to_string())
                .unwrap_or_default();
            println!("  {:2} {:<12} -> {:?}", i, addr, neighbors);
        }
        println!("Connected: {}", sim.is_connected());
    }

    Ok(())
}

fn cmd_config() -> Result<()> {
    let json = serde_json::to_string_pretty(&ScenarioConfig::default())
        .context("Failed to serialize default scenario")?;
    println!("{}", json);
    Ok(())
}

fn cmd_info() -> Result<()> {
    let limits = ProtocolLimits::default();
    let intervals = TimerIntervals::default();

    println!("=== FANET Protocol ===");
    println!();
    println!("Message types:");
    for t in MessageType::ALL {
        println!("  {}  {}", t as u8, t);
    }
    println!();
    println!("Limits:");
    println!("  Max discovery rounds:    {}", limits.max_discovery_rounds);
    println!("  Max data transmissions:  {}", limits.max_data_transmissions);
    println!("  Max connectivity checks: {}", limits.max_connectivity_checks);
    println!("  Max relay hop count:     {}", limits.max_hop_count);
    println!("  Max TTL:                 {}", limits.max_ttl);
    println!("  Route timeout:           {:.0} s", limits.route_timeout);
    println!("  RREQ cache lifetime:     {:.0} s", limits.rreq_cache_lifetime);
    println!();
    println!("Timers:");
    println!("  Discovery:     every {:.0} s (first after 1-3 s)", intervals.discovery);
    println!("  Sensor data:   every {:.0} s (first after 5-8 s)", intervals.data);
    println!("  Connectivity:  every {:.0} s (first after 10-15 s)", intervals.connectivity);
    println!("  Finalization:  {:.0} s after start", intervals.finalize_after);
    println!();
    println!("Examples:");
    println!("  fanet simulate --uavs 8 --range 800");
    println!("  fanet simulate --static --mode relay --topology");
    println!("  fanet config > scenario.json && fanet simulate -c scenario.json");

    Ok(())
}

fn cmd_decode(payload: String) -> Result<()> {
    let message = MessageCodec::decode(payload.trim().as_bytes()).context("Failed to decode payload")?;

    println!("Type: {} ({})", message.message_type(), message.message_type() as u8);
    match message {
        ProtocolMessage::NeighborDiscovery(b) | ProtocolMessage::NeighborResponse(b) => {
            println!("Node:      {}", b.node_index);
            println!("Role:      {}", b.role);
            println!("Position:  {}", b.position);
            println!("Timestamp: {:.2}", b.timestamp);
        }
        ProtocolMessage::SensorData(d) => {
            println!("Source:    UAV{}", d.source_node);
            println!("Data:      {}", d.payload);
        }
        ProtocolMessage::DataRelay(r) => {
            println!("Source:    UAV{}", r.source_node);
            println!("Data:      {}", r.payload);
            println!("Final:     {}", r.final_destination);
            println!("Hops:      {}", r.hop_count);
        }
        ProtocolMessage::RouteRequest(r) => {
            println!("Destination: {}", r.destination);
            println!("Originator:  {}", r.originator);
            println!("Sequence:    {}", r.sequence_number);
            println!("Hops:        {}", r.hop_count);
            println!("TTL:         {}", r.ttl);
        }
        ProtocolMessage::RouteReply(r) => {
            println!("Destination: {}", r.destination);
            println!("Originator:  {}", r.originator);
            println!("Hops:        {}", r.hop_count);
        }
        ProtocolMessage::MeshData(m) => {
            println!("Source:      UAV{}", m.source_node);
            println!("Destination: {}", m.destination);
            println!("TTL:         {}", m.ttl);
            println!("Data:        {}", m.payload);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG takes precedence over -v
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Simulate {
            config,
            uavs,
            range,
            duration,
            seed,
            static_nodes,
            mode,
            topology,
        } => cmd_simulate(config, uavs, range, duration, seed, static_nodes, mode, topology),
        Commands::Config => cmd_config(),
        Commands::Info => cmd_info(),
        Commands::Decode { payload } => cmd_decode(payload),
    }
}
