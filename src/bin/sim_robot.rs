use anyhow::{Context, Result};
use clap::Parser;
use prometheus_arbiter::transport::tcp::{serve, DEFAULT_PORT};
use prometheus_arbiter::transport::{SimConfig, SimulatedRobot};
use prometheus_arbiter::RobotTransport;
use std::net::TcpListener;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Serve the simulated robot over TCP for teleop_wander to connect to
#[derive(Parser, Debug)]
#[command(name = "sim_robot", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Simulation step in milliseconds
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    cycle_ms: u64,

    /// Step as fast as requested instead of in real time
    #[arg(long)]
    fast: bool,

    /// Exit after this many clients have disconnected
    #[arg(long)]
    clients: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = SimConfig {
        period: Duration::from_millis(args.cycle_ms),
        realtime: !args.fast,
        ..SimConfig::default()
    };
    let mut robot = SimulatedRobot::demo(config);
    robot.connect()?;

    let address = format!("{}:{}", args.bind, args.port);
    let listener =
        TcpListener::bind(&address).with_context(|| format!("could not listen on {}", address))?;
    info!("Simulated robot listening on {}", address);

    serve(&listener, &mut robot, args.clients)?;
    info!("Served {} commands", robot.commands_received());
    Ok(())
}
