//! Mock vehicle: a simulated ArduPilot autopilot on a UDP port.
//!
//! Point a ground station at it with `udpin:0.0.0.0:14550` (the default
//! `--gcs` address) or `udpout:127.0.0.1:14551` (the default `--listen`).

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use gcslink_models::{ParamId, VehicleFamily};
use mock_vehicle::{serve, MockVehicle};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Vehicle firmware to imitate.
#[derive(ValueEnum, Debug, Clone, Copy)]
enum VehicleArg {
    Copter,
    Plane,
    Rover,
    Sub,
}

impl From<VehicleArg> for VehicleFamily {
    fn from(arg: VehicleArg) -> Self {
        match arg {
            VehicleArg::Copter => Self::Copter,
            VehicleArg::Plane => Self::Plane,
            VehicleArg::Rover => Self::Rover,
            VehicleArg::Sub => Self::Sub,
        }
    }
}

/// Simulated MAVLink vehicle.
#[derive(Parser, Debug)]
#[command(name = "mock-vehicle", about = "Simulated ArduPilot vehicle for gcslink")]
struct Args {
    /// Local address to bind.
    #[arg(long, default_value = "0.0.0.0:14551")]
    listen: SocketAddr,

    /// Ground station address telemetry is sent to until it speaks first.
    #[arg(long, default_value = "127.0.0.1:14550")]
    gcs: SocketAddr,

    /// Firmware family, selects the flight-mode table.
    #[arg(long, value_enum, default_value = "copter")]
    vehicle: VehicleArg,

    /// Latitude of the simulated position.
    #[arg(long, default_value_t = 47.397_742)]
    lat: f64,

    /// Longitude of the simulated position.
    #[arg(long, default_value_t = 8.545_594)]
    lon: f64,

    /// Telemetry interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (controlled via RUST_LOG env var).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let socket = UdpSocket::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!(listen = %args.listen, gcs = %args.gcs, vehicle = ?args.vehicle, "mock vehicle up");

    let vehicle = MockVehicle::new(args.vehicle.into())
        .with_position(args.lat, args.lon)
        .with_param(&ParamId::new("RTL_ALT")?, 1500.0)
        .with_param(&ParamId::new("WPNAV_SPEED")?, 500.0)
        .with_param(&ParamId::new("FENCE_ENABLE")?, 0.0);

    let (to_ground, mut ground_rx) = mpsc::unbounded_channel();
    let (ground_tx, from_ground) = mpsc::unbounded_channel();
    let simulator = tokio::spawn(serve(
        Arc::new(Mutex::new(vehicle)),
        to_ground,
        from_ground,
        Duration::from_millis(args.interval_ms),
    ));

    // Replies go to whoever spoke last; telemetry starts out at --gcs.
    let mut peer = args.gcs;
    let mut buf = vec![0u8; 4096];
    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((len, from)) => {
                        peer = from;
                        if ground_tx.send(buf[..len].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "receive failed"),
                }
            }
            outgoing = ground_rx.recv() => {
                let Some(datagram) = outgoing else { break };
                if let Err(e) = socket.send_to(&datagram, peer).await {
                    warn!(error = %e, %peer, "send failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    drop(ground_tx);
    join_simulator(simulator).await
}

/// Wait for the simulator to drain; a panic inside it is an error.
async fn join_simulator(simulator: JoinHandle<()>) -> anyhow::Result<()> {
    simulator.await.context("simulator task failed")
}
