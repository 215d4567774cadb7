//! gcslink: command-line ground station.
//!
//! Every invocation connects, runs one command and disconnects. The
//! endpoint comes from `--endpoint` / `GCSLINK_ENDPOINT`; deadlines and
//! identities come from the `GCSLINK_*` variables read by
//! `SessionConfig::from_env`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use gcslink_sdk::{
    ArmConfirmation, MissionItem, MissionType, ModeSelector, ParamId, SessionConfig, Telemetry,
    TelemetryField, VehicleSession, Waypoint,
};
use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gcslink")]
#[command(author, version, about = "MAVLink ground-station command line", long_about = None)]
struct Cli {
    /// MAVLink endpoint: udpin:HOST:PORT, udpout:HOST:PORT or udp:HOST:PORT.
    #[arg(long, env = "GCSLINK_ENDPOINT", default_value = "udpin:0.0.0.0:14550")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the telemetry snapshot.
    Telemetry {
        /// Keep printing on every change until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// Arm the motors.
    Arm(ArmArgs),
    /// Disarm the motors.
    Disarm(ArmArgs),
    /// Take off from the current position.
    Takeoff {
        /// Target altitude in metres.
        altitude: f32,
    },
    /// Change flight mode by name (GUIDED, AUTO, ...) or number.
    Mode {
        /// Mode name or custom mode number.
        mode: String,
    },
    /// List the flight modes of the connected vehicle.
    Modes,
    /// Upload waypoints from a JSON file.
    Upload {
        /// Store to replace.
        #[arg(value_enum)]
        store: Store,
        /// JSON array of `{ "lat": .., "lon": .., "alt": .. }` objects.
        file: PathBuf,
    },
    /// Download a store (or all of them) as JSON.
    Download {
        /// Store to read, or `all`.
        #[arg(value_enum)]
        store: DownloadStore,
        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Read or write onboard parameters.
    Param {
        #[command(subcommand)]
        action: ParamAction,
    },
}

#[derive(Args, Debug)]
struct ArmArgs {
    /// How to confirm the change.
    #[arg(long, value_enum, default_value = "none")]
    confirm: Confirm,
}

#[derive(Subcommand, Debug)]
enum ParamAction {
    /// Read one parameter.
    Get {
        /// Parameter name, e.g. RTL_ALT.
        id: ParamId,
    },
    /// Write one parameter as a float.
    Set {
        /// Parameter name, e.g. RTL_ALT.
        id: ParamId,
        /// New value.
        value: f32,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Confirm {
    None,
    Ack,
    State,
}

impl From<Confirm> for ArmConfirmation {
    fn from(confirm: Confirm) -> Self {
        match confirm {
            Confirm::None => Self::None,
            Confirm::Ack => Self::CommandAck,
            Confirm::State => Self::ArmedState,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Store {
    Mission,
    Fence,
    Rally,
}

impl From<Store> for MissionType {
    fn from(store: Store) -> Self {
        match store {
            Store::Mission => Self::Mission,
            Store::Fence => Self::Fence,
            Store::Rally => Self::Rally,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum DownloadStore {
    Mission,
    Fence,
    Rally,
    All,
}

#[derive(Serialize)]
struct StoreDump {
    mission_type: MissionType,
    items: Vec<MissionItem>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (controlled via RUST_LOG env var).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session = VehicleSession::new(SessionConfig::from_env());
    session
        .connect(&cli.endpoint)
        .await
        .with_context(|| format!("connecting to {}", cli.endpoint))?;

    let outcome = run(&session, cli.command).await;
    session.disconnect().await?;
    outcome
}

async fn run(session: &VehicleSession, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Telemetry { watch } => {
            // Give the stream one telemetry period to fill the snapshot.
            tokio::time::sleep(session.config().poll_interval).await;
            if !watch {
                print_telemetry(&session.telemetry());
                return Ok(());
            }
            let mut telemetry = session.subscribe_telemetry();
            loop {
                tokio::select! {
                    changed = telemetry.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = telemetry.borrow_and_update().clone();
                        print_telemetry(&snapshot);
                        println!();
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
        Commands::Arm(args) => session.commands().arm_with(args.confirm.into()).await?,
        Commands::Disarm(args) => session.commands().disarm_with(args.confirm.into()).await?,
        Commands::Takeoff { altitude } => {
            wait_for_position(session).await;
            session.takeoff(altitude).await?;
        }
        Commands::Mode { mode } => {
            let selector = mode
                .parse::<u32>()
                .map_or_else(|_| ModeSelector::Name(mode.clone()), ModeSelector::Id);
            let id = session.set_mode(selector).await?;
            info!(%mode, custom_mode = id, "mode requested");
        }
        Commands::Modes => {
            for name in session.commands().available_modes() {
                println!("{name}");
            }
        }
        Commands::Upload { store, file } => {
            let waypoints = read_waypoints(&file)?;
            session
                .missions()
                .upload_waypoints(store.into(), &waypoints)
                .await?;
            println!("uploaded {} {} items", waypoints.len(), MissionType::from(store));
        }
        Commands::Download { store, output } => {
            let dumps = match store {
                DownloadStore::All => session.missions().download_all().await?,
                DownloadStore::Mission => download(session, MissionType::Mission).await?,
                DownloadStore::Fence => download(session, MissionType::Fence).await?,
                DownloadStore::Rally => download(session, MissionType::Rally).await?,
            };
            let dumps: Vec<StoreDump> = dumps
                .into_iter()
                .map(|(mission_type, items)| StoreDump {
                    mission_type,
                    items,
                })
                .collect();
            let json = serde_json::to_string_pretty(&dumps)?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        Commands::Param { action } => match action {
            ParamAction::Get { id } => {
                let value = session.get_param(&id).await?;
                println!("{} = {} ({:?})", value.id, value.value, value.param_type);
            }
            ParamAction::Set { id, value } => {
                let echoed = session.set_param(&id, value).await?;
                println!("{id} = {echoed}");
            }
        },
    }
    Ok(())
}

async fn download(
    session: &VehicleSession,
    mission_type: MissionType,
) -> anyhow::Result<Vec<(MissionType, Vec<MissionItem>)>> {
    Ok(vec![(mission_type, session.download_items(mission_type).await?)])
}

async fn wait_for_position(session: &VehicleSession) {
    let mut telemetry = session.subscribe_telemetry();
    let wait = session.config().command_timeout.max(Duration::from_secs(1));
    // On expiry `takeoff` reports the missing fix itself.
    let _ = tokio::time::timeout(wait, telemetry.wait_for(Telemetry::has_position)).await;
}

fn read_waypoints(path: &Path) -> anyhow::Result<Vec<Waypoint>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_telemetry(telemetry: &Telemetry) {
    for field in TelemetryField::iter() {
        let name = field.to_string();
        match telemetry.get(field) {
            Some(value) => println!("{name:<24} {value}"),
            None => println!("{name:<24} -"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upload_command() {
        let cli = Cli::try_parse_from(["gcslink", "upload", "fence", "fence.json"]).unwrap();
        assert_eq!(cli.endpoint, "udpin:0.0.0.0:14550");
        assert!(matches!(
            cli.command,
            Commands::Upload {
                store: Store::Fence,
                ..
            }
        ));
    }

    #[test]
    fn rejects_bad_param_id() {
        let err = Cli::try_parse_from(["gcslink", "param", "get", "WAY_TOO_LONG_PARAMETER"]);
        assert!(err.is_err());
    }

    #[test]
    fn waypoint_files_need_only_position() {
        let dir = std::env::temp_dir().join(format!("gcslink-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("points.json");
        std::fs::write(&path, r#"[{"lat": 47.0, "lon": 8.0}, {"lat": 47.1, "lon": 8.1, "alt": 30}]"#)
            .unwrap();

        let points = read_waypoints(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].alt, 0.0);
        assert_eq!(points[1].alt, 30.0);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
