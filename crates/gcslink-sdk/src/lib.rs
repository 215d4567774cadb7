//! # gcslink SDK
//!
//! Ground-station session for a single MAVLink vehicle.
//!
//! The SDK provides:
//!
//! * [`VehicleSession`]: owns the link, the background router task and
//!   the telemetry snapshot; entry point for everything else.
//! * [`MissionTransfer`]: mission, geofence and rally upload/download.
//! * [`ParameterService`]: parameter reads and writes.
//! * [`CommandService`]: arm, disarm, takeoff and flight modes.
//! * [`Exchange`] / [`Matcher`]: single-flight request/response waits.
//! * [`SessionConfig`]: deadlines and identities, from code or environment.
//! * [`SdkError`]: unified error type for all SDK operations.
//!
//! Builders from [`gcslink_models`] are re-exported for convenience.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use gcslink_sdk::{SessionConfig, VehicleSession, Waypoint};
//!
//! # async fn run() -> Result<(), gcslink_sdk::SdkError> {
//! let session = VehicleSession::new(SessionConfig::from_env());
//! session.connect("udpin:0.0.0.0:14550").await?;
//!
//! session
//!     .upload_mission(&[
//!         Waypoint::new(47.0, 8.0, 50.0),
//!         Waypoint::new(47.001, 8.001, 50.0),
//!         Waypoint::new(47.002, 8.002, 50.0),
//!     ])
//!     .await?;
//!
//! let mut telemetry = session.subscribe_telemetry();
//! while telemetry.changed().await.is_ok() {
//!     println!("{:?}", telemetry.borrow().current_mission_point);
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod mission;
pub mod param;
pub mod router;
pub mod session;
pub mod transport;
pub mod waiter;

pub use command::{CommandService, ModeSelector};
pub use config::{ArmConfirmation, SessionConfig};
pub use endpoint::Endpoint;
pub use error::SdkError;
pub use mission::{MissionTransfer, TransferState};
pub use param::ParameterService;
pub use router::RouterState;
pub use session::{Target, VehicleSession};
pub use transport::{LoopbackPeer, Transport};
pub use waiter::{Exchange, Matcher};

// Re-export the model types callers pass in and get back.
pub use gcslink_models::{
    FinalLeg, MissionBuilder, MissionItem, MissionType, ParamId, ParamValue, Telemetry,
    TelemetryField, TelemetryValue, Waypoint,
};
