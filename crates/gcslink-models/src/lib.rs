#![deny(missing_docs)]

//! # gcslink Models
//!
//! Core data types shared by the gcslink ground-station crates.
//!
//! ## Message flow
//!
//! ```text
//! UDP datagram
//! └── frame::decode_datagram ──► (MavHeader, MavMessage)*
//!     └── Inbound::from_frame ──► Inbound { system_id, component_id, VehicleMessage }
//!         ├── Telemetry::apply        (snapshot update)
//!         └── request/response waits  (mission, parameter, command)
//! ```
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`message`] | `VehicleMessage`, `MessageKind`, `Inbound` and typed payloads |
//! | [`mission`] | `MissionItem`, `MissionType`, `Waypoint`, fixed-point helpers |
//! | [`mission_builder`] | `MissionBuilder` and final-leg command derivation |
//! | [`param`] | `ParamId`, `ParamValue` |
//! | [`mode`] | ArduPilot flight-mode tables |
//! | [`telemetry`] | `Telemetry` snapshot and its update rules |
//! | [`frame`] | MAVLink v2 encode / datagram decode |

pub mod error;
pub mod frame;
pub mod message;
pub mod mission;
pub mod mission_builder;
pub mod mode;
pub mod param;
pub mod telemetry;

// Re-export all public types at crate root for convenience.
pub use error::*;
pub use message::*;
pub use mission::*;
pub use mission_builder::*;
pub use mode::*;
pub use param::*;
pub use telemetry::*;

// Downstream crates can name MAVLink types without a direct dependency.
pub use mavlink;
