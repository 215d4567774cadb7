//! Live telemetry snapshot.
//!
//! [`Telemetry`] holds the last known value of every field the ground side
//! displays. Fields start out `None` and are filled in as the matching
//! messages arrive; [`Telemetry::apply`] holds the update rules.

use std::fmt;

use chrono::{DateTime, Utc};
use mavlink::common::{GpsFixType, MavAutopilot, MavType};
use serde::{Deserialize, Serialize};

use crate::message::{Inbound, VehicleMessage};
use crate::mission::{e7_to_degrees, MissionType};
use crate::mode::VehicleFamily;

/// Heading value meaning "unknown".
const HEADING_UNKNOWN: u16 = u16::MAX;

// ---------------------------------------------------------------------------
// VehicleIdentity
// ---------------------------------------------------------------------------

/// Who the autopilot on the other end of the link is.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VehicleIdentity {
    /// MAVLink system id.
    pub system_id: u8,
    /// MAVLink component id.
    pub component_id: u8,
    /// Autopilot firmware.
    pub autopilot: MavAutopilot,
    /// Airframe type.
    pub mav_type: MavType,
}

impl VehicleIdentity {
    /// Mode table family, when the vehicle runs ArduPilot.
    pub fn family(&self) -> Option<VehicleFamily> {
        VehicleFamily::from_heartbeat(self.autopilot, self.mav_type)
    }
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// Snapshot of the vehicle state as last reported.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    /// Flight mode name.
    pub mode: Option<String>,
    /// Motors armed.
    pub armed: Option<bool>,
    /// Roll in radians.
    pub roll: Option<f32>,
    /// Pitch in radians.
    pub pitch: Option<f32>,
    /// Yaw in radians.
    pub yaw: Option<f32>,
    /// Latitude in degrees.
    pub lat: Option<f64>,
    /// Longitude in degrees.
    pub lon: Option<f64>,
    /// Altitude above home in metres.
    pub alt: Option<f64>,
    /// Heading in degrees.
    pub heading: Option<f64>,
    /// Battery voltage in volts.
    pub battery_voltage: Option<f64>,
    /// Battery current in amperes.
    pub battery_current: Option<f64>,
    /// Remaining battery in percent.
    pub battery_remaining: Option<i8>,
    /// GNSS fix quality.
    pub gps_fix_type: Option<GpsFixType>,
    /// Satellites in view.
    pub gps_satellites_visible: Option<u8>,
    /// Sequence number of the active mission item.
    pub current_mission_point: Option<u16>,
    /// Number of items in the mission store.
    pub total_mission_points: Option<u16>,
    /// Identity of the autopilot, from its heartbeat.
    pub vehicle: Option<VehicleIdentity>,
    /// When the last consumed message arrived.
    pub last_update: Option<DateTime<Utc>>,
}

impl Telemetry {
    /// Fold one inbound message into the snapshot.
    ///
    /// Heartbeats from non-autopilot senders (other ground stations,
    /// gimbals, companions) are ignored so they cannot overwrite the mode.
    pub fn apply(&mut self, inbound: &Inbound) {
        match &inbound.message {
            VehicleMessage::Heartbeat(hb) if hb.is_autopilot() => {
                self.mode = Some(hb.mode());
                self.armed = Some(hb.armed());
                self.vehicle = Some(VehicleIdentity {
                    system_id: inbound.system_id,
                    component_id: inbound.component_id,
                    autopilot: hb.autopilot,
                    mav_type: hb.mav_type,
                });
            }
            VehicleMessage::Attitude(att) => {
                self.roll = Some(att.roll);
                self.pitch = Some(att.pitch);
                self.yaw = Some(att.yaw);
            }
            VehicleMessage::GlobalPosition(pos) => {
                self.lat = Some(e7_to_degrees(pos.lat));
                self.lon = Some(e7_to_degrees(pos.lon));
                self.alt = Some(f64::from(pos.relative_alt) / 1000.0);
                self.heading = Some(if pos.hdg == HEADING_UNKNOWN {
                    0.0
                } else {
                    f64::from(pos.hdg) / 100.0
                });
            }
            VehicleMessage::BatteryStatus(bat) => {
                self.battery_voltage = (bat.voltage_mv > 0 && bat.voltage_mv != u16::MAX)
                    .then(|| f64::from(bat.voltage_mv) / 1000.0);
                self.battery_current =
                    (bat.current_ca > -1).then(|| f64::from(bat.current_ca) / 100.0);
                self.battery_remaining = (bat.remaining > -1).then_some(bat.remaining);
            }
            VehicleMessage::GpsRaw(gps) => {
                self.gps_fix_type = Some(gps.fix_type);
                self.gps_satellites_visible = Some(gps.satellites_visible);
            }
            VehicleMessage::MissionCurrent(seq) => {
                self.current_mission_point = Some(*seq);
            }
            VehicleMessage::MissionCount(count) if count.mission_type == MissionType::Mission => {
                self.total_mission_points = Some(count.count);
            }
            _ => {}
        }
    }

    /// Whether a global position has been reported.
    pub fn has_position(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }

    /// Look up one field by name.
    pub fn get(&self, field: TelemetryField) -> Option<TelemetryValue> {
        use TelemetryValue::{Bool, Float, Int, Text};
        match field {
            TelemetryField::Mode => self.mode.clone().map(Text),
            TelemetryField::Armed => self.armed.map(Bool),
            TelemetryField::Roll => self.roll.map(|v| Float(f64::from(v))),
            TelemetryField::Pitch => self.pitch.map(|v| Float(f64::from(v))),
            TelemetryField::Yaw => self.yaw.map(|v| Float(f64::from(v))),
            TelemetryField::Lat => self.lat.map(Float),
            TelemetryField::Lon => self.lon.map(Float),
            TelemetryField::Alt => self.alt.map(Float),
            TelemetryField::Heading => self.heading.map(Float),
            TelemetryField::BatteryVoltage => self.battery_voltage.map(Float),
            TelemetryField::BatteryCurrent => self.battery_current.map(Float),
            TelemetryField::BatteryRemaining => self.battery_remaining.map(|v| Int(i64::from(v))),
            TelemetryField::GpsFixType => self.gps_fix_type.map(|v| Int(v as i64)),
            TelemetryField::GpsSatellitesVisible => {
                self.gps_satellites_visible.map(|v| Int(i64::from(v)))
            }
            TelemetryField::CurrentMissionPoint => {
                self.current_mission_point.map(|v| Int(i64::from(v)))
            }
            TelemetryField::TotalMissionPoints => {
                self.total_mission_points.map(|v| Int(i64::from(v)))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

/// Name of a snapshot field.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TelemetryField {
    /// `mode`
    Mode,
    /// `armed`
    Armed,
    /// `roll`
    Roll,
    /// `pitch`
    Pitch,
    /// `yaw`
    Yaw,
    /// `lat`
    Lat,
    /// `lon`
    Lon,
    /// `alt`
    Alt,
    /// `heading`
    Heading,
    /// `battery_voltage`
    BatteryVoltage,
    /// `battery_current`
    BatteryCurrent,
    /// `battery_remaining`
    BatteryRemaining,
    /// `gps_fix_type`
    GpsFixType,
    /// `gps_satellites_visible`
    GpsSatellitesVisible,
    /// `current_mission_point`
    CurrentMissionPoint,
    /// `total_mission_points`
    TotalMissionPoints,
}

/// A field value of any snapshot type.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryValue {
    /// Text field.
    Text(String),
    /// Flag field.
    Bool(bool),
    /// Real-valued field.
    Float(f64),
    /// Integer field.
    Int(i64),
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => f.write_str(v),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:.6}"),
            Self::Int(v) => write!(f, "{v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
