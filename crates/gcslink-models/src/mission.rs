//! Mission, geofence and rally items.
//!
//! A [`MissionItem`] is the wire-independent form of `MISSION_ITEM_INT`:
//! latitude and longitude are kept in degrees and only scaled to the
//! 1e7 fixed-point representation when crossing the wire.

use mavlink::common::{MavCmd, MavFrame, MavMissionType, MISSION_ITEM_INT_DATA};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Scale between degrees and the integer lat/lon wire fields.
pub const DEGREES_E7: f64 = 1e7;

/// Convert degrees to the 1e7 fixed-point wire form, rounding to nearest.
#[allow(clippy::cast_possible_truncation)]
pub fn degrees_to_e7(degrees: f64) -> i32 {
    (degrees * DEGREES_E7).round() as i32
}

/// Convert a 1e7 fixed-point wire value back to degrees.
pub fn e7_to_degrees(raw: i32) -> f64 {
    f64::from(raw) / DEGREES_E7
}

// ---------------------------------------------------------------------------
// MissionType
// ---------------------------------------------------------------------------

/// The three parallel item stores kept by a vehicle.
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MissionType {
    /// Navigation waypoints.
    Mission,
    /// Geofence vertices.
    Fence,
    /// Rally points.
    Rally,
}

impl From<MissionType> for MavMissionType {
    fn from(value: MissionType) -> Self {
        match value {
            MissionType::Mission => MavMissionType::MAV_MISSION_TYPE_MISSION,
            MissionType::Fence => MavMissionType::MAV_MISSION_TYPE_FENCE,
            MissionType::Rally => MavMissionType::MAV_MISSION_TYPE_RALLY,
        }
    }
}

impl TryFrom<MavMissionType> for MissionType {
    type Error = ModelError;

    fn try_from(value: MavMissionType) -> Result<Self, Self::Error> {
        match value {
            MavMissionType::MAV_MISSION_TYPE_MISSION => Ok(MissionType::Mission),
            MavMissionType::MAV_MISSION_TYPE_FENCE => Ok(MissionType::Fence),
            MavMissionType::MAV_MISSION_TYPE_RALLY => Ok(MissionType::Rally),
            other => Err(ModelError::UnsupportedMissionType {
                value: format!("{other:?}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MissionItem
// ---------------------------------------------------------------------------

/// One waypoint, fence vertex or rally point.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MissionItem {
    /// Zero-based position in the list.
    pub seq: u16,
    /// Coordinate frame of `x`, `y` and `z`.
    pub frame: MavFrame,
    /// Command executed at this item.
    pub command: MavCmd,
    /// Whether this is the active item.
    pub current: bool,
    /// Continue to the next item once this one completes.
    pub autocontinue: bool,
    /// Command parameter 1.
    pub param1: f32,
    /// Command parameter 2.
    pub param2: f32,
    /// Command parameter 3.
    pub param3: f32,
    /// Command parameter 4.
    pub param4: f32,
    /// Latitude in degrees.
    pub x: f64,
    /// Longitude in degrees.
    pub y: f64,
    /// Altitude in metres, relative to `frame`.
    pub z: f32,
}

impl MissionItem {
    /// Build the `MISSION_ITEM_INT` payload addressed to `target`.
    pub fn to_wire(
        &self,
        target_system: u8,
        target_component: u8,
        mission_type: MissionType,
    ) -> MISSION_ITEM_INT_DATA {
        MISSION_ITEM_INT_DATA {
            param1: self.param1,
            param2: self.param2,
            param3: self.param3,
            param4: self.param4,
            x: degrees_to_e7(self.x),
            y: degrees_to_e7(self.y),
            z: self.z,
            seq: self.seq,
            command: self.command,
            target_system,
            target_component,
            frame: self.frame,
            current: u8::from(self.current),
            autocontinue: u8::from(self.autocontinue),
            mission_type: mission_type.into(),
            ..Default::default()
        }
    }

    /// Decode a received `MISSION_ITEM_INT` payload.
    pub fn from_wire(data: &MISSION_ITEM_INT_DATA) -> Self {
        Self {
            seq: data.seq,
            frame: data.frame,
            command: data.command,
            current: data.current != 0,
            autocontinue: data.autocontinue != 0,
            param1: data.param1,
            param2: data.param2,
            param3: data.param3,
            param4: data.param4,
            x: e7_to_degrees(data.x),
            y: e7_to_degrees(data.y),
            z: data.z,
        }
    }

    /// Whether `other` describes the same item, with lat/lon compared at
    /// wire resolution.
    pub fn same_on_wire(&self, other: &Self) -> bool {
        degrees_to_e7(self.x) == degrees_to_e7(other.x)
            && degrees_to_e7(self.y) == degrees_to_e7(other.y)
            && Self { x: 0.0, y: 0.0, ..self.clone() } == Self { x: 0.0, y: 0.0, ..other.clone() }
    }
}

// ---------------------------------------------------------------------------
// Waypoint
// ---------------------------------------------------------------------------

/// Caller-facing position used to synthesize mission, fence and rally items.
///
/// Only `lat` and `lon` are required when read from JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Waypoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Altitude in metres above home.
    #[serde(default)]
    pub alt: f32,
    /// Seconds to hold at the waypoint.
    #[serde(default)]
    pub hold_time: f32,
    /// Radius in metres within which the waypoint counts as reached.
    #[serde(default)]
    pub acceptance_radius: f32,
    /// Pass-through radius in metres (0 flies through).
    #[serde(default)]
    pub pass_through: f32,
    /// Desired yaw angle at the waypoint in degrees.
    #[serde(default)]
    pub yaw: f32,
}

impl Waypoint {
    /// A waypoint with zeroed hold, acceptance, pass-through and yaw.
    pub fn new(lat: f64, lon: f64, alt: f32) -> Self {
        Self {
            lat,
            lon,
            alt,
            hold_time: 0.0,
            acceptance_radius: 0.0,
            pass_through: 0.0,
            yaw: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
