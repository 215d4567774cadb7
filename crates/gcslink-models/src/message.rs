//! Inbound vehicle messages.
//!
//! [`VehicleMessage`] is the subset of the MAVLink `common` dialect the
//! ground side consumes, decoded into typed payloads. Anything else on the
//! wire is dropped during conversion.

use mavlink::common::{
    GpsFixType, MavAutopilot, MavCmd, MavMessage, MavMissionResult, MavModeFlag, MavResult,
    MavState, MavType,
};
use mavlink::MavHeader;
use serde::{Deserialize, Serialize};

use crate::mission::{MissionItem, MissionType};
use crate::mode::mode_string;
use crate::param::{ParamId, ParamValue};

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// Discriminant of [`VehicleMessage`], displayed in wire spelling.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// `HEARTBEAT`
    Heartbeat,
    /// `ATTITUDE`
    Attitude,
    /// `GLOBAL_POSITION_INT`
    GlobalPositionInt,
    /// `BATTERY_STATUS`
    BatteryStatus,
    /// `GPS_RAW_INT`
    GpsRawInt,
    /// `MISSION_CURRENT`
    MissionCurrent,
    /// `PARAM_VALUE`
    ParamValue,
    /// `MISSION_REQUEST` or `MISSION_REQUEST_INT`
    MissionRequest,
    /// `MISSION_COUNT`
    MissionCount,
    /// `MISSION_ITEM_INT`
    MissionItemInt,
    /// `MISSION_ACK`
    MissionAck,
    /// `COMMAND_ACK`
    CommandAck,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Liveness and state of a system.
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    /// Autopilot firmware.
    pub autopilot: MavAutopilot,
    /// Vehicle or component type.
    pub mav_type: MavType,
    /// Standard mode flags.
    pub base_mode: MavModeFlag,
    /// Firmware-specific mode number.
    pub custom_mode: u32,
    /// System state.
    pub system_status: MavState,
}

impl Heartbeat {
    /// Whether the motors are armed.
    pub fn armed(&self) -> bool {
        self.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED)
    }

    /// Whether the sender is a flight controller rather than a GCS or
    /// peripheral.
    pub fn is_autopilot(&self) -> bool {
        self.autopilot != MavAutopilot::MAV_AUTOPILOT_INVALID
    }

    /// Human-readable mode name.
    pub fn mode(&self) -> String {
        mode_string(self.autopilot, self.mav_type, self.base_mode, self.custom_mode)
    }
}

/// Vehicle attitude in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    /// Roll angle.
    pub roll: f32,
    /// Pitch angle.
    pub pitch: f32,
    /// Yaw angle.
    pub yaw: f32,
}

/// Fused global position, raw wire units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalPosition {
    /// Latitude, degrees * 1e7.
    pub lat: i32,
    /// Longitude, degrees * 1e7.
    pub lon: i32,
    /// Altitude above home, millimetres.
    pub relative_alt: i32,
    /// Heading, centidegrees; `u16::MAX` when unknown.
    pub hdg: u16,
}

/// First-cell battery readings, raw wire units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    /// Voltage of the first cell entry, millivolts.
    pub voltage_mv: u16,
    /// Current, centiamperes; -1 when unknown.
    pub current_ca: i16,
    /// Remaining capacity in percent; -1 when unknown.
    pub remaining: i8,
}

/// GNSS receiver status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsRaw {
    /// Fix quality.
    pub fix_type: GpsFixType,
    /// Satellites in view.
    pub satellites_visible: u8,
}

/// Vehicle asks for one item of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissionRequest {
    /// Requested sequence number.
    pub seq: u16,
    /// Item store being transferred.
    pub mission_type: MissionType,
}

/// Number of items in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissionCount {
    /// Number of items.
    pub count: u16,
    /// Item store being transferred.
    pub mission_type: MissionType,
}

/// One item of a download.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionItemMessage {
    /// Decoded item.
    pub item: MissionItem,
    /// Item store being transferred.
    pub mission_type: MissionType,
}

/// Outcome of a mission transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionAck {
    /// Result code.
    pub result: MavMissionResult,
    /// Item store being transferred.
    pub mission_type: MissionType,
}

/// Outcome of a `COMMAND_LONG`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandAck {
    /// Command being acknowledged.
    pub command: MavCmd,
    /// Result code.
    pub result: MavResult,
}

// ---------------------------------------------------------------------------
// VehicleMessage
// ---------------------------------------------------------------------------

/// A decoded inbound message the ground side acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleMessage {
    /// `HEARTBEAT`
    Heartbeat(Heartbeat),
    /// `ATTITUDE`
    Attitude(Attitude),
    /// `GLOBAL_POSITION_INT`
    GlobalPosition(GlobalPosition),
    /// `BATTERY_STATUS`
    BatteryStatus(BatteryStatus),
    /// `GPS_RAW_INT`
    GpsRaw(GpsRaw),
    /// `MISSION_CURRENT`: sequence number of the active item.
    MissionCurrent(u16),
    /// `PARAM_VALUE`
    ParamValue(ParamValue),
    /// `MISSION_REQUEST` / `MISSION_REQUEST_INT`
    MissionRequest(MissionRequest),
    /// `MISSION_COUNT`
    MissionCount(MissionCount),
    /// `MISSION_ITEM_INT`
    MissionItem(MissionItemMessage),
    /// `MISSION_ACK`
    MissionAck(MissionAck),
    /// `COMMAND_ACK`
    CommandAck(CommandAck),
}

impl VehicleMessage {
    /// Convert a MAVLink message, `None` for kinds this crate does not
    /// consume and for mission traffic on an unsupported mission type.
    pub fn from_mav(message: &MavMessage) -> Option<Self> {
        let decoded = match message {
            MavMessage::HEARTBEAT(data) => Self::Heartbeat(Heartbeat {
                autopilot: data.autopilot,
                mav_type: data.mavtype,
                base_mode: data.base_mode,
                custom_mode: data.custom_mode,
                system_status: data.system_status,
            }),
            MavMessage::ATTITUDE(data) => Self::Attitude(Attitude {
                roll: data.roll,
                pitch: data.pitch,
                yaw: data.yaw,
            }),
            MavMessage::GLOBAL_POSITION_INT(data) => Self::GlobalPosition(GlobalPosition {
                lat: data.lat,
                lon: data.lon,
                relative_alt: data.relative_alt,
                hdg: data.hdg,
            }),
            MavMessage::BATTERY_STATUS(data) => Self::BatteryStatus(BatteryStatus {
                voltage_mv: data.voltages[0],
                current_ca: data.current_battery,
                remaining: data.battery_remaining,
            }),
            MavMessage::GPS_RAW_INT(data) => Self::GpsRaw(GpsRaw {
                fix_type: data.fix_type,
                satellites_visible: data.satellites_visible,
            }),
            MavMessage::MISSION_CURRENT(data) => Self::MissionCurrent(data.seq),
            MavMessage::PARAM_VALUE(data) => Self::ParamValue(ParamValue {
                id: ParamId::from_wire(&data.param_id),
                value: data.param_value,
                param_type: data.param_type,
                index: data.param_index,
                count: data.param_count,
            }),
            MavMessage::MISSION_REQUEST(data) => Self::MissionRequest(MissionRequest {
                seq: data.seq,
                mission_type: data.mission_type.try_into().ok()?,
            }),
            MavMessage::MISSION_REQUEST_INT(data) => Self::MissionRequest(MissionRequest {
                seq: data.seq,
                mission_type: data.mission_type.try_into().ok()?,
            }),
            MavMessage::MISSION_COUNT(data) => Self::MissionCount(MissionCount {
                count: data.count,
                mission_type: data.mission_type.try_into().ok()?,
            }),
            MavMessage::MISSION_ITEM_INT(data) => Self::MissionItem(MissionItemMessage {
                item: MissionItem::from_wire(data),
                mission_type: data.mission_type.try_into().ok()?,
            }),
            MavMessage::MISSION_ACK(data) => Self::MissionAck(MissionAck {
                result: data.mavtype,
                mission_type: data.mission_type.try_into().ok()?,
            }),
            MavMessage::COMMAND_ACK(data) => Self::CommandAck(CommandAck {
                command: data.command,
                result: data.result,
            }),
            _ => return None,
        };
        Some(decoded)
    }

    /// The message's discriminant.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Heartbeat(_) => MessageKind::Heartbeat,
            Self::Attitude(_) => MessageKind::Attitude,
            Self::GlobalPosition(_) => MessageKind::GlobalPositionInt,
            Self::BatteryStatus(_) => MessageKind::BatteryStatus,
            Self::GpsRaw(_) => MessageKind::GpsRawInt,
            Self::MissionCurrent(_) => MessageKind::MissionCurrent,
            Self::ParamValue(_) => MessageKind::ParamValue,
            Self::MissionRequest(_) => MessageKind::MissionRequest,
            Self::MissionCount(_) => MessageKind::MissionCount,
            Self::MissionItem(_) => MessageKind::MissionItemInt,
            Self::MissionAck(_) => MessageKind::MissionAck,
            Self::CommandAck(_) => MessageKind::CommandAck,
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A decoded message together with its sender.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Sending system.
    pub system_id: u8,
    /// Sending component.
    pub component_id: u8,
    /// Decoded payload.
    pub message: VehicleMessage,
}

impl Inbound {
    /// Decode a framed message, `None` if the kind is not consumed.
    pub fn from_frame(header: &MavHeader, message: &MavMessage) -> Option<Self> {
        VehicleMessage::from_mav(message).map(|message| Self {
            system_id: header.system_id,
            component_id: header.component_id,
            message,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
