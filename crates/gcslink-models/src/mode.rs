//! Flight-mode names for ArduPilot vehicles.
//!
//! ArduPilot reports its mode as a vehicle-specific `custom_mode` number in
//! every heartbeat. The tables below map those numbers to the names used on
//! ground stations, per vehicle family.

use mavlink::common::{MavAutopilot, MavModeFlag, MavType};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// VehicleFamily
// ---------------------------------------------------------------------------

/// ArduPilot firmware family, which selects the mode table.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum VehicleFamily {
    /// Multirotors and helicopters.
    Copter,
    /// Fixed-wing aircraft.
    Plane,
    /// Ground rovers and boats.
    Rover,
    /// Submarines.
    Sub,
}

impl VehicleFamily {
    /// Derive the family from heartbeat fields, `None` for non-ArduPilot
    /// autopilots and unknown frame types.
    pub fn from_heartbeat(autopilot: MavAutopilot, mav_type: MavType) -> Option<Self> {
        if autopilot != MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA {
            return None;
        }
        match mav_type {
            MavType::MAV_TYPE_QUADROTOR
            | MavType::MAV_TYPE_HEXAROTOR
            | MavType::MAV_TYPE_OCTOROTOR
            | MavType::MAV_TYPE_TRICOPTER
            | MavType::MAV_TYPE_HELICOPTER
            | MavType::MAV_TYPE_COAXIAL => Some(Self::Copter),
            MavType::MAV_TYPE_FIXED_WING => Some(Self::Plane),
            MavType::MAV_TYPE_GROUND_ROVER | MavType::MAV_TYPE_SURFACE_BOAT => Some(Self::Rover),
            MavType::MAV_TYPE_SUBMARINE => Some(Self::Sub),
            _ => None,
        }
    }

    /// `(custom_mode, name)` pairs for this family, ordered by number.
    pub fn modes(self) -> &'static [(u32, &'static str)] {
        match self {
            Self::Copter => COPTER_MODES,
            Self::Plane => PLANE_MODES,
            Self::Rover => ROVER_MODES,
            Self::Sub => SUB_MODES,
        }
    }

    /// Look up a mode number by name (case-insensitive).
    pub fn mode_id(self, name: &str) -> Option<u32> {
        self.modes()
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
    }

    /// Look up a mode name by number.
    pub fn mode_name(self, id: u32) -> Option<&'static str> {
        self.modes().iter().find(|(i, _)| *i == id).map(|(_, n)| *n)
    }

    /// All mode names, in table order.
    pub fn mode_names(self) -> Vec<&'static str> {
        self.modes().iter().map(|(_, n)| *n).collect()
    }
}

/// Display name for the mode reported in a heartbeat.
///
/// Falls back to `Mode(0x..)` with the raw custom mode when the autopilot
/// is not ArduPilot, custom modes are not enabled, or the number is not in
/// the table.
pub fn mode_string(
    autopilot: MavAutopilot,
    mav_type: MavType,
    base_mode: MavModeFlag,
    custom_mode: u32,
) -> String {
    if base_mode.contains(MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED) {
        if let Some(name) = VehicleFamily::from_heartbeat(autopilot, mav_type)
            .and_then(|family| family.mode_name(custom_mode))
        {
            return name.to_string();
        }
    }
    format!("Mode({custom_mode:#010x})")
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

const COPTER_MODES: &[(u32, &str)] = &[
    (0, "STABILIZE"),
    (1, "ACRO"),
    (2, "ALT_HOLD"),
    (3, "AUTO"),
    (4, "GUIDED"),
    (5, "LOITER"),
    (6, "RTL"),
    (7, "CIRCLE"),
    (9, "LAND"),
    (11, "DRIFT"),
    (13, "SPORT"),
    (14, "FLIP"),
    (15, "AUTOTUNE"),
    (16, "POSHOLD"),
    (17, "BRAKE"),
    (18, "THROW"),
    (19, "AVOID_ADSB"),
    (20, "GUIDED_NOGPS"),
    (21, "SMART_RTL"),
    (22, "FLOWHOLD"),
    (23, "FOLLOW"),
    (24, "ZIGZAG"),
    (25, "SYSTEMID"),
    (26, "AUTOROTATE"),
    (27, "AUTO_RTL"),
];

const PLANE_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "CIRCLE"),
    (2, "STABILIZE"),
    (3, "TRAINING"),
    (4, "ACRO"),
    (5, "FBWA"),
    (6, "FBWB"),
    (7, "CRUISE"),
    (8, "AUTOTUNE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "LOITER"),
    (13, "TAKEOFF"),
    (14, "AVOID_ADSB"),
    (15, "GUIDED"),
    (16, "INITIALISING"),
    (17, "QSTABILIZE"),
    (18, "QHOVER"),
    (19, "QLOITER"),
    (20, "QLAND"),
    (21, "QRTL"),
    (22, "QAUTOTUNE"),
    (23, "QACRO"),
    (24, "THERMAL"),
];

const ROVER_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "ACRO"),
    (2, "LEARNING"),
    (3, "STEERING"),
    (4, "HOLD"),
    (5, "LOITER"),
    (6, "FOLLOW"),
    (7, "SIMPLE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "SMART_RTL"),
    (15, "GUIDED"),
    (16, "INITIALISING"),
];

const SUB_MODES: &[(u32, &str)] = &[
    (0, "STABILIZE"),
    (1, "ACRO"),
    (2, "ALT_HOLD"),
    (3, "AUTO"),
    (4, "GUIDED"),
    (7, "CIRCLE"),
    (9, "SURFACE"),
    (16, "POSHOLD"),
    (19, "MANUAL"),
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    const APM: MavAutopilot = MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA;

    #[test]
    fn family_from_heartbeat() {
        assert_eq!(
            VehicleFamily::from_heartbeat(APM, MavType::MAV_TYPE_QUADROTOR),
            Some(VehicleFamily::Copter)
        );
        assert_eq!(
            VehicleFamily::from_heartbeat(APM, MavType::MAV_TYPE_SURFACE_BOAT),
            Some(VehicleFamily::Rover)
        );
        assert_eq!(
            VehicleFamily::from_heartbeat(MavAutopilot::MAV_AUTOPILOT_PX4, MavType::MAV_TYPE_QUADROTOR),
            None
        );
        assert_eq!(VehicleFamily::from_heartbeat(APM, MavType::MAV_TYPE_GCS), None);
    }

    #[test]
    fn tables_have_unique_ids_and_names() {
        for family in VehicleFamily::iter() {
            let modes = family.modes();
            for (i, (id, name)) in modes.iter().enumerate() {
                assert!(modes[i + 1..].iter().all(|(other, _)| other != id), "{family}: {id}");
                assert!(modes[i + 1..].iter().all(|(_, other)| other != name), "{family}: {name}");
            }
        }
    }

    #[test]
    fn lookup_both_ways() {
        assert_eq!(VehicleFamily::Copter.mode_id("guided"), Some(4));
        assert_eq!(VehicleFamily::Copter.mode_id("NONEXISTENT"), None);
        assert_eq!(VehicleFamily::Plane.mode_name(10), Some("AUTO"));
        assert_eq!(VehicleFamily::Rover.mode_name(8), None);
        assert!(VehicleFamily::Sub.mode_names().contains(&"SURFACE"));
    }

    #[test]
    fn mode_string_uses_table_when_custom_enabled() {
        let custom = MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED;
        assert_eq!(mode_string(APM, MavType::MAV_TYPE_QUADROTOR, custom, 5), "LOITER");
        assert_eq!(
            mode_string(APM, MavType::MAV_TYPE_QUADROTOR, MavModeFlag::empty(), 5),
            "Mode(0x00000005)"
        );
        assert_eq!(
            mode_string(APM, MavType::MAV_TYPE_QUADROTOR, custom, 99),
            "Mode(0x00000063)"
        );
    }
}
