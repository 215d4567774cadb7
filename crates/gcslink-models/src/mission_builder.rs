//! # Mission Builder
//!
//! Turns plain [`Waypoint`] lists into sequenced [`MissionItem`]s for each
//! of the three item stores.
//!
//! ```rust
//! use gcslink_models::{FinalLeg, MissionBuilder, Waypoint};
//! use mavlink::common::MavCmd;
//!
//! let route = [
//!     Waypoint::new(47.0, 8.0, 50.0),
//!     Waypoint::new(47.001, 8.001, 50.0),
//!     Waypoint::new(47.002, 8.002, 50.0),
//! ];
//!
//! let items = MissionBuilder::new().mission(&route);
//! assert_eq!(items[0].command, MavCmd::MAV_CMD_NAV_TAKEOFF);
//! assert_eq!(items[2].command, MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH);
//!
//! let items = MissionBuilder::new().final_leg(FinalLeg::Land).mission(&route);
//! assert_eq!(items[2].command, MavCmd::MAV_CMD_NAV_LAND);
//! ```

use mavlink::common::{MavCmd, MavFrame};
use serde::{Deserialize, Serialize};

use crate::mission::{MissionItem, MissionType, Waypoint};

// ─── Final leg ───────────────────────────────────────────────────────

/// Command given to the last waypoint of a synthesized mission.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum FinalLeg {
    /// Fly back to the launch point.
    #[default]
    #[strum(serialize = "rtl")]
    #[serde(rename = "rtl")]
    ReturnToLaunch,
    /// Land at the last waypoint's position.
    #[strum(serialize = "land")]
    #[serde(rename = "land")]
    Land,
}

impl FinalLeg {
    /// The navigation command for this leg.
    pub fn command(self) -> MavCmd {
        match self {
            FinalLeg::ReturnToLaunch => MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH,
            FinalLeg::Land => MavCmd::MAV_CMD_NAV_LAND,
        }
    }
}

/// Command for waypoint `index` of a `len`-waypoint mission.
///
/// The first waypoint is always a takeoff, so a single waypoint never
/// gets the final-leg command.
pub fn waypoint_command(index: usize, len: usize, final_leg: FinalLeg) -> MavCmd {
    if index == 0 {
        MavCmd::MAV_CMD_NAV_TAKEOFF
    } else if index + 1 == len {
        final_leg.command()
    } else {
        MavCmd::MAV_CMD_NAV_WAYPOINT
    }
}

// ─── Builder ─────────────────────────────────────────────────────────

/// Builder for mission, geofence and rally item lists.
#[derive(Debug, Clone, Default)]
pub struct MissionBuilder {
    final_leg: FinalLeg,
}

impl MissionBuilder {
    /// A builder ending missions with [`FinalLeg::ReturnToLaunch`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose the command for the last waypoint.
    pub fn final_leg(mut self, final_leg: FinalLeg) -> Self {
        self.final_leg = final_leg;
        self
    }

    /// Build items for `mission_type` from `points`.
    pub fn items(&self, mission_type: MissionType, points: &[Waypoint]) -> Vec<MissionItem> {
        match mission_type {
            MissionType::Mission => self.mission(points),
            MissionType::Fence => self.fence(points),
            MissionType::Rally => self.rally(points),
        }
    }

    /// Takeoff, intermediate waypoints, then the final leg.
    pub fn mission(&self, waypoints: &[Waypoint]) -> Vec<MissionItem> {
        waypoints
            .iter()
            .enumerate()
            .map(|(i, wp)| MissionItem {
                seq: seq(i),
                frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT,
                command: waypoint_command(i, waypoints.len(), self.final_leg),
                current: false,
                autocontinue: true,
                param1: wp.hold_time,
                param2: wp.acceptance_radius,
                param3: wp.pass_through,
                param4: wp.yaw,
                x: wp.lat,
                y: wp.lon,
                z: wp.alt,
            })
            .collect()
    }

    /// One inclusion polygon, every vertex carrying the vertex count.
    #[allow(clippy::cast_precision_loss)]
    pub fn fence(&self, vertices: &[Waypoint]) -> Vec<MissionItem> {
        let total = vertices.len() as f32;
        vertices
            .iter()
            .enumerate()
            .map(|(i, pt)| MissionItem {
                param1: total,
                ..point_item(i, pt, MavCmd::MAV_CMD_NAV_FENCE_POLYGON_VERTEX_INCLUSION)
            })
            .collect()
    }

    /// Rally points in absolute frame.
    pub fn rally(&self, points: &[Waypoint]) -> Vec<MissionItem> {
        points
            .iter()
            .enumerate()
            .map(|(i, pt)| point_item(i, pt, MavCmd::MAV_CMD_NAV_RALLY_POINT))
            .collect()
    }
}

fn point_item(index: usize, point: &Waypoint, command: MavCmd) -> MissionItem {
    MissionItem {
        seq: seq(index),
        frame: MavFrame::MAV_FRAME_GLOBAL,
        command,
        current: false,
        autocontinue: true,
        param1: 0.0,
        param2: 0.0,
        param3: 0.0,
        param4: 0.0,
        x: point.lat,
        y: point.lon,
        z: point.alt,
    }
}

fn seq(index: usize) -> u16 {
    u16::try_from(index).unwrap_or(u16::MAX)
}

// ─── Tests ───────────────────────────────────────────────────────────
