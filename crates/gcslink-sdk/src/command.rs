//! Vehicle commands: arming, takeoff and flight modes.
//!
//! Everything here goes out as `COMMAND_LONG`. Whether a command waits for
//! confirmation depends on the command: arming follows
//! [`ArmConfirmation`], takeoff and mode changes are fire-and-forget and
//! the new state shows up in telemetry.

use std::fmt;
use std::time::Duration;

use gcslink_models::{VehicleFamily, VehicleMessage};
use mavlink::common::{MavCmd, MavMessage, MavModeFlag, MavResult, COMMAND_LONG_DATA};
use tracing::{debug, info};

use crate::config::ArmConfirmation;
use crate::error::SdkError;
use crate::session::VehicleSession;
use crate::waiter::Matcher;

/// A flight mode by name or by autopilot-specific number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSelector {
    /// Name from the vehicle's mode table, matched case-insensitively.
    Name(String),
    /// Raw `custom_mode` number, sent unchecked.
    Id(u32),
}

impl From<&str> for ModeSelector {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ModeSelector {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<u32> for ModeSelector {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for ModeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Command operations of a [`VehicleSession`].
pub struct CommandService<'a> {
    session: &'a VehicleSession,
}

impl<'a> CommandService<'a> {
    pub(crate) fn new(session: &'a VehicleSession) -> Self {
        Self { session }
    }

    // ------------------------------------------------------------------
    // Arming
    // ------------------------------------------------------------------

    /// Arm with the configured confirmation.
    pub async fn arm(&self) -> Result<(), SdkError> {
        self.arm_with(self.session.config().arm_confirmation).await
    }

    /// Disarm with the configured confirmation.
    pub async fn disarm(&self) -> Result<(), SdkError> {
        self.disarm_with(self.session.config().arm_confirmation).await
    }

    /// Arm, confirming as `confirmation` says.
    pub async fn arm_with(&self, confirmation: ArmConfirmation) -> Result<(), SdkError> {
        self.set_armed(true, confirmation).await
    }

    /// Disarm, confirming as `confirmation` says.
    pub async fn disarm_with(&self, confirmation: ArmConfirmation) -> Result<(), SdkError> {
        self.set_armed(false, confirmation).await
    }

    async fn set_armed(&self, armed: bool, confirmation: ArmConfirmation) -> Result<(), SdkError> {
        let command = MavCmd::MAV_CMD_COMPONENT_ARM_DISARM;
        let params = [if armed { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let timeout = self.session.config().command_timeout;

        match confirmation {
            ArmConfirmation::None => self.command_long(command, params).await?,
            ArmConfirmation::CommandAck => {
                self.command_long_acked(command, params, timeout).await?;
            }
            ArmConfirmation::ArmedState => {
                let mut telemetry = self.session.subscribe_telemetry();
                self.command_long(command, params).await?;
                let expected = if armed { "armed heartbeat" } else { "disarmed heartbeat" };
                tokio::time::timeout(timeout, telemetry.wait_for(|t| t.armed == Some(armed)))
                    .await
                    .map_err(|_| SdkError::Timeout {
                        expected: expected.into(),
                        after: timeout,
                    })?
                    .map_err(|_| SdkError::NotConnected)?;
            }
        }
        info!(armed, ?confirmation, "arm state requested");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Flight
    // ------------------------------------------------------------------

    /// Take off to `altitude` metres above the current position.
    ///
    /// Fails with [`SdkError::NoFix`] until a position has been reported.
    pub async fn takeoff(&self, altitude: f32) -> Result<(), SdkError> {
        let telemetry = self.session.telemetry();
        let (Some(lat), Some(lon)) = (telemetry.lat, telemetry.lon) else {
            return Err(SdkError::NoFix);
        };
        // COMMAND_LONG params are f32; sub-metre precision loss is accepted.
        #[allow(clippy::cast_possible_truncation)]
        let params = [0.0, 0.0, 0.0, 0.0, lat as f32, lon as f32, altitude];
        self.command_long(MavCmd::MAV_CMD_NAV_TAKEOFF, params).await?;
        info!(lat, lon, altitude, "takeoff requested");
        Ok(())
    }

    /// Switch flight mode and return the `custom_mode` number sent.
    pub async fn set_mode(&self, mode: impl Into<ModeSelector>) -> Result<u32, SdkError> {
        let mode = mode.into();
        let id = match &mode {
            ModeSelector::Id(id) => *id,
            ModeSelector::Name(name) => self
                .family()
                .and_then(|family| family.mode_id(name))
                .ok_or_else(|| SdkError::UnknownMode {
                    name: name.clone(),
                    known: self.available_modes(),
                })?,
        };

        #[allow(clippy::cast_precision_loss)]
        let params = [
            f32::from(MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED.bits()),
            id as f32,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
        ];
        self.command_long(MavCmd::MAV_CMD_DO_SET_MODE, params).await?;
        info!(%mode, custom_mode = id, "mode change requested");
        Ok(id)
    }

    /// Mode names of the connected vehicle, empty if its family is unknown.
    pub fn available_modes(&self) -> Vec<String> {
        self.family()
            .map(|family| {
                family
                    .mode_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn family(&self) -> Option<VehicleFamily> {
        self.session
            .telemetry()
            .vehicle
            .and_then(|vehicle| vehicle.family())
    }

    // ------------------------------------------------------------------
    // COMMAND_LONG
    // ------------------------------------------------------------------

    /// Send `command` without waiting for an ack.
    pub async fn command_long(&self, command: MavCmd, params: [f32; 7]) -> Result<(), SdkError> {
        let target = self.session.target().await?;
        let [param1, param2, param3, param4, param5, param6, param7] = params;
        debug!(?command, ?params, "sending command");
        self.session
            .send(&MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
                param1,
                param2,
                param3,
                param4,
                param5,
                param6,
                param7,
                command,
                target_system: target.system_id,
                target_component: target.component_id,
                confirmation: 0,
            }))
            .await
    }

    /// Send `command` and wait up to `timeout` for an accepted ack.
    pub async fn command_long_acked(
        &self,
        command: MavCmd,
        params: [f32; 7],
        timeout: Duration,
    ) -> Result<(), SdkError> {
        let mut exchange = self.session.exchange().await;
        self.command_long(command, params).await?;

        let matcher = Matcher::CommandAck { command };
        match exchange.wait_for(&matcher, timeout).await? {
            VehicleMessage::CommandAck(ack) if ack.result == MavResult::MAV_RESULT_ACCEPTED => {
                Ok(())
            }
            VehicleMessage::CommandAck(ack) => Err(SdkError::CommandRejected {
                command,
                result: ack.result,
            }),
            other => Err(SdkError::Unexpected {
                expected: matcher.to_string(),
                received: other.kind(),
            }),
        }
    }
}
