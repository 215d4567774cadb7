//! Parameter reads and writes.

use std::time::Duration;

use gcslink_models::{ParamId, ParamValue, VehicleMessage};
use mavlink::common::{MavMessage, MavParamType, PARAM_REQUEST_READ_DATA, PARAM_SET_DATA};
use tracing::info;

use crate::error::SdkError;
use crate::session::VehicleSession;
use crate::waiter::Matcher;

/// Parameter operations of a [`VehicleSession`].
pub struct ParameterService<'a> {
    session: &'a VehicleSession,
}

impl<'a> ParameterService<'a> {
    pub(crate) fn new(session: &'a VehicleSession) -> Self {
        Self { session }
    }

    /// Read `id` with the configured deadline.
    pub async fn get(&self, id: &ParamId) -> Result<ParamValue, SdkError> {
        self.get_with(id, self.session.config().param_timeout).await
    }

    /// Write `id` as a 32-bit float and return the value the vehicle echoed.
    ///
    /// The echo may differ from `value` if the vehicle clamped it.
    pub async fn set(&self, id: &ParamId, value: f32) -> Result<f32, SdkError> {
        let echoed = self
            .set_with(
                id,
                value,
                MavParamType::MAV_PARAM_TYPE_REAL32,
                self.session.config().param_timeout,
            )
            .await?;
        Ok(echoed.value)
    }

    /// Read `id`, waiting at most `timeout` for the echo.
    pub async fn get_with(&self, id: &ParamId, timeout: Duration) -> Result<ParamValue, SdkError> {
        let target = self.session.target().await?;
        let mut exchange = self.session.exchange().await;
        self.session
            .send(&MavMessage::PARAM_REQUEST_READ(PARAM_REQUEST_READ_DATA {
                // -1 selects by name.
                param_index: -1,
                target_system: target.system_id,
                target_component: target.component_id,
                param_id: id.to_wire(),
            }))
            .await?;

        let matcher = Matcher::ParamValue { id: id.clone() };
        let value = expect_value(exchange.wait_for(&matcher, timeout).await?)?;
        info!(param = %value.id, value = value.value, "parameter read");
        Ok(value)
    }

    /// Write `id` with an explicit wire type, waiting at most `timeout` for
    /// the echo.
    pub async fn set_with(
        &self,
        id: &ParamId,
        value: f32,
        param_type: MavParamType,
        timeout: Duration,
    ) -> Result<ParamValue, SdkError> {
        let target = self.session.target().await?;
        let mut exchange = self.session.exchange().await;
        self.session
            .send(&MavMessage::PARAM_SET(PARAM_SET_DATA {
                param_value: value,
                target_system: target.system_id,
                target_component: target.component_id,
                param_id: id.to_wire(),
                param_type,
            }))
            .await?;

        let matcher = Matcher::ParamValue { id: id.clone() };
        let echoed = expect_value(exchange.wait_for(&matcher, timeout).await?)?;
        info!(param = %echoed.id, requested = value, echoed = echoed.value, "parameter set");
        Ok(echoed)
    }
}

fn expect_value(message: VehicleMessage) -> Result<ParamValue, SdkError> {
    match message {
        VehicleMessage::ParamValue(value) => Ok(value),
        other => Err(SdkError::Unexpected {
            expected: "PARAM_VALUE".into(),
            received: other.kind(),
        }),
    }
}
