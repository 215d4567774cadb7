//! Session configuration.
//!
//! Every wait in the SDK has an explicit deadline; the defaults here are
//! the ones a ground station uses against a real autopilot. Tests shrink
//! them through the builder-style setters.

use std::time::Duration;

use gcslink_models::FinalLeg;

/// How `arm` / `disarm` decide that the command took effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArmConfirmation {
    /// Send and return immediately.
    #[default]
    None,
    /// Wait for an accepted `COMMAND_ACK`.
    CommandAck,
    /// Wait for a heartbeat reporting the requested armed state.
    ArmedState,
}

/// Tunables for a [`VehicleSession`](crate::VehicleSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long `connect` waits for the first autopilot heartbeat.
    pub heartbeat_timeout: Duration,
    /// Receive timeout of the router loop; bounds shutdown latency.
    pub poll_interval: Duration,
    /// How long `disconnect` waits for the router to stop.
    pub join_timeout: Duration,
    /// Deadline for a parameter echo.
    pub param_timeout: Duration,
    /// Deadline for each step of a mission transfer.
    pub mission_timeout: Duration,
    /// Deadline for command confirmations.
    pub command_timeout: Duration,
    /// Interval of the ground-station heartbeat; `None` disables it.
    pub gcs_heartbeat_interval: Option<Duration>,
    /// Our MAVLink system id.
    pub source_system: u8,
    /// Our MAVLink component id.
    pub source_component: u8,
    /// Capacity of the inbound message queue.
    pub queue_capacity: usize,
    /// Confirmation used by `arm` / `disarm`.
    pub arm_confirmation: ArmConfirmation,
    /// Command of the last waypoint in synthesized missions.
    pub final_leg: FinalLeg,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            join_timeout: Duration::from_secs(1),
            param_timeout: Duration::from_secs(5),
            mission_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(3),
            gcs_heartbeat_interval: Some(Duration::from_secs(1)),
            source_system: 255,
            source_component: 190,
            queue_capacity: 1024,
            arm_confirmation: ArmConfirmation::None,
            final_leg: FinalLeg::ReturnToLaunch,
        }
    }
}

impl SessionConfig {
    /// Build the configuration from environment variables.
    ///
    /// | Variable                        | Default | Description                           |
    /// |---------------------------------|---------|---------------------------------------|
    /// | `GCSLINK_HEARTBEAT_TIMEOUT_MS`  | `10000` | Connect deadline                      |
    /// | `GCSLINK_POLL_INTERVAL_MS`      | `1000`  | Router receive timeout                |
    /// | `GCSLINK_JOIN_TIMEOUT_MS`       | `1000`  | Router shutdown wait                  |
    /// | `GCSLINK_PARAM_TIMEOUT_MS`      | `5000`  | Parameter echo deadline               |
    /// | `GCSLINK_MISSION_TIMEOUT_MS`    | `5000`  | Per-step mission transfer deadline    |
    /// | `GCSLINK_COMMAND_TIMEOUT_MS`    | `3000`  | Command confirmation deadline         |
    /// | `GCSLINK_GCS_HEARTBEAT_MS`      | `1000`  | GCS heartbeat interval, `0` disables  |
    /// | `GCSLINK_SOURCE_SYSTEM`         | `255`   | Our system id                         |
    /// | `GCSLINK_SOURCE_COMPONENT`      | `190`   | Our component id                      |
    /// | `GCSLINK_FINAL_LEG`             | `rtl`   | Last mission waypoint: `rtl` or `land`|
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let millis = |key: &str, fallback: Duration| {
            parsed(key).map_or(fallback, Duration::from_millis)
        };
        let byte = |key: &str, fallback: u8| {
            parsed(key)
                .and_then(|v| u8::try_from(v).ok())
                .unwrap_or(fallback)
        };

        let gcs_heartbeat_interval = match parsed("GCSLINK_GCS_HEARTBEAT_MS") {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.gcs_heartbeat_interval,
        };

        Self {
            heartbeat_timeout: millis("GCSLINK_HEARTBEAT_TIMEOUT_MS", defaults.heartbeat_timeout),
            poll_interval: millis("GCSLINK_POLL_INTERVAL_MS", defaults.poll_interval),
            join_timeout: millis("GCSLINK_JOIN_TIMEOUT_MS", defaults.join_timeout),
            param_timeout: millis("GCSLINK_PARAM_TIMEOUT_MS", defaults.param_timeout),
            mission_timeout: millis("GCSLINK_MISSION_TIMEOUT_MS", defaults.mission_timeout),
            command_timeout: millis("GCSLINK_COMMAND_TIMEOUT_MS", defaults.command_timeout),
            gcs_heartbeat_interval,
            source_system: byte("GCSLINK_SOURCE_SYSTEM", defaults.source_system),
            source_component: byte("GCSLINK_SOURCE_COMPONENT", defaults.source_component),
            final_leg: lookup("GCSLINK_FINAL_LEG")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.final_leg),
            ..defaults
        }
    }

    /// Set every wait deadline at once.
    pub fn with_timeouts(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self.param_timeout = timeout;
        self.mission_timeout = timeout;
        self.command_timeout = timeout;
        self
    }

    /// Set the router receive timeout.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how `arm` / `disarm` confirm.
    pub fn with_arm_confirmation(mut self, confirmation: ArmConfirmation) -> Self {
        self.arm_confirmation = confirmation;
        self
    }

    /// Set the final-leg command for synthesized missions.
    pub fn with_final_leg(mut self, final_leg: FinalLeg) -> Self {
        self.final_leg = final_leg;
        self
    }
}
