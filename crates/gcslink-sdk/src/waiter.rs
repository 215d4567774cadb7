//! Request/response correlation.
//!
//! Replies are picked out of the shared inbound stream by a [`Matcher`]:
//! the expected message kind plus the key that ties a reply to its request
//! (sequence number, mission type, parameter name, command).
//!
//! An [`Exchange`] is one request/response interaction. It holds the
//! session's single-flight token for its whole lifetime and owns a fresh
//! subscription to the inbound queue, so two exchanges never compete for
//! the same reply and messages that arrived before the exchange began are
//! never matched.

use std::fmt;
use std::time::Duration;

use gcslink_models::{Inbound, MessageKind, MissionType, ParamId, VehicleMessage};
use mavlink::common::MavCmd;
use tokio::sync::{broadcast, MutexGuard};
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::error::SdkError;

// ------------------------------------------------------------------
// Matcher
// ------------------------------------------------------------------

/// Description of an awaited reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Any autopilot heartbeat.
    Heartbeat,
    /// Echo of the named parameter.
    ParamValue {
        /// Parameter being read or written.
        id: ParamId,
    },
    /// Vehicle asking for item `seq` of an upload.
    MissionRequest {
        /// Requested sequence number.
        seq: u16,
        /// Store being uploaded.
        mission_type: MissionType,
    },
    /// Item count at the start of a download.
    MissionCount {
        /// Store being downloaded.
        mission_type: MissionType,
    },
    /// Item `seq` of a download.
    MissionItem {
        /// Expected sequence number.
        seq: u16,
        /// Store being downloaded.
        mission_type: MissionType,
    },
    /// Final ack of an upload.
    MissionAck {
        /// Store being uploaded.
        mission_type: MissionType,
    },
    /// Ack of a `COMMAND_LONG`.
    CommandAck {
        /// Command sent.
        command: MavCmd,
    },
}

impl Matcher {
    /// Kind of message this matcher accepts.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Heartbeat => MessageKind::Heartbeat,
            Self::ParamValue { .. } => MessageKind::ParamValue,
            Self::MissionRequest { .. } => MessageKind::MissionRequest,
            Self::MissionCount { .. } => MessageKind::MissionCount,
            Self::MissionItem { .. } => MessageKind::MissionItemInt,
            Self::MissionAck { .. } => MessageKind::MissionAck,
            Self::CommandAck { .. } => MessageKind::CommandAck,
        }
    }

    /// Whether `message` is the awaited reply.
    pub fn matches(&self, message: &VehicleMessage) -> bool {
        match (self, message) {
            (Self::Heartbeat, VehicleMessage::Heartbeat(hb)) => hb.is_autopilot(),
            (Self::ParamValue { id }, VehicleMessage::ParamValue(value)) => value.id == *id,
            (
                Self::MissionRequest { seq, mission_type },
                VehicleMessage::MissionRequest(req),
            ) => req.seq == *seq && req.mission_type == *mission_type,
            (Self::MissionCount { mission_type }, VehicleMessage::MissionCount(count)) => {
                count.mission_type == *mission_type
            }
            (Self::MissionItem { seq, mission_type }, VehicleMessage::MissionItem(msg)) => {
                msg.item.seq == *seq && msg.mission_type == *mission_type
            }
            (Self::MissionAck { mission_type }, VehicleMessage::MissionAck(ack)) => {
                ack.mission_type == *mission_type
            }
            (Self::CommandAck { command }, VehicleMessage::CommandAck(ack)) => {
                ack.command == *command
            }
            _ => false,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        match self {
            Self::Heartbeat => Ok(()),
            Self::ParamValue { id } => write!(f, " {id}"),
            Self::MissionRequest { seq, mission_type } | Self::MissionItem { seq, mission_type } => {
                write!(f, " seq {seq} ({mission_type})")
            }
            Self::MissionCount { mission_type } | Self::MissionAck { mission_type } => {
                write!(f, " ({mission_type})")
            }
            Self::CommandAck { command } => write!(f, " {command:?}"),
        }
    }
}

// ------------------------------------------------------------------
// Exchange
// ------------------------------------------------------------------

/// One request/response interaction with the vehicle.
///
/// Obtained from [`VehicleSession::exchange`](crate::VehicleSession::exchange).
/// Dropping it releases the single-flight token.
pub struct Exchange<'a> {
    _token: MutexGuard<'a, ()>,
    inbound: broadcast::Receiver<Inbound>,
}

impl<'a> Exchange<'a> {
    pub(crate) fn new(token: MutexGuard<'a, ()>, inbound: broadcast::Receiver<Inbound>) -> Self {
        Self {
            _token: token,
            inbound,
        }
    }

    /// Return the first message accepted by `matcher` within `timeout`.
    ///
    /// Every other message is discarded; the router has already folded it
    /// into telemetry.
    pub async fn wait_for(
        &mut self,
        matcher: &Matcher,
        timeout: Duration,
    ) -> Result<VehicleMessage, SdkError> {
        let deadline = Instant::now() + timeout;
        loop {
            let received = tokio::time::timeout_at(deadline, self.inbound.recv()).await;
            match received {
                Err(_) => {
                    return Err(SdkError::Timeout {
                        expected: matcher.to_string(),
                        after: timeout,
                    })
                }
                Ok(Ok(inbound)) if matcher.matches(&inbound.message) => return Ok(inbound.message),
                Ok(Ok(inbound)) => {
                    trace!(kind = %inbound.message.kind(), awaiting = %matcher, "discarded");
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(skipped, awaiting = %matcher, "inbound queue overran, messages dropped");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return Err(SdkError::NotConnected),
            }
        }
    }
}
