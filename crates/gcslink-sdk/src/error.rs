//! SDK error types.
//!
//! [`SdkError`] is the single error type returned by every fallible
//! operation in the SDK. Nothing is retried behind the caller's back: a
//! timeout or rejection is reported as-is and the caller decides.

use std::time::Duration;

use gcslink_models::{MessageKind, MissionType, ModelError};
use mavlink::common::{MavCmd, MavMissionResult, MavResult};

/// Error type for all SDK operations.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// The endpoint string could not be parsed.
    #[error("invalid endpoint \"{value}\": {reason}")]
    Endpoint {
        /// The value that failed to parse.
        value: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// No autopilot heartbeat arrived while connecting.
    #[error("no heartbeat from {endpoint} within {timeout:?}")]
    Connect {
        /// Endpoint being connected.
        endpoint: String,
        /// How long we waited.
        timeout: Duration,
    },

    /// A reply did not arrive before its deadline.
    #[error("timed out after {after:?} waiting for {expected}")]
    Timeout {
        /// Description of the awaited message.
        expected: String,
        /// Deadline that expired.
        after: Duration,
    },

    /// A reply was accepted by its matcher but had the wrong payload type.
    #[error("expected {expected}, received {received}")]
    Unexpected {
        /// Description of the awaited message.
        expected: String,
        /// Kind that arrived instead.
        received: MessageKind,
    },

    /// The vehicle acknowledged an upload with a failure code.
    #[error("{mission_type} upload rejected by vehicle: {result:?}")]
    UploadRejected {
        /// Store being uploaded.
        mission_type: MissionType,
        /// Result code from the ack.
        result: MavMissionResult,
    },

    /// An upload stopped part way; the vehicle store may hold a partial list.
    #[error(
        "{mission_type} upload incomplete after {items_sent} of {total} items, vehicle store may be partially written: {source}"
    )]
    IncompleteUpload {
        /// Store being uploaded.
        mission_type: MissionType,
        /// Items delivered before the failure.
        items_sent: usize,
        /// Items in the upload.
        total: usize,
        /// Underlying failure.
        #[source]
        source: Box<SdkError>,
    },

    /// A mode name is not known for the connected vehicle.
    #[error("unknown mode \"{name}\", available modes: {}", known.join(", "))]
    UnknownMode {
        /// Requested name.
        name: String,
        /// Names the vehicle supports.
        known: Vec<String>,
    },

    /// An operation needs a position and none has been reported.
    #[error("no GPS fix: position unknown")]
    NoFix,

    /// The vehicle acknowledged a command with a failure code.
    #[error("command {command:?} rejected: {result:?}")]
    CommandRejected {
        /// Command sent.
        command: MavCmd,
        /// Result code from the ack.
        result: MavResult,
    },

    /// The session has no open link.
    #[error("not connected")]
    NotConnected,

    /// The transport was closed by the other end.
    #[error("link closed")]
    LinkClosed,

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model construction or encoding error.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl SdkError {
    /// Whether this error is, or was caused by, an expired deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::IncompleteUpload { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}
