//! Error types for the `gcslink-models` crate.
//!
//! All fallible constructors and wire conversions in this crate return
//! variants of [`ModelError`].

/// Errors produced when constructing, validating or encoding model types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A parameter identifier was empty, too long or not plain ASCII.
    #[error("invalid parameter id \"{value}\": {reason}")]
    InvalidParamId {
        /// The value that failed validation.
        value: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// A mission type on the wire has no counterpart in [`MissionType`](crate::MissionType).
    #[error("unsupported mission type: {value}")]
    UnsupportedMissionType {
        /// Debug rendering of the wire value.
        value: String,
    },

    /// An item list does not fit the 16-bit sequence space.
    #[error("too many items: {count} (at most 65535)")]
    TooManyItems {
        /// Number of items offered.
        count: usize,
    },

    /// A MAVLink frame could not be serialised.
    #[error("failed to encode {message}: {reason}")]
    Encode {
        /// Name of the message being encoded.
        message: String,
        /// Human-readable explanation.
        reason: String,
    },
}
