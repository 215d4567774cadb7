//! Onboard parameter identifiers and values.
//!
//! Parameter names travel as 16-byte NUL-padded ASCII fields. [`ParamId`]
//! validates the name once so the rest of the stack can compare ids
//! without caring about padding.

use std::fmt;
use std::str::FromStr;

use mavlink::common::MavParamType;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Width of the `param_id` field on the wire.
pub const PARAM_ID_LEN: usize = 16;

// ---------------------------------------------------------------------------
// ParamId
// ---------------------------------------------------------------------------

/// Name of an onboard parameter (1 to 16 printable ASCII characters).
///
/// # Examples
///
/// ```
/// use gcslink_models::ParamId;
///
/// let id: ParamId = "WPNAV_SPEED".parse().unwrap();
/// let wire = id.to_wire();
/// assert_eq!(&wire[..11], b"WPNAV_SPEED");
/// assert_eq!(wire[11], 0);
/// assert_eq!(ParamId::from_wire(&wire), id);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ParamId(String);

impl ParamId {
    /// Validate and wrap a parameter name.
    pub fn new(id: &str) -> Result<Self, ModelError> {
        let invalid = |reason: &str| ModelError::InvalidParamId {
            value: id.to_string(),
            reason: reason.to_string(),
        };
        if id.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if id.len() > PARAM_ID_LEN {
            return Err(invalid("must be at most 16 characters"));
        }
        if !id.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(invalid("must be printable ASCII without spaces"));
        }
        Ok(Self(id.to_string()))
    }

    /// Decode a NUL-padded wire field, dropping everything from the first NUL.
    pub fn from_wire(raw: &[u8; PARAM_ID_LEN]) -> Self {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(PARAM_ID_LEN);
        Self(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Encode into the NUL-padded wire field.
    pub fn to_wire(&self) -> [u8; PARAM_ID_LEN] {
        let mut raw = [0u8; PARAM_ID_LEN];
        raw[..self.0.len()].copy_from_slice(self.0.as_bytes());
        raw
    }

    /// Return the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ParamId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ParamId {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<ParamId> for String {
    fn from(id: ParamId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// ParamValue
// ---------------------------------------------------------------------------

/// A parameter value as echoed by the vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamValue {
    /// Parameter name with padding removed.
    pub id: ParamId,
    /// Value, always carried as `f32` on the wire.
    pub value: f32,
    /// Declared storage type onboard.
    pub param_type: MavParamType,
    /// Index of this parameter in the vehicle's table.
    pub index: u16,
    /// Total number of parameters onboard.
    pub count: u16,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
