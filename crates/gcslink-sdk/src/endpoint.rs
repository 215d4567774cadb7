//! Link endpoint strings.
//!
//! Endpoints use the `scheme:host:port` form familiar from MAVLink tools:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `udpin:0.0.0.0:14550` | listen locally, answer whoever talks to us |
//! | `udp:0.0.0.0:14550` | same as `udpin` |
//! | `udpout:10.0.0.2:14550` | send to a fixed remote address |

use std::fmt;
use std::str::FromStr;

use crate::error::SdkError;

/// Where a session's transport connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Bind `host:port` locally and reply to the last sender.
    UdpIn {
        /// Local address to bind.
        host: String,
        /// Local port.
        port: u16,
    },
    /// Bind an ephemeral port and send to `host:port`.
    UdpOut {
        /// Remote host name or address.
        host: String,
        /// Remote port.
        port: u16,
    },
}

impl Endpoint {
    /// `host:port` part of the endpoint.
    pub fn address(&self) -> String {
        match self {
            Self::UdpIn { host, port } | Self::UdpOut { host, port } => format!("{host}:{port}"),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UdpIn { .. } => write!(f, "udpin:{}", self.address()),
            Self::UdpOut { .. } => write!(f, "udpout:{}", self.address()),
        }
    }
}

impl FromStr for Endpoint {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SdkError::Endpoint {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| invalid("expected scheme:host:port"))?;
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected scheme:host:port"))?;
        if host.is_empty() {
            return Err(invalid("host must not be empty"));
        }
        let port: u16 = port.parse().map_err(|_| invalid("port must be 0-65535"))?;
        let host = host.to_string();

        match scheme {
            "udp" | "udpin" => Ok(Self::UdpIn { host, port }),
            "udpout" => Ok(Self::UdpOut { host, port }),
            other => Err(invalid(&format!("unsupported scheme \"{other}\""))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listen_forms() {
        let expected = Endpoint::UdpIn {
            host: "0.0.0.0".into(),
            port: 14550,
        };
        assert_eq!("udpin:0.0.0.0:14550".parse::<Endpoint>().unwrap(), expected);
        assert_eq!("udp:0.0.0.0:14550".parse::<Endpoint>().unwrap(), expected);
        assert_eq!(expected.to_string(), "udpin:0.0.0.0:14550");
    }

    #[test]
    fn parses_outbound_form() {
        let ep: Endpoint = "udpout:sitl.local:14555".parse().unwrap();
        assert_eq!(ep.address(), "sitl.local:14555");
        assert_eq!(ep.to_string(), "udpout:sitl.local:14555");
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["", "udpin", "udpin:14550", "tcp:127.0.0.1:5760", "udpin::14550", "udpout:host:99999"] {
            let err = bad.parse::<Endpoint>().unwrap_err();
            assert!(matches!(err, SdkError::Endpoint { .. }), "{bad}");
        }
    }
}
