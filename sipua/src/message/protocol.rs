use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The transport a message travels over, as it appears in the
/// `Via` header and the uri `transport` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    /// UDP transport.
    Udp,
    /// TCP transport.
    Tcp,
    /// TLS transport.
    Tls,
    #[default]
    /// WebSocket transport.
    Ws,
    /// Secure WebSocket transport.
    Wss,
}

impl TransportKind {
    /// Returns the uppercase name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Udp => "UDP",
            TransportKind::Tcp => "TCP",
            TransportKind::Tls => "TLS",
            TransportKind::Ws => "WS",
            TransportKind::Wss => "WSS",
        }
    }

    /// Returns `true` if the transport guarantees delivery.
    pub fn reliable(&self) -> bool {
        !matches!(self, TransportKind::Udp)
    }

    /// Returns `true` if the transport is encrypted.
    pub fn secure(&self) -> bool {
        matches!(self, TransportKind::Tls | TransportKind::Wss)
    }
}

impl From<&[u8]> for TransportKind {
    fn from(value: &[u8]) -> Self {
        match value {
            v if v.eq_ignore_ascii_case(b"UDP") => TransportKind::Udp,
            v if v.eq_ignore_ascii_case(b"TCP") => TransportKind::Tcp,
            v if v.eq_ignore_ascii_case(b"TLS") => TransportKind::Tls,
            v if v.eq_ignore_ascii_case(b"WSS") => TransportKind::Wss,
            _ => TransportKind::Ws,
        }
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("UDP") => Ok(TransportKind::Udp),
            s if s.eq_ignore_ascii_case("TCP") => Ok(TransportKind::Tcp),
            s if s.eq_ignore_ascii_case("TLS") => Ok(TransportKind::Tls),
            s if s.eq_ignore_ascii_case("WS") => Ok(TransportKind::Ws),
            s if s.eq_ignore_ascii_case("WSS") => Ok(TransportKind::Wss),
            other => Err(Error::Configuration(format!("Unknown transport '{other}'"))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
