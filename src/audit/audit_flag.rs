use std::fmt;

use serde::Serialize;

/// A security-relevant pattern spotted in a relayed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditFlag {
    /// An SDP offer/answer carrying an `a=fingerprint` line.
    FingerprintExposed,
    /// A `typ host` ICE candidate: a LAN address leaks to the other peers.
    LocalAddressExposed { address: Option<String> },
    /// A `typ srflx` ICE candidate: the NAT's public address leaks.
    PublicAddressExposed { address: Option<String> },
}

impl fmt::Display for AuditFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FingerprintExposed => write!(f, "fingerprint exposed in SDP"),
            Self::LocalAddressExposed { address } => {
                write!(f, "local IP exposed: {}", address.as_deref().unwrap_or("?"))
            }
            Self::PublicAddressExposed { address } => {
                write!(f, "public IP exposed: {}", address.as_deref().unwrap_or("?"))
            }
        }
    }
}
