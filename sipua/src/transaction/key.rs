//! Transaction identification.

use sipua_util::ArcStr;

use crate::headers::BRANCH_MAGIC_COOKIE;
use crate::message::{HostPort, SipMethod};
use crate::transport::{IncomingRequest, OutgoingRequest};

/// Uniquely identifies a transaction (RFC 3261 §17.1.3 / §17.2.3).
///
/// A client key pairs the topmost Via branch with the CSeq method; a
/// server key additionally pins the Via sent-by so spirals are told
/// apart. `ACK` and `CANCEL` match the transaction of the `INVITE` they
/// belong to, which shares their branch but not their method, so both
/// are keyed with the method they relate to.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum TsxKey {
    /// Identifies a client (UAC) transaction.
    Client(ClientTsxKey),
    /// Identifies a server (UAS) transaction.
    Server(ServerTsxKey),
}

/// Key of a client transaction.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct ClientTsxKey {
    branch: ArcStr,
    method: SipMethod,
}

/// Key of a server transaction.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct ServerTsxKey {
    branch: ArcStr,
    via_sent_by: HostPort,
    method: SipMethod,
}

impl TsxKey {
    /// Builds a client key from a method and branch.
    pub fn create_client_with(method: &SipMethod, branch: &str) -> Self {
        TsxKey::Client(ClientTsxKey {
            branch: branch.into(),
            method: normalize(*method),
        })
    }

    /// Builds the key of the transaction an outbound request creates.
    pub fn create_client(request: &OutgoingRequest) -> Option<Self> {
        let branch = request
            .msg
            .headers
            .find_map(|header| match header {
                crate::headers::Header::Via(via) => via.branch(),
                _ => None,
            })?;

        Some(TsxKey::Client(ClientTsxKey {
            branch: branch.into(),
            method: normalize(*request.msg.method()),
        }))
    }

    /// Builds the key of the server transaction a received request
    /// belongs to. `None` when the branch misses the RFC 3261 magic
    /// cookie.
    pub fn create_server(request: &IncomingRequest) -> Option<Self> {
        let via = request.via();
        match via.branch() {
            Some(branch) if branch.starts_with(BRANCH_MAGIC_COOKIE) => Some(TsxKey::Server(ServerTsxKey {
                branch: branch.into(),
                via_sent_by: via.sent_by().clone(),
                method: normalize(*request.method()),
            })),
            _ => None,
        }
    }

    /// Returns the branch of this key.
    pub fn branch(&self) -> &str {
        match self {
            TsxKey::Client(key) => &key.branch,
            TsxKey::Server(key) => &key.branch,
        }
    }

    /// Returns the method of this key.
    pub fn method(&self) -> &SipMethod {
        match self {
            TsxKey::Client(key) => &key.method,
            TsxKey::Server(key) => &key.method,
        }
    }
}

/// ACK matches the INVITE transaction it acknowledges.
fn normalize(method: SipMethod) -> SipMethod {
    match method {
        SipMethod::Ack => SipMethod::Invite,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_matches_invite_key() {
        let invite = TsxKey::create_client_with(&SipMethod::Invite, "z9hG4bK776asdhds");
        let ack = TsxKey::create_client_with(&SipMethod::Ack, "z9hG4bK776asdhds");

        assert_eq!(invite, ack);
    }

    #[test]
    fn test_cancel_has_its_own_key() {
        let invite = TsxKey::create_client_with(&SipMethod::Invite, "z9hG4bK776asdhds");
        let cancel = TsxKey::create_client_with(&SipMethod::Cancel, "z9hG4bK776asdhds");

        assert_ne!(invite, cancel);
    }
}
