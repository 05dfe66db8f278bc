//! The event surface of the user agent.

use sipua_util::ArcStr;

use crate::error::EndReason;
use crate::headers::{Event, From as FromHdr};
use crate::transaction::TsxKey;
use crate::ua::session::{Session, SessionId};

/// Which side initiated the thing an event reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Originator {
    /// This user agent.
    Local,
    /// The peer.
    Remote,
}

/// Everything a [`crate::ua::UserAgent`] reports to the application.
///
/// Events arrive on the receiver returned by `UserAgent::new`, in the
/// order they occurred.
pub enum UaEvent {
    /// A socket connection attempt is starting.
    SocketConnecting {
        /// 1-based attempt counter since the last successful connection.
        attempt: u32,
    },
    /// The socket is connected.
    SocketConnected,
    /// The socket disconnected.
    SocketDisconnected {
        /// The transport error, when the close was not voluntary.
        error: Option<String>,
    },
    /// A transaction was created.
    NewTransaction {
        /// The identity of the transaction.
        key: TsxKey,
    },
    /// A transaction reached its terminal state and was removed.
    TransactionDestroyed {
        /// The identity of the transaction.
        key: TsxKey,
    },
    /// A registration (or refresh) succeeded.
    Registered {
        /// The granted binding lifetime in seconds.
        expires: u32,
    },
    /// The registration was removed.
    Unregistered,
    /// A registration attempt failed.
    RegistrationFailed {
        /// Why the registration failed.
        reason: EndReason,
    },
    /// An invite session was created, incoming or outgoing.
    NewSession {
        /// A handle to drive the session.
        session: Session,
        /// Who initiated it.
        originator: Originator,
        /// The session this INVITE replaces (RFC 3891), if any.
        replaces: Option<Session>,
    },
    /// The session received a provisional response / sent 180.
    SessionProgress {
        /// The session this event belongs to.
        id: SessionId,
    },
    /// The session was accepted with a 2xx.
    SessionAccepted {
        /// The session this event belongs to.
        id: SessionId,
        /// The remote session description, when one was carried.
        body: Option<ArcStr>,
    },
    /// The session is confirmed (2xx acknowledged).
    SessionConfirmed {
        /// The session this event belongs to.
        id: SessionId,
    },
    /// The session ended.
    SessionEnded {
        /// The session this event belongs to.
        id: SessionId,
        /// Why the session ended.
        reason: EndReason,
    },
    /// A `MESSAGE` was received or a sent one completed.
    NewMessage {
        /// Who initiated the message.
        originator: Originator,
        /// The peer identity.
        from: FromHdr,
        /// The message payload.
        body: Option<ArcStr>,
    },
    /// An out-of-dialog `OPTIONS` was received.
    NewOptions {
        /// The peer identity.
        from: FromHdr,
    },
    /// A `NOTIFY` was received.
    SipEvent {
        /// The event package, when the header parsed.
        event: Option<Event>,
        /// The peer identity.
        from: FromHdr,
        /// The notification payload.
        body: Option<ArcStr>,
    },
    /// An out-of-dialog `SUBSCRIBE` was received.
    NewSubscribe {
        /// The event package, when present.
        event: Option<Event>,
        /// The peer identity.
        from: FromHdr,
    },
}

impl std::fmt::Debug for UaEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UaEvent::SocketConnecting { .. } => "SocketConnecting",
            UaEvent::SocketConnected => "SocketConnected",
            UaEvent::SocketDisconnected { .. } => "SocketDisconnected",
            UaEvent::NewTransaction { .. } => "NewTransaction",
            UaEvent::TransactionDestroyed { .. } => "TransactionDestroyed",
            UaEvent::Registered { .. } => "Registered",
            UaEvent::Unregistered => "Unregistered",
            UaEvent::RegistrationFailed { .. } => "RegistrationFailed",
            UaEvent::NewSession { .. } => "NewSession",
            UaEvent::SessionProgress { .. } => "SessionProgress",
            UaEvent::SessionAccepted { .. } => "SessionAccepted",
            UaEvent::SessionConfirmed { .. } => "SessionConfirmed",
            UaEvent::SessionEnded { .. } => "SessionEnded",
            UaEvent::NewMessage { .. } => "NewMessage",
            UaEvent::NewOptions { .. } => "NewOptions",
            UaEvent::SipEvent { .. } => "SipEvent",
            UaEvent::NewSubscribe { .. } => "NewSubscribe",
        };
        f.write_str(name)
    }
}
