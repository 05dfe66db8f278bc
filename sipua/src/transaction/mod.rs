#![deny(missing_docs)]
//! SIP Transaction Layer.
//!
//! The four RFC 3261 §17 state machines. Retransmission timers only run
//! on unreliable transports; over WebSocket the machines collapse to
//! their reliable form (timers D and I are zero, A/E/G never fire).

use bytes::Bytes;

use crate::error::Result;
use crate::message::{SipMethod, StatusCode};
use crate::transport::{IncomingRequest, IncomingResponse, OutgoingRequest, OutgoingResponse, Socket, ToBytes};
use crate::ua::{TsxUser, UaEvent, UserAgent};

use std::collections::HashMap;
use std::io;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

pub(crate) mod client;
pub(crate) mod inv_client;
pub(crate) mod inv_server;
pub(crate) mod key;
pub(crate) mod server;

#[cfg(test)]
pub(crate) mod mock;

pub use client::ClientTransaction;
pub use inv_client::InvClientTransaction;
pub use inv_server::InvServerTransaction;
pub use key::{ClientTsxKey, ServerTsxKey, TsxKey};
pub use server::ServerTransaction;

type LastMsg = tokio::sync::RwLock<Option<Bytes>>;
type LastStatusCode = RwLock<Option<StatusCode>>;

#[async_trait::async_trait]
/// A trait for managing the behavior of a SIP transaction.
pub trait Transaction: Sync + Send + 'static {
    /// Estimated round‑trip time (RTT) for message exchanges.
    ///
    /// This value is used as the baseline when computing retransmission intervals.
    const T1: Duration = Duration::from_millis(500);

    /// Maximum retransmission interval for non‑INVITE requests and INVITE responses.
    ///
    /// Retransmissions back off exponentially, but will not exceed this value.
    const T2: Duration = Duration::from_secs(4);

    /// Maximum duration that a message may remain in the network before being discarded.
    ///
    /// Controls the overall lifetime of the transaction, including retransmissions.
    const T4: Duration = Duration::from_secs(5);

    /// Terminate the SIP Transaction.
    fn terminate(&self);
}

struct Inner {
    /// The role of the transaction (UAC or UAS).
    role: Role,
    /// The user agent this transaction belongs to.
    ua: UserAgent,
    /// The key used to identify the transaction.
    key: TsxKey,
    /// The socket used for communication.
    socket: Arc<dyn Socket>,
    /// The current state of the transaction.
    state: Mutex<State>,
    /// The last status code sent or received in the transaction.
    status_code: LastStatusCode,
    /// The retransmission count for the transaction.
    retransmit_count: AtomicUsize,
    /// The last message sent in the transaction.
    last_msg: LastMsg,
    /// The transaction user responses are routed to.
    user: RwLock<Option<TsxUser>>,
}

#[derive(Clone)]
/// Represents a SIP Transaction.
///
/// A SIP Transaction consists of a set of messages exchanged
/// between a client (`UAC`) and a server (`UAS`) to complete
/// a certain action, such as establishing or terminating a call.
pub struct TransactionInner(Arc<Inner>);

impl TransactionInner {
    fn builder() -> Builder {
        Default::default()
    }

    pub(crate) fn new_tsx_uac(request: &OutgoingRequest, ua: &UserAgent, state: State) -> Result<Self> {
        let Some(key) = TsxKey::create_client(request) else {
            return Err(crate::error::Error::InvalidState(
                "Request has no Via branch".into(),
            ));
        };

        let mut builder = Self::builder();

        builder.key(key);
        builder.role(Role::UAC);
        builder.ua(ua.clone());
        builder.socket(request.socket.clone());
        builder.state(state);

        let tsx = builder.build();

        log::trace!("Transaction Created [{:?}] ({})", tsx.0.role, tsx.key().branch());

        Ok(tsx)
    }

    pub(crate) fn new_tsx_uas(request: &IncomingRequest, ua: &UserAgent, state: State) -> Result<Self> {
        let Some(key) = TsxKey::create_server(request) else {
            return Err(crate::error::Error::InvalidState(
                "Request branch misses the magic cookie".into(),
            ));
        };

        let mut builder = Self::builder();

        builder.key(key);
        builder.role(Role::UAS);
        builder.ua(ua.clone());
        builder.socket(request.socket.clone());
        builder.state(state);

        let tsx = builder.build();

        log::trace!("Transaction Created [{:?}] ({})", tsx.0.role, tsx.key().branch());

        Ok(tsx)
    }

    pub(crate) fn socket(&self) -> &Arc<dyn Socket> {
        &self.0.socket
    }

    pub(crate) fn key(&self) -> &TsxKey {
        &self.0.key
    }

    pub(crate) fn ua(&self) -> &UserAgent {
        &self.0.ua
    }

    /// Attaches the transaction user that response events are routed to.
    pub(crate) fn set_user(&self, user: TsxUser) {
        *self.0.user.write().expect("Lock failed") = Some(user);
    }

    pub(crate) fn user(&self) -> Option<TsxUser> {
        self.0.user.read().expect("Lock failed").clone()
    }

    fn schedule_termination(&self, time: Duration) {
        let tsx = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(time).await;
            tsx.on_terminated();
        });
    }

    #[inline]
    /// Checks if the transport is reliable.
    pub fn reliable(&self) -> bool {
        self.0.socket.reliable()
    }

    #[inline]
    /// Retrieves the current state of the Transaction.
    pub fn get_state(&self) -> State {
        *self.0.state.lock().expect("Lock failed")
    }

    #[inline]
    /// Gets the count of retransmissions.
    pub fn retrans_count(&self) -> u32 {
        self.0.retransmit_count.load(Ordering::SeqCst) as u32
    }

    #[inline]
    pub(crate) fn add_retrans_count(&self) -> u32 {
        self.0.retransmit_count.fetch_add(1, Ordering::SeqCst) as u32 + 1
    }

    #[inline]
    /// Retrieves the last status code sent.
    pub fn last_status_code(&self) -> Option<StatusCode> {
        *self.0.status_code.read().expect("Lock failed")
    }

    #[inline]
    pub(crate) async fn last_msg(&self) -> Option<Bytes> {
        self.0.last_msg.read().await.clone()
    }

    pub(crate) fn on_terminated(&self) {
        if self.get_state() == State::Terminated {
            return;
        }
        self.change_state_to(State::Terminated);
        let layer = self.0.ua.tsx_layer();
        let key = &self.0.key;

        match self.0.role {
            Role::UAC => {
                layer.remove_client_tsx(key);
            }
            Role::UAS => {
                layer.remove_server_tsx(key);
            }
        };
    }

    /// Terminates the transaction because its transport failed, telling
    /// the transaction user.
    pub(crate) fn on_transport_error(&self, reason: &str) {
        log::warn!("Transaction {} transport error: {}", self.key().branch(), reason);
        let user = self.user();
        self.on_terminated();
        if let Some(user) = user {
            self.0.ua.on_tsx_transport_error(user);
        }
    }

    pub(crate) fn change_state_to(&self, state: State) {
        let old = {
            let mut guard = self.0.state.lock().expect("Lock failed");
            mem::replace(&mut *guard, state)
        };
        log::trace!("State Changed [{old:?} -> {state:?}] ({})", self.key().branch());
    }

    #[inline]
    fn set_last_status_code(&self, code: StatusCode) {
        let mut guard = self.0.status_code.write().expect("Lock failed");
        *guard = Some(code);
    }

    pub(crate) async fn set_last_msg(&self, msg: Bytes) {
        let mut guard = self.0.last_msg.write().await;
        *guard = Some(msg);
    }

    pub(crate) fn is_calling(&self) -> bool {
        self.get_state() == State::Calling
    }

    pub(crate) fn is_trying(&self) -> bool {
        self.get_state() == State::Trying
    }

    async fn retransmit(&self) -> Result<u32> {
        let retransmited = {
            let lock = self.0.last_msg.read().await;
            if let Some(msg) = lock.as_ref() {
                self.0.socket.send(msg).await?;
                true
            } else {
                false
            }
        };

        if retransmited {
            Ok(self.add_retrans_count())
        } else {
            Err(crate::error::Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "No message to retransmit",
            )))
        }
    }

    async fn tsx_send_request(&self, msg: &mut OutgoingRequest) -> Result<()> {
        log::debug!("<= Request {} to /{}", msg.msg.req_line.method, self.0.socket.peer_name());
        let buf = match msg.buf.take() {
            Some(buf) => buf,
            None => msg.to_bytes()?,
        };
        self.0.socket.send(&buf).await?;
        self.set_last_msg(buf).await;
        Ok(())
    }

    async fn tsx_send_response(&self, msg: &mut OutgoingResponse) -> Result<()> {
        let code = msg.status_code();
        log::debug!("=> Response {} {}", code.into_u16(), msg.reason());
        let buf = match msg.buf.take() {
            Some(buf) => buf,
            None => msg.to_bytes()?,
        };

        self.0.socket.send(&buf).await?;
        self.set_last_status_code(code);
        self.set_last_msg(buf).await;
        Ok(())
    }
}

#[derive(Default)]
/// Builder for creating a new SIP `Transaction`.
pub(crate) struct Builder {
    role: Option<Role>,
    ua: Option<UserAgent>,
    key: Option<TsxKey>,
    socket: Option<Arc<dyn Socket>>,
    state: Option<Mutex<State>>,
    status_code: Option<LastStatusCode>,
    last_msg: Option<LastMsg>,
    retransmit_count: Option<AtomicUsize>,
    user: Option<RwLock<Option<TsxUser>>>,
}

impl Builder {
    /// Sets the role of the transaction.
    pub fn role(&mut self, role: Role) -> &mut Self {
        self.role = Some(role);
        self
    }

    /// Sets the user agent the transaction belongs to.
    pub fn ua(&mut self, ua: UserAgent) -> &mut Self {
        self.ua = Some(ua);
        self
    }

    /// Sets the key used to identify the transaction.
    pub fn key(&mut self, key: TsxKey) -> &mut Self {
        self.key = Some(key);
        self
    }

    /// Sets the socket associated with the transaction.
    pub fn socket(&mut self, socket: Arc<dyn Socket>) -> &mut Self {
        self.socket = Some(socket);
        self
    }

    /// Sets the transaction state.
    pub fn state(&mut self, state: State) -> &mut Self {
        self.state = Some(Mutex::new(state));
        self
    }

    /// Finalize the builder into a `Transaction`.
    pub fn build(self) -> TransactionInner {
        let inner = Inner {
            role: self.role.expect("Role is required"),
            ua: self.ua.expect("UserAgent is required"),
            key: self.key.expect("Key is required"),
            socket: self.socket.expect("Socket is required"),
            state: self.state.expect("State is required"),
            status_code: self.status_code.unwrap_or_default(),
            last_msg: self.last_msg.unwrap_or_default(),
            retransmit_count: self.retransmit_count.unwrap_or_default(),
            user: self.user.unwrap_or_default(),
        };

        TransactionInner(Arc::new(inner))
    }
}

/// The possible roles of a SIP Transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// (User Agent Client): The entity that initiates the
    /// request.
    UAC,
    /// (User Agent Server): The entity that responds to the
    /// request.
    UAS,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Defines the possible states of a SIP Transaction.
pub enum State {
    #[default]
    /// Initial state
    Initial,
    /// Calling state
    Calling,
    /// Trying state
    Trying,
    /// Proceeding state
    Proceeding,
    /// Completed state
    Completed,
    /// Accepted state (RFC 6026, a 2xx passed through an INVITE machine)
    Accepted,
    /// Confirmed state
    Confirmed,
    /// Terminated state
    Terminated,
}

#[derive(Clone)]
/// An Server Transaction, either Invite or NonInvite.
pub enum ServerTsx {
    /// An NonInvite Server Transaction.
    NonInvite(ServerTransaction),
    /// An Invite Server Transaction.
    Invite(InvServerTransaction),
}

impl ServerTsx {
    /// Retrieves the last status code sent by transaction.
    pub fn last_status_code(&self) -> Option<StatusCode> {
        match self {
            ServerTsx::NonInvite(uas) => uas.last_status_code(),
            ServerTsx::Invite(uas_inv) => uas_inv.last_status_code(),
        }
    }

    pub(crate) fn key(&self) -> &TsxKey {
        match self {
            ServerTsx::NonInvite(uas) => uas.key(),
            ServerTsx::Invite(uas_inv) => uas_inv.key(),
        }
    }

    pub(crate) async fn receive_request(&self, request: &IncomingRequest) -> Result<()> {
        match self {
            ServerTsx::NonInvite(uas) => {
                if matches!(uas.get_state(), State::Proceeding | State::Completed) {
                    uas.retransmit().await?;
                }
                Ok(())
            }
            ServerTsx::Invite(uas_inv) => {
                match uas_inv.get_state() {
                    State::Completed if request.is_method(&SipMethod::Ack) => {
                        uas_inv.confirm();
                    }
                    State::Proceeding if !request.is_method(&SipMethod::Ack) => {
                        uas_inv.retransmit().await?;
                    }
                    _ => (),
                }
                Ok(())
            }
        }
    }
}

impl From<ServerTransaction> for ServerTsx {
    fn from(tsx: ServerTransaction) -> Self {
        ServerTsx::NonInvite(tsx)
    }
}

impl From<InvServerTransaction> for ServerTsx {
    fn from(tsx: InvServerTransaction) -> Self {
        ServerTsx::Invite(tsx)
    }
}

#[derive(Clone)]
/// An Client Transaction, either Invite or NonInvite.
pub enum ClientTsx {
    /// An NonInvite Client Transaction.
    NonInvite(ClientTransaction),
    /// An Invite Client Transaction.
    Invite(InvClientTransaction),
}

impl ClientTsx {
    /// Retrieves the key identifying this transaction.
    pub fn key(&self) -> &TsxKey {
        match self {
            ClientTsx::NonInvite(uac) => uac.key(),
            ClientTsx::Invite(uac_inv) => uac_inv.key(),
        }
    }

    pub(crate) fn user(&self) -> Option<TsxUser> {
        match self {
            ClientTsx::NonInvite(uac) => uac.user(),
            ClientTsx::Invite(uac_inv) => uac_inv.user(),
        }
    }

    pub(crate) fn on_transport_error(&self, reason: &str) {
        match self {
            ClientTsx::NonInvite(uac) => uac.on_transport_error(reason),
            ClientTsx::Invite(uac_inv) => uac_inv.on_transport_error(reason),
        }
    }
}

/// Represents the transaction layer of the SIP protocol.
///
/// This type holds all server and client transactions created
/// by the TU (Transaction User).
pub struct TransactionLayer {
    client_transactions: Mutex<HashMap<TsxKey, ClientTsx>>,
    server_transactions: Mutex<HashMap<TsxKey, ServerTsx>>,
    events: tokio::sync::mpsc::UnboundedSender<UaEvent>,
}

impl TransactionLayer {
    pub(crate) fn new(events: tokio::sync::mpsc::UnboundedSender<UaEvent>) -> Self {
        Self {
            client_transactions: Default::default(),
            server_transactions: Default::default(),
            events,
        }
    }

    /// Returns how many transactions are alive.
    pub fn len(&self) -> usize {
        self.client_transactions.lock().expect("Lock failed").len()
            + self.server_transactions.lock().expect("Lock failed").len()
    }

    /// Returns `true` when no transaction is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove an server transaction in the collection.
    #[inline]
    pub(crate) fn remove_server_tsx(&self, key: &TsxKey) -> Option<ServerTsx> {
        let removed = self.server_transactions.lock().expect("Lock failed").remove(key);
        if removed.is_some() {
            let _ = self.events.send(UaEvent::TransactionDestroyed { key: key.clone() });
        }
        removed
    }

    /// Remove an client transaction in the collection.
    #[inline]
    pub(crate) fn remove_client_tsx(&self, key: &TsxKey) -> Option<ClientTsx> {
        let removed = self.client_transactions.lock().expect("Lock failed").remove(key);
        if removed.is_some() {
            let _ = self.events.send(UaEvent::TransactionDestroyed { key: key.clone() });
        }
        removed
    }

    #[inline]
    pub(crate) fn add_client_tsx(&self, tsx: ClientTsx) {
        let key = tsx.key().clone();
        self.client_transactions
            .lock()
            .expect("Lock failed")
            .insert(key.clone(), tsx);
        let _ = self.events.send(UaEvent::NewTransaction { key });
    }

    #[inline]
    pub(crate) fn add_server_tsx(&self, tsx: ServerTsx) {
        let key = tsx.key().clone();
        self.server_transactions
            .lock()
            .expect("Lock failed")
            .insert(key.clone(), tsx);
        let _ = self.events.send(UaEvent::NewTransaction { key });
    }

    pub(crate) fn find_server_tsx(&self, key: &TsxKey) -> Option<ServerTsx> {
        self.server_transactions.lock().expect("Lock failed").get(key).cloned()
    }

    pub(crate) fn find_client_tsx(&self, key: &TsxKey) -> Option<ClientTsx> {
        self.client_transactions.lock().expect("Lock failed").get(key).cloned()
    }

    /// Aborts every transaction with a transport error cause.
    pub(crate) fn abort_all(&self, reason: &str) {
        let clients: Vec<_> = {
            let map = self.client_transactions.lock().expect("Lock failed");
            map.values().cloned().collect()
        };
        for tsx in clients {
            tsx.on_transport_error(reason);
        }

        let servers: Vec<_> = {
            let map = self.server_transactions.lock().expect("Lock failed");
            map.keys().cloned().collect()
        };
        for key in servers {
            self.remove_server_tsx(&key);
        }
    }

    /// Drives the matching client transaction with a received response.
    ///
    /// Returns the transaction when the response is new to its
    /// transaction user, `None` when it was absorbed (retransmission) or
    /// no transaction matched.
    pub(crate) async fn handle_response(&self, response: &IncomingResponse) -> Result<Option<ClientTsx>> {
        let cseq_method = response.cseq().method();
        let Some(via_branch) = response
            .core
            .via
            .branch()
        else {
            return Ok(None);
        };

        let key = TsxKey::create_client_with(cseq_method, via_branch);
        let Some(client_tsx) = self.find_client_tsx(&key) else {
            return Ok(None);
        };

        let absorbed = match &client_tsx {
            ClientTsx::NonInvite(tsx) => tsx.receive(response).await?,
            ClientTsx::Invite(tsx_inv) => tsx_inv.receive(response).await?,
        };

        Ok((!absorbed).then_some(client_tsx))
    }

    /// Lets an existing server transaction absorb a retransmitted
    /// request. Returns `true` when a transaction matched.
    pub(crate) async fn handle_request(&self, request: &IncomingRequest) -> Result<bool> {
        let server_tsx = {
            let Some(key) = TsxKey::create_server(request) else {
                return Ok(false);
            };

            match self.find_server_tsx(&key) {
                Some(tsx) => tsx,
                None => return Ok(false),
            }
        };

        server_tsx.receive_request(request).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SipMethod;

    #[tokio::test]
    async fn test_non_invite_server_tsx() {
        let (ua, _events) = mock::default_ua();
        let mut req = mock::request(SipMethod::Register);

        let tsx = ServerTransaction::new(&ua, &mut req).unwrap();

        let transactions = ua.tsx_layer();
        let key = req.tsx_key().unwrap().clone();

        assert!(matches!(
            transactions.find_server_tsx(&key),
            Some(ServerTsx::NonInvite(_))
        ));

        tsx.on_terminated();

        assert!(transactions.find_server_tsx(&key).is_none());
    }

    #[tokio::test]
    async fn test_invite_server_tsx() {
        let (ua, _events) = mock::default_ua();
        let mut req = mock::request(SipMethod::Invite);

        let tsx = InvServerTransaction::new(&ua, &mut req).unwrap();

        let transactions = ua.tsx_layer();
        let key = req.tsx_key().unwrap().clone();

        assert!(matches!(transactions.find_server_tsx(&key), Some(ServerTsx::Invite(_))));

        tsx.on_terminated();

        assert!(transactions.find_server_tsx(&key).is_none());
    }

    #[tokio::test]
    async fn test_transaction_events_are_emitted() {
        let (ua, mut events) = mock::default_ua();
        let mut req = mock::request(SipMethod::Register);

        let tsx = ServerTransaction::new(&ua, &mut req).unwrap();
        tsx.on_terminated();

        assert_matches!(events.try_recv(), Ok(UaEvent::NewTransaction { .. }));
        assert_matches!(events.try_recv(), Ok(UaEvent::TransactionDestroyed { .. }));
    }
}
