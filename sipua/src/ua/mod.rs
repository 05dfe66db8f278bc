#![deny(missing_docs)]
//! The User Agent.
//!
//! [`UserAgent`] glues the socket, the parser, the transaction layer and
//! the dialog layer together: it correlates every incoming message with
//! a transaction, a dialog, a subscription or an applicant, and owns the
//! registration client and the socket lifecycle.

pub mod config;
pub mod dialog;
pub mod events;
pub mod registration;
pub mod session;
pub mod subscriber;

pub use config::Config;
pub use events::{Originator, UaEvent};
pub use registration::Registration;
pub use session::{Session, SessionId, SessionState};
pub use subscriber::Subscriber;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

use bytes::Bytes;
use rand::distr::{Alphanumeric, SampleString};
use sipua_util::ArcStr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{EndReason, Result};
use crate::headers::{Allow, Contact, ContactAddr, Header, Supported, Via, BRANCH_MAGIC_COOKIE};
use crate::message::{
    DomainName, Host, HostPort, Param, Params, Response, Scheme, SipAddr, SipMethod, SipMsg, StatusCode, StatusLine,
    Uri,
};
use crate::parser::Parser;
use crate::transaction::{InvServerTransaction, ServerTransaction, ServerTsx, TransactionLayer};
use crate::transport::{
    CoreHeaders, IncomingRequest, IncomingResponse, OutgoingRequest, OutgoingResponse, Packet, Socket, SocketEvent,
    SocketRx, SocketTx, ToBytes, KEEPALIVE_PING, KEEPALIVE_PONG,
};
use crate::ua::dialog::DialogId;

/// How long [`UserAgent::stop`] waits for in-flight transactions before
/// tearing the socket down.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Generates a From/To tag.
pub(crate) fn make_tag() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 10)
}

/// Generates a Via branch with the RFC 3261 magic cookie.
pub(crate) fn make_branch() -> String {
    format!(
        "{}{}",
        BRANCH_MAGIC_COOKIE,
        Alphanumeric.sample_string(&mut rand::rng(), 7)
    )
}

/// Which transaction user a client transaction reports to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TsxUser {
    /// The registration client.
    Registration,
    /// An invite session.
    Session(SessionId),
    /// An outbound subscription.
    Subscriber(ArcStr),
    /// A transient MESSAGE/OPTIONS requester.
    Applicant(u64),
}

/// The lifecycle of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UaStatus {
    /// Never started, or reset by `start()` after a close.
    Init,
    /// The socket is connected.
    Ready,
    /// The socket dropped; recovery is running.
    NotReady,
    /// `stop()` was called.
    UserClosed,
}

/// What a dialog key resolves to.
#[derive(Clone)]
enum DialogOwner {
    /// The dialog belongs to an invite session.
    Session(Session),
    /// The dialog belongs to a subscription.
    Subscriber(Subscriber),
}

/// A transient out-of-dialog requester (MESSAGE or OPTIONS).
struct Applicant {
    method: SipMethod,
}

struct Inner {
    config: Config,
    contact_uri: Uri,
    via_host: HostPort,
    events: mpsc::UnboundedSender<UaEvent>,
    transactions: TransactionLayer,
    sessions: Mutex<HashMap<String, Session>>,
    dialogs: Mutex<HashMap<String, DialogOwner>>,
    subscribers: Mutex<HashMap<ArcStr, Subscriber>>,
    applicants: Mutex<HashMap<u64, Applicant>>,
    next_applicant: AtomicU64,
    registration: OnceLock<Registration>,
    status: Mutex<UaStatus>,
    socket: RwLock<Arc<dyn Socket>>,
    socket_index: Mutex<usize>,
    connect_attempts: AtomicU32,
    socket_tx: SocketTx,
    socket_rx: Mutex<Option<SocketRx>>,
    close_task: Mutex<Option<JoinHandle<()>>>,
}

/// A SIP User Agent.
///
/// Built from a [`Config`], it reports everything that happens on the
/// receiver returned alongside it.
///
/// # Examples
///
/// ```no_run
/// # use sipua::{Config, UserAgent};
/// # use sipua::transport::ws::WsSocket;
/// # fn main() -> sipua::Result<()> {
/// let socket = WsSocket::new("wss://sip.example.com/ws")?;
/// let config = Config {
///     uri: "sip:alice@example.com".parse()?,
///     password: Some("secret".into()),
///     sockets: vec![socket],
///     ..Default::default()
/// };
///
/// let (ua, mut events) = UserAgent::new(config)?;
/// ua.start();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct UserAgent(Arc<Inner>);

impl UserAgent {
    /// Creates a user agent.
    ///
    /// Fails synchronously on invalid configuration. The returned
    /// receiver carries every [`UaEvent`] the agent produces.
    pub fn new(config: Config) -> Result<(Self, mpsc::UnboundedReceiver<UaEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (socket_tx, socket_rx) = mpsc::unbounded_channel();

        let via_host = HostPort {
            host: Host::DomainName(DomainName::new(&format!(
                "{}.invalid",
                Alphanumeric.sample_string(&mut rand::rng(), 12).to_lowercase()
            ))),
            port: None,
        };

        let contact_uri = match &config.contact_uri {
            Some(uri) => uri.clone(),
            None => {
                let user = Alphanumeric.sample_string(&mut rand::rng(), 8).to_lowercase();
                let mut uri = Uri::new(
                    config.uri.scheme,
                    Some(crate::message::UserInfo::new(&user, None)),
                    via_host.clone(),
                );
                uri.transport_param = Some(config.sockets[0].tp_kind());
                uri
            }
        };

        let socket = config.sockets[0].clone();

        let ua = UserAgent(Arc::new(Inner {
            transactions: TransactionLayer::new(event_tx.clone()),
            config,
            contact_uri,
            via_host,
            events: event_tx,
            sessions: Mutex::new(HashMap::new()),
            dialogs: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            applicants: Mutex::new(HashMap::new()),
            next_applicant: AtomicU64::new(1),
            registration: OnceLock::new(),
            status: Mutex::new(UaStatus::Init),
            socket: RwLock::new(socket),
            socket_index: Mutex::new(0),
            connect_attempts: AtomicU32::new(0),
            socket_tx,
            socket_rx: Mutex::new(Some(socket_rx)),
            close_task: Mutex::new(None),
        }));

        let _ = ua.0.registration.set(Registration::new(ua.clone()));

        Ok((ua, event_rx))
    }

    /// Returns the configuration the agent runs with.
    pub fn config(&self) -> &Config {
        &self.0.config
    }

    /// Returns the registration client.
    pub fn registration(&self) -> &Registration {
        self.0.registration.get().expect("Registration is set in new()")
    }

    /// Returns `true` while a registrar binding is in place.
    pub fn is_registered(&self) -> bool {
        self.registration().is_registered()
    }

    /// Returns `true` once the socket is connected.
    pub fn is_ready(&self) -> bool {
        *self.0.status.lock().expect("Lock failed") == UaStatus::Ready
    }

    /// Starts the agent: connects the socket and, once connected,
    /// registers when configured to.
    ///
    /// A no-op when already running. After [`UserAgent::stop`] it
    /// reconnects from scratch.
    pub fn start(&self) {
        {
            let mut status = self.0.status.lock().expect("Lock failed");
            match *status {
                UaStatus::Ready => return,
                UaStatus::Init | UaStatus::NotReady => {}
                UaStatus::UserClosed => {
                    if let Some(task) = self.0.close_task.lock().expect("Lock failed").take() {
                        task.abort();
                    }
                    *status = UaStatus::Init;
                }
            }
        }

        // The event pump runs once for the life of the agent.
        if let Some(rx) = self.0.socket_rx.lock().expect("Lock failed").take() {
            tokio::spawn(self.clone().event_pump(rx));
        }

        self.spawn_connect(Duration::ZERO);
    }

    /// Stops the agent.
    ///
    /// Unregisters, terminates every session, subscription and applicant,
    /// then disconnects. When transactions are still in flight the socket
    /// stays up for a short grace period so BYEs and CANCELs can finish.
    pub async fn stop(&self) {
        {
            let mut status = self.0.status.lock().expect("Lock failed");
            if *status == UaStatus::UserClosed {
                return;
            }
            *status = UaStatus::UserClosed;
        }

        tracing::info!("stopping user agent");

        let registration = self.registration().clone();
        if registration.is_registered() {
            let _ = registration.unregister(false).await;
        }
        registration.close();

        let sessions: Vec<Session> = self.0.sessions.lock().expect("Lock failed").values().cloned().collect();
        for session in sessions {
            let _ = session.terminate().await;
        }

        let subscribers: Vec<Subscriber> = self
            .0
            .subscribers
            .lock()
            .expect("Lock failed")
            .values()
            .cloned()
            .collect();
        for subscriber in subscribers {
            subscriber.close();
        }

        self.0.applicants.lock().expect("Lock failed").clear();

        if self.0.transactions.is_empty() {
            self.socket().disconnect().await;
        } else {
            let ua = self.clone();
            let task = tokio::spawn(async move {
                tokio::time::sleep(CLOSE_GRACE).await;
                ua.socket().disconnect().await;
            });
            *self.0.close_task.lock().expect("Lock failed") = Some(task);
        }
    }

    /// Starts an outgoing call to `target`, carrying an optional session
    /// description.
    pub async fn call(&self, target: &str, body: Option<Bytes>) -> Result<Session> {
        let target: SipAddr = target.parse()?;
        let session = Session::new_uac(self, target, body).await?;

        self.emit(UaEvent::NewSession {
            session: session.clone(),
            originator: Originator::Local,
            replaces: None,
        });

        Ok(session)
    }

    /// Sends an out-of-dialog MESSAGE.
    pub async fn send_message(&self, target: &str, body: &str) -> Result<()> {
        let target: SipAddr = target.parse()?;
        self.send_applicant_request(SipMethod::Message, target, Some(body)).await
    }

    /// Sends an out-of-dialog OPTIONS.
    pub async fn send_options(&self, target: &str) -> Result<()> {
        let target: SipAddr = target.parse()?;
        self.send_applicant_request(SipMethod::Options, target, None).await
    }

    /// Subscribes to an event package at `target`.
    pub async fn subscribe(&self, target: &str, event: &str, expires: u32) -> Result<Subscriber> {
        let target: SipAddr = target.parse()?;
        Subscriber::subscribe(self, target, event, expires).await
    }

    async fn send_applicant_request(&self, method: SipMethod, target: SipAddr, body: Option<&str>) -> Result<()> {
        let id = self.0.next_applicant.fetch_add(1, Ordering::SeqCst);

        let from_tag = make_tag();
        let from = crate::headers::From::new_with_tag(SipAddr::Uri(self.0.config.uri.clone()), &from_tag);
        let to = crate::headers::To::new(target.clone());

        let mut request = crate::message::Request::new(method, target.uri().clone());
        let headers = &mut request.headers;
        headers.push(Header::Via(self.new_via()));
        headers.push(Header::MaxForwards(crate::headers::MaxForwards::new(70)));
        headers.push(Header::To(to));
        headers.push(Header::From(from.clone()));
        headers.push(Header::CallId(crate::headers::CallId::new(
            &uuid::Uuid::new_v4().to_string(),
        )));
        headers.push(Header::CSeq(crate::headers::CSeq::new(1, method)));
        if method == SipMethod::Message {
            headers.push(Header::ContentType(crate::headers::ContentType::new(
                crate::MediaType::new("text", "plain"),
            )));
        } else {
            headers.push(Header::Allow(self.allowed_methods()));
        }
        request.body = body.map(|b| Bytes::copy_from_slice(b.as_bytes()));

        let outgoing = OutgoingRequest {
            msg: request,
            buf: None,
            socket: self.socket(),
        };

        let tsx = crate::transaction::client::ClientTransaction::send(outgoing, self).await?;
        tsx.set_user(TsxUser::Applicant(id));

        self.0
            .applicants
            .lock()
            .expect("Lock failed")
            .insert(id, Applicant { method });

        if method == SipMethod::Message {
            self.emit(UaEvent::NewMessage {
                originator: Originator::Local,
                from,
                body: body.map(Into::into),
            });
        }

        Ok(())
    }

    // === socket lifecycle ===

    fn spawn_connect(&self, delay: Duration) {
        let ua = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if *ua.0.status.lock().expect("Lock failed") == UaStatus::UserClosed {
                return;
            }

            let attempt = ua.0.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            ua.emit(UaEvent::SocketConnecting { attempt });

            let socket = ua.socket();
            if let Err(err) = socket.connect(ua.0.socket_tx.clone()).await {
                tracing::warn!(attempt, "connect failed: {err}");
                ua.rotate_socket();
                ua.spawn_connect(ua.recovery_delay(attempt));
            }
        });
    }

    fn recovery_delay(&self, attempt: u32) -> Duration {
        let min = self.0.config.connection_recovery_min_interval;
        let max = self.0.config.connection_recovery_max_interval;
        let delay = min.saturating_mul(1 << attempt.saturating_sub(1).min(16));
        delay.min(max)
    }

    /// Moves to the next configured socket after a failure.
    fn rotate_socket(&self) {
        let sockets = &self.0.config.sockets;
        if sockets.len() < 2 {
            return;
        }
        let mut index = self.0.socket_index.lock().expect("Lock failed");
        *index = (*index + 1) % sockets.len();
        *self.0.socket.write().expect("Lock failed") = sockets[*index].clone();
    }

    async fn event_pump(self, mut rx: SocketRx) {
        while let Some(event) = rx.recv().await {
            match event {
                SocketEvent::Connecting { attempt } => {
                    self.emit(UaEvent::SocketConnecting { attempt });
                }
                SocketEvent::Connected => {
                    self.0.connect_attempts.store(0, Ordering::SeqCst);
                    {
                        let mut status = self.0.status.lock().expect("Lock failed");
                        if *status != UaStatus::UserClosed {
                            *status = UaStatus::Ready;
                        }
                    }
                    self.emit(UaEvent::SocketConnected);

                    if self.0.config.register {
                        let registration = self.registration().clone();
                        tokio::spawn(async move {
                            let _ = registration.register().await;
                        });
                    }
                }
                SocketEvent::Disconnected { error } => {
                    self.on_disconnected(error);
                }
                SocketEvent::Data(bytes) => {
                    if let Err(err) = self.receive_data(bytes).await {
                        log::warn!("Dropping invalid packet: {err}");
                    }
                }
            }
        }
    }

    fn on_disconnected(&self, error: Option<String>) {
        let reason = error.clone().unwrap_or_else(|| "Socket closed".into());
        self.0.transactions.abort_all(&reason);

        self.emit(UaEvent::SocketDisconnected { error });

        let mut status = self.0.status.lock().expect("Lock failed");
        match *status {
            UaStatus::UserClosed => {}
            _ => {
                *status = UaStatus::NotReady;
                drop(status);
                let attempt = self.0.connect_attempts.load(Ordering::SeqCst).max(1);
                self.spawn_connect(self.recovery_delay(attempt));
            }
        }
    }

    // === inbound path ===

    async fn receive_data(&self, bytes: Bytes) -> Result<()> {
        // CRLF keep-alives never reach the parser.
        if bytes.as_ref() == KEEPALIVE_PING {
            self.socket().send(KEEPALIVE_PONG).await?;
            return Ok(());
        }
        if bytes.as_ref() == KEEPALIVE_PONG {
            return Ok(());
        }

        let msg = Parser::new(&bytes).parse_sip_msg()?;

        let mut core = CoreHeaders::extract(msg.headers())?;
        let socket = self.socket();
        if let Some(addr) = socket.peer_addr() {
            // RFC 3581 §4, record where the message really came from.
            core.via.set_received(addr);
        }

        let packet = Packet {
            payload: bytes,
            time: std::time::SystemTime::now(),
        };

        match msg {
            SipMsg::Request(request) => {
                log::debug!("<= Request {} from /{}", request.method(), socket.peer_name());
                let request = IncomingRequest {
                    request,
                    socket,
                    packet,
                    transaction: None,
                    core,
                };
                self.receive_request(request).await
            }
            SipMsg::Response(response) => {
                log::debug!(
                    "<= Response ({} {})",
                    response.code().into_u16(),
                    response.reason()
                );
                let response = IncomingResponse {
                    response,
                    socket,
                    packet,
                    transaction: None,
                    core,
                };
                self.receive_response(response).await
            }
        }
    }

    /// Routes an incoming request, following RFC 3261 §8.2 and the
    /// method-specific sections.
    pub(crate) async fn receive_request(&self, mut request: IncomingRequest) -> Result<()> {
        let method = *request.method();

        // A Request-URI aimed at someone else is answered 404; ACKs are
        // never answered.
        let ruri = request.request.uri();
        let for_us = ruri
            .username()
            .is_some_and(|user| {
                self.0.config.uri.username() == Some(user) || self.0.contact_uri.username() == Some(user)
            });
        if !for_us {
            if method != SipMethod::Ack {
                self.respond_stateless(&request, StatusCode::NotFound).await?;
            }
            return Ok(());
        }

        if matches!(ruri.scheme, Scheme::Sips) && !request.socket.secure() {
            if method != SipMethod::Ack {
                self.respond_stateless(&request, StatusCode::UnsupportedUriScheme).await?;
            }
            return Ok(());
        }

        // A matching server transaction absorbs retransmissions (and the
        // ACK to a non-2xx).
        if self.0.transactions.handle_request(&request).await? {
            return Ok(());
        }

        match method {
            SipMethod::Invite => {
                InvServerTransaction::new(self, &mut request)?;
            }
            SipMethod::Ack | SipMethod::Cancel => {}
            _ => {
                ServerTransaction::new(self, &mut request)?;
            }
        }

        if request.to().tag().is_none() {
            self.receive_out_of_dialog(request, method).await
        } else {
            self.receive_in_dialog(request, method).await
        }
    }

    async fn receive_out_of_dialog(&self, mut request: IncomingRequest, method: SipMethod) -> Result<()> {
        match method {
            SipMethod::Options => {
                let from = request.from().clone();
                self.respond(&mut request, StatusCode::Ok).await?;
                self.emit(UaEvent::NewOptions { from });
                Ok(())
            }
            SipMethod::Message => {
                let from = request.from().clone();
                let body = request
                    .body()
                    .and_then(|b| std::str::from_utf8(b).ok())
                    .map(ArcStr::from);
                self.respond(&mut request, StatusCode::Ok).await?;
                self.emit(UaEvent::NewMessage {
                    originator: Originator::Remote,
                    from,
                    body,
                });
                Ok(())
            }
            SipMethod::Invite => self.receive_new_invite(request).await,
            SipMethod::Bye => self.respond(&mut request, StatusCode::CallOrTransactionDoesNotExist).await,
            SipMethod::Cancel => {
                // Correlate with the open invite by Call-ID and the
                // caller's tag.
                let session = self.find_session_by_remote_tag(
                    request.call_id().id(),
                    request.from().tag().unwrap_or_default(),
                );
                match session {
                    Some(session) => {
                        self.respond_stateless(&request, StatusCode::Ok).await?;
                        session.receive_cancel(&mut request).await
                    }
                    None => {
                        self.respond_stateless(&request, StatusCode::CallOrTransactionDoesNotExist)
                            .await
                    }
                }
            }
            SipMethod::Ack => Ok(()),
            SipMethod::Notify => {
                // An out-of-dialog NOTIFY still gets surfaced.
                let from = request.from().clone();
                let event = request.request.headers.find_map(|h| h.as_event()).cloned();
                let body = request
                    .body()
                    .and_then(|b| std::str::from_utf8(b).ok())
                    .map(ArcStr::from);
                self.respond(&mut request, StatusCode::Ok).await?;
                self.emit(UaEvent::SipEvent { event, from, body });
                Ok(())
            }
            SipMethod::Subscribe => {
                let from = request.from().clone();
                let event = request.request.headers.find_map(|h| h.as_event()).cloned();
                self.respond(&mut request, StatusCode::MethodNotAllowed).await?;
                self.emit(UaEvent::NewSubscribe { event, from });
                Ok(())
            }
            _ => self.respond(&mut request, StatusCode::MethodNotAllowed).await,
        }
    }

    async fn receive_new_invite(&self, mut request: IncomingRequest) -> Result<()> {
        // RFC 3891, an INVITE with Replaces targets an existing dialog.
        let replaces = request.request.headers.find_map(|h| h.as_replaces()).cloned();
        let replaced_session = match &replaces {
            None => None,
            Some(replaces) => {
                let id = DialogId::new(replaces.call_id(), replaces.to_tag(), replaces.from_tag());
                match self.find_dialog(&id) {
                    Some(DialogOwner::Session(session)) => {
                        if session.state() == SessionState::Terminated {
                            self.respond(&mut request, StatusCode::Decline).await?;
                            return Ok(());
                        }
                        Some(session)
                    }
                    _ => {
                        self.respond(&mut request, StatusCode::CallOrTransactionDoesNotExist)
                            .await?;
                        return Ok(());
                    }
                }
            }
        };

        let session = Session::new_uas(self, request).await?;

        self.emit(UaEvent::NewSession {
            session,
            originator: Originator::Remote,
            replaces: replaced_session,
        });

        Ok(())
    }

    async fn receive_in_dialog(&self, mut request: IncomingRequest, method: SipMethod) -> Result<()> {
        let call_id = request.call_id().id();
        let local_tag = request.to().tag().unwrap_or_default();
        let remote_tag = request.from().tag().unwrap_or_default();

        let id = DialogId::new(call_id, local_tag, remote_tag);
        let owner = self.find_dialog(&id);

        match owner {
            Some(DialogOwner::Session(session)) => session.receive_request(request).await,
            Some(DialogOwner::Subscriber(subscriber)) => {
                if method == SipMethod::Notify {
                    subscriber.receive_notify(&mut request).await
                } else {
                    self.respond(&mut request, StatusCode::MethodNotAllowed).await
                }
            }
            None if method == SipMethod::Notify => {
                // The NOTIFY may beat the 200 to our SUBSCRIBE; match on
                // Call-ID and our tag.
                let subscriber = {
                    let subscribers = self.0.subscribers.lock().expect("Lock failed");
                    subscribers
                        .values()
                        .find(|s| s.call_id().as_ref() == call_id && s.local_tag().as_ref() == local_tag)
                        .cloned()
                };
                match subscriber {
                    Some(subscriber) => subscriber.receive_notify(&mut request).await,
                    None => self.respond(&mut request, StatusCode::CallOrTransactionDoesNotExist).await,
                }
            }
            None if method == SipMethod::Ack => Ok(()),
            None => self.respond(&mut request, StatusCode::CallOrTransactionDoesNotExist).await,
        }
    }

    /// Routes an incoming response through the transaction layer;
    /// responses that match nothing are discarded.
    pub(crate) async fn receive_response(&self, response: IncomingResponse) -> Result<()> {
        let Some(tsx) = self.0.transactions.handle_response(&response).await? else {
            log::debug!(
                "Response ({} {}) matched no transaction",
                response.code().into_u16(),
                response.response.reason()
            );
            return Ok(());
        };

        match tsx.user() {
            Some(TsxUser::Registration) => {
                self.registration().on_response(&response).await;
                Ok(())
            }
            Some(TsxUser::Session(id)) => {
                if let Some(session) = self.find_session(&id) {
                    session.receive_invite_response(&response).await?;
                }
                Ok(())
            }
            Some(TsxUser::Subscriber(key)) => {
                let subscriber = self.0.subscribers.lock().expect("Lock failed").get(&key).cloned();
                if let Some(subscriber) = subscriber {
                    subscriber.on_response(&response).await?;
                }
                Ok(())
            }
            Some(TsxUser::Applicant(id)) => {
                if response.code().is_final() {
                    if let Some(applicant) = self.0.applicants.lock().expect("Lock failed").remove(&id) {
                        log::debug!(
                            "{} applicant finished with {}",
                            applicant.method,
                            response.code().into_u16()
                        );
                    }
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    // === transaction user callbacks ===

    pub(crate) fn on_tsx_timeout(&self, user: TsxUser) {
        self.dispatch_tsx_failure(user, EndReason::local("Request Timeout"));
    }

    pub(crate) fn on_tsx_transport_error(&self, user: TsxUser) {
        self.dispatch_tsx_failure(user, EndReason::local("Transport Error"));
    }

    fn dispatch_tsx_failure(&self, user: TsxUser, reason: EndReason) {
        match user {
            TsxUser::Registration => self.registration().on_transaction_failure(reason),
            TsxUser::Session(id) => {
                if let Some(session) = self.find_session(&id) {
                    session.on_transaction_failure(reason);
                }
            }
            TsxUser::Subscriber(key) => {
                let subscriber = self.0.subscribers.lock().expect("Lock failed").get(&key).cloned();
                if let Some(subscriber) = subscriber {
                    subscriber.on_transaction_failure(reason);
                }
            }
            TsxUser::Applicant(id) => {
                self.0.applicants.lock().expect("Lock failed").remove(&id);
            }
        }
    }

    // === builders ===

    /// A fresh topmost Via for an outgoing request.
    pub(crate) fn new_via(&self) -> Via {
        Via::new(
            self.socket().tp_kind(),
            self.0.via_host.clone(),
            Some(&make_branch()),
        )
    }

    /// The Contact header advertised in requests and 2xx answers.
    pub(crate) fn local_contact(&self) -> Contact {
        let mut params = None;
        if let Some(instance) = &self.0.config.instance_id {
            let mut list = Params::new();
            list.push(Param::new("+sip.instance", Some(&format!("\"<{}>\"", instance))));
            params = Some(list);
        }

        Contact::Addr(ContactAddr {
            addr: SipAddr::Uri(self.0.contact_uri.clone()),
            q: None,
            expires: None,
            params,
        })
    }

    pub(crate) fn local_contact_user(&self) -> String {
        self.0.contact_uri.username().unwrap_or_default().to_string()
    }

    /// The methods this agent advertises in `Allow`.
    pub(crate) fn allowed_methods(&self) -> Allow {
        Allow::from([
            SipMethod::Invite,
            SipMethod::Ack,
            SipMethod::Cancel,
            SipMethod::Bye,
            SipMethod::Options,
            SipMethod::Message,
            SipMethod::Notify,
        ])
    }

    /// The option tags this agent advertises in `Supported`.
    pub(crate) fn supported_extensions(&self) -> Supported {
        if self.0.config.session_timers_enabled {
            Supported::from(["outbound", "timer"])
        } else {
            Supported::from(["outbound"])
        }
    }

    /// Builds a response to `request` with the mandatory headers copied
    /// over: the Via chain, Record-Route, Call-ID, From, To and CSeq
    /// (RFC 3261 §8.2.6).
    pub(crate) fn new_response(
        &self,
        request: &IncomingRequest,
        code: StatusCode,
        to_tag: Option<&str>,
    ) -> OutgoingResponse {
        let mut headers = crate::headers::Headers::with_capacity(7);
        let msg_headers = &request.request.headers;

        // The topmost Via carries the stamped `received`; the rest of the
        // chain is copied as-is.
        headers.push(Header::Via(request.core.via.clone()));
        headers.extend(
            msg_headers
                .iter()
                .filter(|h| matches!(h, Header::Via(_)))
                .skip(1)
                .cloned(),
        );

        let rr = msg_headers.iter().filter(|h| matches!(h, Header::RecordRoute(_)));
        headers.extend(rr.cloned());

        headers.push(Header::CallId(request.core.call_id.clone()));
        headers.push(Header::From(request.core.from.clone()));

        let mut to = request.core.to.clone();
        if to.tag().is_none() {
            match to_tag {
                Some(tag) => to.set_tag(Some(tag)),
                None => {
                    // 8.2.6.2 Headers and Tags
                    // The UAS MUST add a tag to the To header field in
                    // the response (with the exception of the 100 (Trying)
                    // response, in which a tag MAY be present).
                    if code.into_u16() > 100 {
                        to.set_tag(request.core.via.branch());
                    }
                }
            }
        }
        headers.push(Header::To(to));
        headers.push(Header::CSeq(request.core.cseq));

        let status_line = StatusLine::new(code, code.reason());

        OutgoingResponse {
            response: Response {
                status_line,
                headers,
                body: None,
            },
            buf: None,
            socket: request.socket.clone(),
        }
    }

    /// Answers `request` through its server transaction when it has one,
    /// statelessly otherwise.
    pub(crate) async fn respond(&self, request: &mut IncomingRequest, code: StatusCode) -> Result<()> {
        let mut response = self.new_response(request, code, None);
        if code == StatusCode::MethodNotAllowed {
            response.headers_mut().push(Header::Allow(self.allowed_methods()));
        }

        match request.transaction.take() {
            Some(ServerTsx::NonInvite(tsx)) => tsx.respond(&mut response).await,
            Some(ServerTsx::Invite(tsx)) => tsx.respond(&mut response).await,
            None => self.send_response_stateless(response).await,
        }
    }

    async fn respond_stateless(&self, request: &IncomingRequest, code: StatusCode) -> Result<()> {
        let response = self.new_response(request, code, None);
        self.send_response_stateless(response).await
    }

    pub(crate) async fn send_response_stateless(&self, response: OutgoingResponse) -> Result<()> {
        log::debug!(
            "=> Response {} {}",
            response.status_code().into_u16(),
            response.reason()
        );
        let buf = response.to_bytes()?;
        response.socket.send(&buf).await?;
        Ok(())
    }

    /// Sends a request outside of any transaction (the 2xx ACK).
    pub(crate) async fn send_request_stateless(&self, request: OutgoingRequest) -> Result<()> {
        log::debug!("<= Request {} (stateless)", request.msg.method());
        let buf = request.to_bytes()?;
        request.socket.send(&buf).await?;
        Ok(())
    }

    // === shared state ===

    pub(crate) fn tsx_layer(&self) -> &TransactionLayer {
        &self.0.transactions
    }

    pub(crate) fn socket(&self) -> Arc<dyn Socket> {
        self.0.socket.read().expect("Lock failed").clone()
    }

    pub(crate) fn emit(&self, event: UaEvent) {
        let _ = self.0.events.send(event);
    }

    pub(crate) fn add_session(&self, session: Session) {
        let key = session.id().as_key();
        self.0.sessions.lock().expect("Lock failed").insert(key, session);
    }

    pub(crate) fn remove_session(&self, id: &SessionId) {
        self.0.sessions.lock().expect("Lock failed").remove(&id.as_key());
    }

    pub(crate) fn find_session(&self, id: &SessionId) -> Option<Session> {
        self.0.sessions.lock().expect("Lock failed").get(&id.as_key()).cloned()
    }

    /// The secondary session lookup used for CANCEL correlation: the
    /// caller only knows its own (remote, to us) tag.
    fn find_session_by_remote_tag(&self, call_id: &str, remote_tag: &str) -> Option<Session> {
        let sessions = self.0.sessions.lock().expect("Lock failed");
        sessions
            .values()
            .find(|session| {
                session.id().call_id.as_ref() == call_id
                    && session
                        .remote_tag()
                        .is_some_and(|tag| tag.as_ref() == remote_tag)
            })
            .cloned()
    }

    pub(crate) fn register_dialog(&self, id: DialogId, session: Session) {
        self.0
            .dialogs
            .lock()
            .expect("Lock failed")
            .insert(id.as_key(), DialogOwner::Session(session));
    }

    pub(crate) fn register_subscription_dialog(&self, id: DialogId, subscriber: Subscriber) {
        self.0
            .dialogs
            .lock()
            .expect("Lock failed")
            .insert(id.as_key(), DialogOwner::Subscriber(subscriber));
    }

    pub(crate) fn remove_dialog(&self, id: &DialogId) {
        let mut dialogs = self.0.dialogs.lock().expect("Lock failed");
        dialogs.remove(&id.as_key());
        dialogs.remove(&id.swapped_key());
    }

    /// Looks a dialog up by its identity, trying both tag orderings so
    /// requests from either peer match.
    fn find_dialog(&self, id: &DialogId) -> Option<DialogOwner> {
        let dialogs = self.0.dialogs.lock().expect("Lock failed");
        dialogs
            .get(&id.as_key())
            .or_else(|| dialogs.get(&id.swapped_key()))
            .cloned()
    }

    pub(crate) fn add_subscriber(&self, subscriber: Subscriber) {
        self.0
            .subscribers
            .lock()
            .expect("Lock failed")
            .insert(subscriber.key().clone(), subscriber);
    }

    pub(crate) fn remove_subscriber(&self, key: &ArcStr) {
        self.0.subscribers.lock().expect("Lock failed").remove(key);
    }
}

#[cfg(test)]
mod tests;
