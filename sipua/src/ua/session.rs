//! Invite sessions.
//!
//! A [`Session`] is one call leg: the INVITE exchange, the dialog it
//! creates and the requests that live inside it (ACK, BYE, CANCEL,
//! re-INVITE). Media negotiation itself happens outside; session bodies
//! are carried opaquely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use sipua_util::ArcStr;
use tokio::task::JoinHandle;

use crate::error::{EndReason, Error, Result};
use crate::headers::{CSeq, CallId, ContentType, Header, SessionExpires, To, Via};
use crate::message::{Request, SipAddr, SipMethod, StatusCode, Uri};
use crate::transaction::client::ClientTransaction;
use crate::transaction::inv_client::InvClientTransaction;
use crate::transaction::inv_server::InvServerTransaction;
use crate::transaction::ServerTsx;
use crate::transport::{IncomingRequest, IncomingResponse, OutgoingRequest};
use crate::ua::dialog::Dialog;
use crate::ua::{Originator, TsxUser, UaEvent, UserAgent};
use crate::MediaType;

/// Identifies a session: the Call-ID plus the tag this agent
/// contributed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId {
    /// The Call-ID of the session's dialog.
    pub call_id: ArcStr,
    /// The local tag.
    pub tag: ArcStr,
}

impl SessionId {
    pub(crate) fn as_key(&self) -> String {
        format!("{}|{}", self.call_id, self.tag)
    }
}

/// The lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// INVITE sent or received, no response yet.
    Initial,
    /// A provisional response was sent or received.
    Progress,
    /// A 2xx was sent or received but not acknowledged yet.
    Accepted,
    /// The 2xx was acknowledged.
    Confirmed,
    /// The session is over.
    Terminated,
}

/// Context the UAC keeps to build the CANCEL and the 2xx ACK.
struct UacContext {
    uri: Uri,
    via: Via,
    from: crate::headers::From,
    to: To,
    call_id: CallId,
    cseq: u32,
}

struct Inner {
    ua: UserAgent,
    id: SessionId,
    direction: Originator,
    state: Mutex<SessionState>,
    remote_tag: Mutex<Option<ArcStr>>,
    dialog: Mutex<Option<Arc<Dialog>>>,
    /// Our session description, replayed when answering a re-INVITE.
    local_body: Mutex<Option<Bytes>>,
    /// UAS: the transaction of the original INVITE.
    uas_tsx: Mutex<Option<InvServerTransaction>>,
    /// UAS: the original INVITE, used to build responses.
    uas_request: Mutex<Option<IncomingRequest>>,
    /// UAC: what is needed to CANCEL or ACK the INVITE.
    uac_ctx: Mutex<Option<UacContext>>,
    /// The user asked to cancel before a provisional response arrived.
    cancel_requested: AtomicBool,
    /// A CANCEL has been put on the wire.
    cancel_sent: AtomicBool,
    /// A re-INVITE of ours is outstanding (491 on collision).
    reinvite_outstanding: AtomicBool,
    /// UAS: the ring timeout task.
    no_answer_timer: Mutex<Option<JoinHandle<()>>>,
}

/// One call leg.
///
/// Obtained from [`UserAgent::call`] for outgoing calls or from the
/// [`UaEvent::NewSession`] event for incoming ones.
#[derive(Clone)]
pub struct Session(Arc<Inner>);

impl Session {
    /// Starts an outgoing call.
    pub(crate) async fn new_uac(ua: &UserAgent, target: SipAddr, body: Option<Bytes>) -> Result<Session> {
        let local_tag: ArcStr = crate::ua::make_tag().as_str().into();
        let call_id: ArcStr = uuid::Uuid::new_v4().to_string().as_str().into();
        let cseq = 1;

        let config = ua.config();
        let mut from_addr = SipAddr::Uri(config.uri.clone());
        if let Some(display) = &config.display_name {
            from_addr = SipAddr::NameAddr(crate::message::NameAddr {
                display: Some(display.as_str().into()),
                uri: config.uri.clone(),
            });
        }

        let from = crate::headers::From::new_with_tag(from_addr, &local_tag);
        let to = To::new(target.clone());
        let via = ua.new_via();
        let uri = target.uri().clone();

        let mut request = Request::new(SipMethod::Invite, uri.clone());
        let headers = &mut request.headers;
        headers.push(Header::Via(via.clone()));
        headers.push(Header::MaxForwards(crate::headers::MaxForwards::new(70)));
        headers.push(Header::To(to.clone()));
        headers.push(Header::From(from.clone()));
        headers.push(Header::CallId(CallId::new(&call_id)));
        headers.push(Header::CSeq(CSeq::new(cseq, SipMethod::Invite)));
        headers.push(Header::Contact(ua.local_contact()));
        headers.push(Header::Allow(ua.allowed_methods()));
        headers.push(Header::Supported(ua.supported_extensions()));
        if config.session_timers_enabled {
            headers.push(Header::SessionExpires(SessionExpires::new(1800, None)));
        }
        if body.is_some() {
            headers.push(Header::ContentType(ContentType::new(MediaType::new("application", "sdp"))));
        }
        request.body = body.clone();

        let id = SessionId {
            call_id: call_id.clone(),
            tag: local_tag,
        };

        let session = Session(Arc::new(Inner {
            ua: ua.clone(),
            id: id.clone(),
            direction: Originator::Local,
            state: Mutex::new(SessionState::Initial),
            remote_tag: Mutex::new(None),
            dialog: Mutex::new(None),
            local_body: Mutex::new(body),
            uas_tsx: Mutex::new(None),
            uas_request: Mutex::new(None),
            uac_ctx: Mutex::new(Some(UacContext {
                uri,
                via,
                from,
                to,
                call_id: CallId::new(&call_id),
                cseq,
            })),
            cancel_requested: AtomicBool::new(false),
            cancel_sent: AtomicBool::new(false),
            reinvite_outstanding: AtomicBool::new(false),
            no_answer_timer: Mutex::new(None),
        }));

        let outgoing = OutgoingRequest {
            msg: request,
            buf: None,
            socket: ua.socket(),
        };

        let tsx = InvClientTransaction::send(outgoing, ua).await?;
        tsx.set_user(TsxUser::Session(id));

        ua.add_session(session.clone());

        Ok(session)
    }

    /// Accepts an incoming INVITE, answering 100 Trying right away.
    pub(crate) async fn new_uas(ua: &UserAgent, mut request: IncomingRequest) -> Result<Session> {
        let local_tag: ArcStr = crate::ua::make_tag().as_str().into();

        let Some(ServerTsx::Invite(tsx)) = request.transaction.take() else {
            return Err(Error::InvalidState("INVITE without a server transaction".into()));
        };

        let id = SessionId {
            call_id: request.call_id().id().into(),
            tag: local_tag.clone(),
        };
        let remote_tag: Option<ArcStr> = request.from().tag().map(Into::into);

        let dialog = Dialog::new_uas(&request, ua.config().uri.clone(), &local_tag)?;

        // 100 Trying goes out before the application sees the session.
        let mut trying = ua.new_response(&request, StatusCode::Trying, None);
        tsx.respond(&mut trying).await?;

        let session = Session(Arc::new(Inner {
            ua: ua.clone(),
            id: id.clone(),
            direction: Originator::Remote,
            state: Mutex::new(SessionState::Initial),
            remote_tag: Mutex::new(remote_tag),
            dialog: Mutex::new(Some(Arc::new(dialog))),
            local_body: Mutex::new(None),
            uas_tsx: Mutex::new(Some(tsx)),
            uas_request: Mutex::new(Some(request)),
            uac_ctx: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
            cancel_sent: AtomicBool::new(false),
            reinvite_outstanding: AtomicBool::new(false),
            no_answer_timer: Mutex::new(None),
        }));

        session.register_dialog();
        session.arm_no_answer_timer();
        ua.add_session(session.clone());

        Ok(session)
    }

    /// Returns the session identity.
    pub fn id(&self) -> &SessionId {
        &self.0.id
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        *self.0.state.lock().expect("Lock failed")
    }

    /// Returns who initiated the session.
    pub fn direction(&self) -> Originator {
        self.0.direction
    }

    /// Returns the remote session description offered in the INVITE, for
    /// incoming sessions.
    pub fn remote_body(&self) -> Option<Bytes> {
        let request = self.0.uas_request.lock().expect("Lock failed");
        request.as_ref().and_then(|r| r.request.body.clone())
    }

    pub(crate) fn remote_tag(&self) -> Option<ArcStr> {
        self.0.remote_tag.lock().expect("Lock failed").clone()
    }

    pub(crate) fn dialog(&self) -> Option<Arc<Dialog>> {
        self.0.dialog.lock().expect("Lock failed").clone()
    }

    fn set_state(&self, state: SessionState) {
        *self.0.state.lock().expect("Lock failed") = state;
    }

    fn register_dialog(&self) {
        if let Some(dialog) = self.dialog() {
            self.0.ua.register_dialog(dialog.id().clone(), self.clone());
        }
    }

    fn arm_no_answer_timer(&self) {
        let session = self.clone();
        let timeout = self.0.ua.config().no_answer_timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if matches!(session.state(), SessionState::Initial | SessionState::Progress) {
                tracing::info!("incoming call unanswered, rejecting");
                let _ = session.reject(StatusCode::TemporarilyUnavailable).await;
            }
        });

        *self.0.no_answer_timer.lock().expect("Lock failed") = Some(handle);
    }

    fn disarm_no_answer_timer(&self) {
        if let Some(handle) = self.0.no_answer_timer.lock().expect("Lock failed").take() {
            handle.abort();
        }
    }

    /// Sends a 180 Ringing (UAS).
    pub async fn progress(&self) -> Result<()> {
        if self.0.direction != Originator::Remote {
            return Err(Error::InvalidState("progress() is for incoming sessions".into()));
        }
        if !matches!(self.state(), SessionState::Initial | SessionState::Progress) {
            return Err(Error::InvalidState("Session already answered".into()));
        }

        let (tsx, mut response) = {
            let tsx = self.0.uas_tsx.lock().expect("Lock failed").clone();
            let request = self.0.uas_request.lock().expect("Lock failed");
            let (Some(tsx), Some(request)) = (tsx, request.as_ref()) else {
                return Err(Error::InvalidState("Session has no pending INVITE".into()));
            };
            (tsx, self.0.ua.new_response(request, StatusCode::Ringing, Some(&self.0.id.tag)))
        };

        tsx.respond(&mut response).await?;
        self.set_state(SessionState::Progress);
        self.0.ua.emit(UaEvent::SessionProgress { id: self.0.id.clone() });

        Ok(())
    }

    /// Answers an incoming session with a 2xx carrying `body`.
    pub async fn answer(&self, body: Option<Bytes>) -> Result<()> {
        if self.0.direction != Originator::Remote {
            return Err(Error::InvalidState("answer() is for incoming sessions".into()));
        }
        if !matches!(self.state(), SessionState::Initial | SessionState::Progress) {
            return Err(Error::InvalidState("Session already answered".into()));
        }

        self.disarm_no_answer_timer();

        let (tsx, mut response) = {
            let tsx = self.0.uas_tsx.lock().expect("Lock failed").clone();
            let request = self.0.uas_request.lock().expect("Lock failed");
            let (Some(tsx), Some(request)) = (tsx, request.as_ref()) else {
                return Err(Error::InvalidState("Session has no pending INVITE".into()));
            };
            (tsx, self.0.ua.new_response(request, StatusCode::Ok, Some(&self.0.id.tag)))
        };

        response
            .headers_mut()
            .push(Header::Contact(self.0.ua.local_contact()));
        if let Some(body) = &body {
            response
                .headers_mut()
                .push(Header::ContentType(ContentType::new(MediaType::new("application", "sdp"))));
            response.set_body(body.clone());
        }
        *self.0.local_body.lock().expect("Lock failed") = body;

        tsx.respond(&mut response).await?;
        self.set_state(SessionState::Accepted);

        Ok(())
    }

    /// Rejects an incoming, unanswered session.
    pub async fn reject(&self, code: StatusCode) -> Result<()> {
        if self.0.direction != Originator::Remote {
            return Err(Error::InvalidState("reject() is for incoming sessions".into()));
        }
        if !matches!(self.state(), SessionState::Initial | SessionState::Progress) {
            return Err(Error::InvalidState("Session already answered".into()));
        }

        self.disarm_no_answer_timer();

        let (tsx, mut response) = {
            let tsx = self.0.uas_tsx.lock().expect("Lock failed").clone();
            let request = self.0.uas_request.lock().expect("Lock failed");
            let (Some(tsx), Some(request)) = (tsx, request.as_ref()) else {
                return Err(Error::InvalidState("Session has no pending INVITE".into()));
            };
            (tsx, self.0.ua.new_response(request, code, Some(&self.0.id.tag)))
        };

        tsx.respond(&mut response).await?;
        self.end(EndReason::local(code.reason()));

        Ok(())
    }

    /// Ends the session, whatever state it is in: CANCEL before the
    /// final response, a rejection for an unanswered incoming call, BYE
    /// once confirmed.
    pub async fn terminate(&self) -> Result<()> {
        match (self.0.direction, self.state()) {
            (_, SessionState::Terminated) => Ok(()),
            (Originator::Local, SessionState::Initial | SessionState::Progress) => self.cancel().await,
            (Originator::Remote, SessionState::Initial | SessionState::Progress) => {
                self.reject(StatusCode::TemporarilyUnavailable).await
            }
            (_, SessionState::Accepted | SessionState::Confirmed) => self.bye().await,
        }
    }

    /// Sends a re-INVITE with a new session description.
    pub async fn renegotiate(&self, body: Bytes) -> Result<()> {
        if self.state() != SessionState::Confirmed {
            return Err(Error::InvalidState("Session is not confirmed".into()));
        }
        let Some(dialog) = self.dialog() else {
            return Err(Error::InvalidState("Session has no dialog".into()));
        };

        if self.0.reinvite_outstanding.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidState("A re-INVITE is already outstanding".into()));
        }

        let mut request = self.in_dialog_request(&dialog, SipMethod::Invite, None)?;
        request
            .headers
            .push(Header::ContentType(ContentType::new(MediaType::new("application", "sdp"))));
        request.body = Some(body.clone());
        *self.0.local_body.lock().expect("Lock failed") = Some(body);

        let outgoing = OutgoingRequest {
            msg: request,
            buf: None,
            socket: self.0.ua.socket(),
        };

        let tsx = match InvClientTransaction::send(outgoing, &self.0.ua).await {
            Ok(tsx) => tsx,
            Err(err) => {
                self.0.reinvite_outstanding.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };
        tsx.set_user(TsxUser::Session(self.0.id.clone()));

        Ok(())
    }

    /// Builds an in-dialog request with the full header set.
    fn in_dialog_request(&self, dialog: &Dialog, method: SipMethod, reuse_cseq: Option<u32>) -> Result<Request> {
        let mut request = dialog.create_request(method, reuse_cseq)?;
        let (from, to) = dialog.local_identity();

        let headers = &mut request.headers;
        headers.push(Header::Via(self.0.ua.new_via()));
        headers.push(Header::MaxForwards(crate::headers::MaxForwards::new(70)));
        headers.push(Header::To(to));
        headers.push(Header::From(from));
        headers.push(Header::CallId(CallId::new(&self.0.id.call_id)));
        headers.push(Header::Contact(self.0.ua.local_contact()));

        Ok(request)
    }

    async fn bye(&self) -> Result<()> {
        let Some(dialog) = self.dialog() else {
            self.end(EndReason::local("Terminated"));
            return Ok(());
        };

        let request = self.in_dialog_request(&dialog, SipMethod::Bye, None)?;
        let outgoing = OutgoingRequest {
            msg: request,
            buf: None,
            socket: self.0.ua.socket(),
        };

        let tsx = ClientTransaction::send(outgoing, &self.0.ua).await?;
        tsx.set_user(TsxUser::Session(self.0.id.clone()));

        self.end(EndReason::local("Terminated"));

        Ok(())
    }

    /// Cancels the outgoing INVITE. Before the first provisional
    /// response the CANCEL is held back and fired once one arrives.
    async fn cancel(&self) -> Result<()> {
        self.0.cancel_requested.store(true, Ordering::SeqCst);

        if self.state() == SessionState::Initial {
            // RFC 3261 §9.1, wait for a provisional response.
            return Ok(());
        }

        self.send_cancel().await
    }

    async fn send_cancel(&self) -> Result<()> {
        if self.0.cancel_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let request = {
            let ctx = self.0.uac_ctx.lock().expect("Lock failed");
            let Some(ctx) = ctx.as_ref() else {
                return Err(Error::InvalidState("No INVITE to cancel".into()));
            };

            // The CANCEL copies the INVITE identity, branch included
            // (RFC 3261 §9.1).
            let mut request = Request::new(SipMethod::Cancel, ctx.uri.clone());
            let headers = &mut request.headers;
            headers.push(Header::Via(ctx.via.clone()));
            headers.push(Header::MaxForwards(crate::headers::MaxForwards::new(70)));
            headers.push(Header::To(ctx.to.clone()));
            headers.push(Header::From(ctx.from.clone()));
            headers.push(Header::CallId(ctx.call_id.clone()));
            headers.push(Header::CSeq(CSeq::new(ctx.cseq, SipMethod::Cancel)));
            request
        };

        let outgoing = OutgoingRequest {
            msg: request,
            buf: None,
            socket: self.0.ua.socket(),
        };

        let tsx = ClientTransaction::send(outgoing, &self.0.ua).await?;
        tsx.set_user(TsxUser::Session(self.0.id.clone()));

        Ok(())
    }

    /// Handles a response to our INVITE (or re-INVITE).
    pub(crate) async fn receive_invite_response(&self, response: &IncomingResponse) -> Result<()> {
        if response.cseq().method() == &SipMethod::Cancel {
            // The 200 to our CANCEL; the 487 on the INVITE follows.
            return Ok(());
        }
        if response.cseq().method() == &SipMethod::Bye {
            return Ok(());
        }

        let code = response.code();

        if self.0.reinvite_outstanding.load(Ordering::SeqCst) && self.state() == SessionState::Confirmed {
            return self.receive_reinvite_response(response).await;
        }

        match code {
            code if code.is_provisional() => {
                if code != StatusCode::Trying {
                    if let Some(tag) = response.to().tag() {
                        self.set_remote_tag(tag);
                        // An early dialog needs a remote target; some
                        // stacks send tagged 18x without a Contact.
                        if response.response.headers.find_map(|h| h.as_contact()).is_some() {
                            self.create_uac_dialog(response, false)?;
                        }
                    }
                    self.set_state(SessionState::Progress);
                    self.0.ua.emit(UaEvent::SessionProgress { id: self.0.id.clone() });
                }

                if self.0.cancel_requested.load(Ordering::SeqCst) {
                    self.send_cancel().await?;
                }
                Ok(())
            }
            code if code.is_success() => {
                let Some(tag) = response.to().tag() else {
                    return Err(Error::InvalidState("2xx without to-tag".into()));
                };
                self.set_remote_tag(tag);
                self.create_uac_dialog(response, true)?;

                self.send_ack(response).await?;

                let body = response
                    .response
                    .body
                    .as_ref()
                    .and_then(|b| std::str::from_utf8(b).ok())
                    .map(ArcStr::from);

                self.set_state(SessionState::Confirmed);
                self.0.ua.emit(UaEvent::SessionAccepted {
                    id: self.0.id.clone(),
                    body,
                });
                self.0.ua.emit(UaEvent::SessionConfirmed { id: self.0.id.clone() });
                Ok(())
            }
            _ => {
                // Final failure; the transaction already sent the ACK.
                let canceled = self.0.cancel_requested.load(Ordering::SeqCst)
                    && code == StatusCode::RequestTerminated;
                let reason = if canceled {
                    EndReason {
                        cause: "Canceled".into(),
                        status_code: code.into_u16(),
                        reason_phrase: response.response.reason().into(),
                    }
                } else {
                    EndReason::peer(code.into_u16(), response.response.reason())
                };
                self.end(reason);
                Ok(())
            }
        }
    }

    async fn receive_reinvite_response(&self, response: &IncomingResponse) -> Result<()> {
        let code = response.code();
        if code.is_provisional() {
            return Ok(());
        }

        self.0.reinvite_outstanding.store(false, Ordering::SeqCst);

        if code.is_success() {
            self.send_ack(response).await?;
        } else {
            tracing::info!(code = code.into_u16(), "re-INVITE rejected");
        }

        Ok(())
    }

    fn set_remote_tag(&self, tag: &str) {
        let mut remote_tag = self.0.remote_tag.lock().expect("Lock failed");
        if remote_tag.is_none() {
            *remote_tag = Some(tag.into());
        }
    }

    fn create_uac_dialog(&self, response: &IncomingResponse, confirmed: bool) -> Result<()> {
        let mut dialog = self.0.dialog.lock().expect("Lock failed");
        match dialog.as_ref() {
            Some(existing) => {
                if confirmed {
                    existing.confirm();
                }
                Ok(())
            }
            None => {
                let ctx = self.0.uac_ctx.lock().expect("Lock failed");
                let Some(ctx) = ctx.as_ref() else {
                    return Err(Error::InvalidState("No INVITE context".into()));
                };

                let created = Dialog::new_uac(
                    self.0.ua.config().uri.clone(),
                    &ctx.uri,
                    ctx.cseq,
                    response,
                )?;
                let created = Arc::new(created);
                *dialog = Some(created.clone());
                drop(dialog);
                drop(ctx);

                self.0.ua.register_dialog(created.id().clone(), self.clone());
                Ok(())
            }
        }
    }

    /// The ACK for a 2xx, built by the dialog layer (RFC 3261 §13.2.2.4).
    async fn send_ack(&self, _response: &IncomingResponse) -> Result<()> {
        let Some(dialog) = self.dialog() else {
            return Err(Error::InvalidState("No dialog to ACK in".into()));
        };
        let invite_cseq = {
            let ctx = self.0.uac_ctx.lock().expect("Lock failed");
            match ctx.as_ref() {
                Some(ctx) => ctx.cseq,
                None => dialog.local_seq(),
            }
        };

        let request = self.in_dialog_request(&dialog, SipMethod::Ack, Some(invite_cseq))?;
        let outgoing = OutgoingRequest {
            msg: request,
            buf: None,
            socket: self.0.ua.socket(),
        };

        self.0.ua.send_request_stateless(outgoing).await
    }

    /// Handles a request arriving inside the session's dialog.
    pub(crate) async fn receive_request(&self, mut request: IncomingRequest) -> Result<()> {
        if let Some(dialog) = self.dialog() {
            if !dialog.check_remote_seq(request.cseq().cseq(), request.method()) {
                return self.0.ua.respond(&mut request, StatusCode::ServerInternalError).await;
            }
        }

        match *request.method() {
            SipMethod::Ack => {
                if self.state() == SessionState::Accepted {
                    if let Some(dialog) = self.dialog() {
                        dialog.confirm();
                    }
                    self.set_state(SessionState::Confirmed);
                    self.0.ua.emit(UaEvent::SessionConfirmed { id: self.0.id.clone() });
                }
                Ok(())
            }
            SipMethod::Bye => {
                self.0.ua.respond(&mut request, StatusCode::Ok).await?;
                self.end(EndReason::local("Terminated"));
                Ok(())
            }
            SipMethod::Cancel => {
                self.receive_cancel(&mut request).await
            }
            SipMethod::Invite => {
                if self.0.reinvite_outstanding.load(Ordering::SeqCst) {
                    // Our own re-INVITE is in flight (RFC 3261 §14.2).
                    return self.0.ua.respond(&mut request, StatusCode::RequestPending).await;
                }

                let body = self.0.local_body.lock().expect("Lock failed").clone();
                let mut response = self.0.ua.new_response(&request, StatusCode::Ok, Some(&self.0.id.tag));
                response
                    .headers_mut()
                    .push(Header::Contact(self.0.ua.local_contact()));
                if let Some(body) = body {
                    response
                        .headers_mut()
                        .push(Header::ContentType(ContentType::new(MediaType::new("application", "sdp"))));
                    response.set_body(body);
                }

                match request.transaction.take() {
                    Some(ServerTsx::Invite(tsx)) => tsx.respond(&mut response).await,
                    _ => self.0.ua.send_response_stateless(response).await,
                }
            }
            _ => self.0.ua.respond(&mut request, StatusCode::MethodNotAllowed).await,
        }
    }

    /// An out-of-dialog CANCEL matched this session.
    pub(crate) async fn receive_cancel(&self, _cancel: &mut IncomingRequest) -> Result<()> {
        if !matches!(self.state(), SessionState::Initial | SessionState::Progress) {
            // Too late, the INVITE already got its final response.
            return Ok(());
        }

        self.disarm_no_answer_timer();

        let (tsx, mut response) = {
            let tsx = self.0.uas_tsx.lock().expect("Lock failed").clone();
            let request = self.0.uas_request.lock().expect("Lock failed");
            let (Some(tsx), Some(request)) = (tsx, request.as_ref()) else {
                return Ok(());
            };
            (
                tsx,
                self.0
                    .ua
                    .new_response(request, StatusCode::RequestTerminated, Some(&self.0.id.tag)),
            )
        };

        tsx.respond(&mut response).await?;
        self.end(EndReason::local("Canceled"));

        Ok(())
    }

    /// The transaction behind this session timed out or hit a transport
    /// error.
    pub(crate) fn on_transaction_failure(&self, reason: EndReason) {
        if self.state() != SessionState::Terminated {
            self.end(reason);
        }
    }

    fn end(&self, reason: EndReason) {
        self.disarm_no_answer_timer();
        self.set_state(SessionState::Terminated);
        if let Some(dialog) = self.dialog() {
            dialog.terminate();
            self.0.ua.remove_dialog(dialog.id());
        }
        self.0.ua.remove_session(&self.0.id);
        self.0.ua.emit(UaEvent::SessionEnded {
            id: self.0.id.clone(),
            reason,
        });
    }
}
