//! The REGISTER client.
//!
//! Owns the binding with the registrar: the initial REGISTER, digest
//! challenges, 423 renegotiation, the periodic refresh and removal.
//! At most one REGISTER is in flight at a time; concurrent calls to
//! [`Registration::register`] are coalesced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sipua_util::ArcStr;
use tokio::task::JoinHandle;

use crate::auth::{digest_credential, Credentials};
use crate::error::{EndReason, Error, Result};
use crate::headers::{Authorization, Contact, Expires, Header, ProxyAuthorization};
use crate::message::auth::Challenge;
use crate::message::{Request, SipMethod, StatusCode, Uri};
use crate::transaction::client::ClientTransaction;
use crate::transport::{IncomingResponse, OutgoingRequest};
use crate::ua::{TsxUser, UaEvent, UserAgent};

struct ChallengeState {
    nonce: ArcStr,
    answered: bool,
}

struct Inner {
    ua: UserAgent,
    registered: AtomicBool,
    /// The lifetime granted by the registrar.
    granted: AtomicU32,
    /// The lifetime we ask for; raised by 423 Interval Too Brief.
    requested: AtomicU32,
    cseq: AtomicU32,
    call_id: ArcStr,
    from_tag: ArcStr,
    registering: AtomicBool,
    removing: AtomicBool,
    challenges: Mutex<HashMap<String, ChallengeState>>,
    refresh: Mutex<Option<JoinHandle<()>>>,
}

/// The registration client of a user agent.
#[derive(Clone)]
pub struct Registration(Arc<Inner>);

impl Registration {
    pub(crate) fn new(ua: UserAgent) -> Self {
        let requested = ua.config().register_expires;

        Registration(Arc::new(Inner {
            ua,
            registered: AtomicBool::new(false),
            granted: AtomicU32::new(0),
            requested: AtomicU32::new(requested),
            cseq: AtomicU32::new(0),
            call_id: uuid::Uuid::new_v4().to_string().as_str().into(),
            from_tag: crate::ua::make_tag().as_str().into(),
            registering: AtomicBool::new(false),
            removing: AtomicBool::new(false),
            challenges: Mutex::new(HashMap::new()),
            refresh: Mutex::new(None),
        }))
    }

    /// Returns `true` while a binding is in place.
    pub fn is_registered(&self) -> bool {
        self.0.registered.load(Ordering::SeqCst)
    }

    /// Sends a REGISTER for the configured AOR.
    ///
    /// A no-op while another REGISTER is outstanding.
    pub async fn register(&self) -> Result<()> {
        if self.0.registering.swap(true, Ordering::SeqCst) {
            tracing::debug!("REGISTER already in flight, coalescing");
            return Ok(());
        }
        self.0.removing.store(false, Ordering::SeqCst);

        let expires = self.0.requested.load(Ordering::SeqCst);
        self.send_register(expires, None).await
    }

    /// Removes the binding. With `all` the wildcard contact `*` is sent.
    pub async fn unregister(&self, all: bool) -> Result<()> {
        if self.0.registering.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidState("REGISTER already in flight".into()));
        }
        self.0.removing.store(true, Ordering::SeqCst);
        self.cancel_refresh();

        self.send_register_with_contact(0, None, all.then_some(Contact::Star)).await
    }

    fn registrar_uri(&self) -> Uri {
        let config = self.0.ua.config();
        match &config.registrar_server {
            Some(registrar) => registrar.clone(),
            None => {
                let mut uri = config.uri.clone();
                uri.user = None;
                uri
            }
        }
    }

    async fn send_register(&self, expires: u32, credential: Option<Header>) -> Result<()> {
        self.send_register_with_contact(expires, credential, None).await
    }

    async fn send_register_with_contact(
        &self,
        expires: u32,
        credential: Option<Header>,
        contact: Option<Contact>,
    ) -> Result<()> {
        let ua = &self.0.ua;
        let cseq = self.0.cseq.fetch_add(1, Ordering::SeqCst) + 1;

        let mut request = Request::new(SipMethod::Register, self.registrar_uri());
        let aor = crate::message::SipAddr::Uri(ua.config().uri.clone());

        let mut to = crate::headers::To::new(aor.clone());
        to.set_tag(None);
        let from = crate::headers::From::new_with_tag(aor, &self.0.from_tag);

        let headers = &mut request.headers;
        headers.push(Header::Via(ua.new_via()));
        headers.push(Header::MaxForwards(crate::headers::MaxForwards::new(70)));
        headers.push(Header::To(to));
        headers.push(Header::From(from));
        headers.push(Header::CallId(crate::headers::CallId::new(&self.0.call_id)));
        headers.push(Header::CSeq(crate::headers::CSeq::new(cseq, SipMethod::Register)));
        headers.push(Header::Contact(contact.unwrap_or_else(|| ua.local_contact())));
        headers.push(Header::Expires(Expires::new(expires)));
        headers.push(Header::Allow(ua.allowed_methods()));
        headers.push(Header::UserAgent(crate::headers::UserAgent::new(
            &ua.config().user_agent,
        )));
        if let Some(credential) = credential {
            headers.push(credential);
        }

        let request = OutgoingRequest {
            msg: request,
            buf: None,
            socket: ua.socket(),
        };

        tracing::debug!(cseq, expires, "sending REGISTER");

        let tsx = ClientTransaction::send(request, ua).await?;
        tsx.set_user(TsxUser::Registration);

        Ok(())
    }

    pub(crate) async fn on_response(&self, response: &IncomingResponse) {
        let code = response.code();

        let result = match code {
            StatusCode::Unauthorized | StatusCode::ProxyAuthenticationRequired => {
                self.on_challenge(response).await
            }
            StatusCode::IntervalTooBrief => self.on_interval_too_brief(response).await,
            code if code.is_success() => {
                self.on_success(response);
                Ok(())
            }
            code if code.is_final() => {
                self.fail(EndReason::peer(code.into_u16(), response.response.reason()));
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(err) = result {
            self.fail(EndReason::local(&err.to_string()));
        }
    }

    /// The transaction carrying our REGISTER died without a response.
    pub(crate) fn on_transaction_failure(&self, reason: EndReason) {
        self.fail(reason);
    }

    async fn on_challenge(&self, response: &IncomingResponse) -> Result<()> {
        let proxy = response.code() == StatusCode::ProxyAuthenticationRequired;

        let challenge = if proxy {
            response
                .response
                .headers
                .find_map(|h| h.as_proxy_authenticate())
                .map(|h| h.challenge())
        } else {
            response
                .response
                .headers
                .find_map(|h| h.as_www_authenticate())
                .map(|h| h.challenge())
        };

        let Some(challenge) = challenge else {
            return Err(Error::Auth("Challenge response without challenge header".into()));
        };
        let Challenge::Digest(digest) = challenge else {
            return Err(Error::Auth("Unsupported authentication scheme".into()));
        };
        let (Some(realm), Some(nonce)) = (digest.realm.as_deref(), digest.nonce.as_deref()) else {
            return Err(Error::Auth("Challenge without realm or nonce".into()));
        };

        // Answer each challenge once; a fresh or stale nonce allows one
        // more attempt (RFC 3261 §22.2).
        {
            let mut challenges = self.0.challenges.lock().expect("Lock failed");
            let state = challenges.entry(realm.to_string()).or_insert_with(|| ChallengeState {
                nonce: nonce.into(),
                answered: false,
            });
            let fresh = state.nonce != nonce || digest.is_stale();
            if !fresh && state.answered {
                drop(challenges);
                self.fail(EndReason::peer(
                    response.code().into_u16(),
                    response.response.reason(),
                ));
                return Ok(());
            }
            state.nonce = nonce.into();
            state.answered = true;
        }

        let config = self.0.ua.config();
        let credentials = Credentials {
            username: config.auth_username().to_string(),
            password: config.password.clone(),
            ha1: config.ha1.clone(),
            realm: config.realm.clone(),
        };

        let ruri = self.registrar_uri().to_string();
        let credential = digest_credential(challenge, &credentials, &SipMethod::Register, &ruri)?;

        let header = if proxy {
            Header::ProxyAuthorization(ProxyAuthorization(crate::message::auth::Credential::Digest(credential)))
        } else {
            Header::Authorization(Authorization(crate::message::auth::Credential::Digest(credential)))
        };

        let expires = if self.0.removing.load(Ordering::SeqCst) {
            0
        } else {
            self.0.requested.load(Ordering::SeqCst)
        };

        tracing::info!(realm, "answering registrar challenge");

        self.send_register(expires, Some(header)).await
    }

    async fn on_interval_too_brief(&self, response: &IncomingResponse) -> Result<()> {
        let Some(min) = response.response.headers.find_map(|h| h.as_min_expires()) else {
            self.fail(EndReason::peer(423, response.response.reason()));
            return Ok(());
        };

        let requested = self.0.requested.load(Ordering::SeqCst);
        let min = min.as_u32();
        if min <= requested {
            // The registrar asks for less than we offered already.
            self.fail(EndReason::peer(423, response.response.reason()));
            return Ok(());
        }

        tracing::info!(min, "registrar wants a longer interval, retrying");
        self.0.requested.store(min, Ordering::SeqCst);
        self.send_register(min, None).await
    }

    fn on_success(&self, response: &IncomingResponse) {
        self.0.registering.store(false, Ordering::SeqCst);
        for state in self.0.challenges.lock().expect("Lock failed").values_mut() {
            state.answered = false;
        }

        if self.0.removing.swap(false, Ordering::SeqCst) {
            self.0.registered.store(false, Ordering::SeqCst);
            self.0.granted.store(0, Ordering::SeqCst);
            self.0.ua.emit(UaEvent::Unregistered);
            return;
        }

        let granted = self.granted_expires(response);

        self.0.registered.store(true, Ordering::SeqCst);
        self.0.granted.store(granted, Ordering::SeqCst);
        self.0.ua.emit(UaEvent::Registered { expires: granted });

        self.schedule_refresh(granted);
    }

    /// The binding lifetime the registrar granted: the expires parameter
    /// of our contact wins over the `Expires` header, which wins over the
    /// requested value.
    fn granted_expires(&self, response: &IncomingResponse) -> u32 {
        let contact_user = self.0.ua.local_contact_user();

        let from_contact = response
            .response
            .headers
            .filter_map(|h| h.as_contact())
            .find(|contact| {
                contact
                    .addr()
                    .and_then(|addr| addr.uri().username().map(|u| u == contact_user))
                    .unwrap_or(false)
            })
            .and_then(|contact| contact.expires());

        from_contact
            .or_else(|| {
                response
                    .response
                    .headers
                    .find_map(|h| h.as_expires())
                    .map(|e| e.as_u32())
            })
            .unwrap_or_else(|| self.0.requested.load(Ordering::SeqCst))
    }

    fn schedule_refresh(&self, granted: u32) {
        self.cancel_refresh();

        let registration = self.clone();
        let delay = Duration::from_secs(u64::from(granted) * 3 / 4);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!("refreshing registration");
            if let Err(err) = registration.register().await {
                registration.fail(EndReason::local(&err.to_string()));
            }
        });

        *self.0.refresh.lock().expect("Lock failed") = Some(handle);
    }

    fn cancel_refresh(&self) {
        if let Some(handle) = self.0.refresh.lock().expect("Lock failed").take() {
            handle.abort();
        }
    }

    fn fail(&self, reason: EndReason) {
        tracing::warn!(%reason, "registration failed");
        self.0.registering.store(false, Ordering::SeqCst);
        self.0.registered.store(false, Ordering::SeqCst);
        self.cancel_refresh();
        self.0.ua.emit(UaEvent::RegistrationFailed { reason });
    }

    /// Stops refreshing; used when the agent is closed.
    pub(crate) fn close(&self) {
        self.cancel_refresh();
        self.0.registering.store(false, Ordering::SeqCst);
        self.0.registered.store(false, Ordering::SeqCst);
    }
}
