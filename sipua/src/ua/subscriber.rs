//! Outbound event subscriptions (RFC 6665).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sipua_util::ArcStr;

use crate::error::{EndReason, Result};
use crate::headers::{CSeq, CallId, Event, Header, SubState, To};
use crate::message::{Request, SipAddr, SipMethod, StatusCode, Uri};
use crate::transaction::client::ClientTransaction;
use crate::transport::{IncomingRequest, IncomingResponse, OutgoingRequest};
use crate::ua::dialog::Dialog;
use crate::ua::{TsxUser, UaEvent, UserAgent};

struct UacContext {
    uri: Uri,
    from: crate::headers::From,
    to: To,
    cseq: u32,
}

struct Inner {
    ua: UserAgent,
    /// Key in the UA's subscriber map: `call_id|local_tag`.
    key: ArcStr,
    call_id: ArcStr,
    local_tag: ArcStr,
    event: ArcStr,
    dialog: Mutex<Option<Arc<Dialog>>>,
    terminated: AtomicBool,
    ctx: Mutex<UacContext>,
}

/// An active outbound subscription.
#[derive(Clone)]
pub struct Subscriber(Arc<Inner>);

impl Subscriber {
    /// Sends the initial SUBSCRIBE.
    pub(crate) async fn subscribe(ua: &UserAgent, target: SipAddr, event: &str, expires: u32) -> Result<Subscriber> {
        let local_tag: ArcStr = crate::ua::make_tag().as_str().into();
        let call_id: ArcStr = uuid::Uuid::new_v4().to_string().as_str().into();
        let key: ArcStr = format!("{}|{}", call_id, local_tag).as_str().into();

        let from = crate::headers::From::new_with_tag(SipAddr::Uri(ua.config().uri.clone()), &local_tag);
        let to = To::new(target.clone());
        let uri = target.uri().clone();

        let subscriber = Subscriber(Arc::new(Inner {
            ua: ua.clone(),
            key: key.clone(),
            call_id,
            local_tag,
            event: event.into(),
            dialog: Mutex::new(None),
            terminated: AtomicBool::new(false),
            ctx: Mutex::new(UacContext {
                uri,
                from,
                to,
                cseq: 0,
            }),
        }));

        subscriber.send_subscribe(expires).await?;
        ua.add_subscriber(subscriber.clone());

        Ok(subscriber)
    }

    /// Returns the subscription key.
    pub(crate) fn key(&self) -> &ArcStr {
        &self.0.key
    }

    /// Returns the Call-ID of the subscription dialog.
    pub(crate) fn call_id(&self) -> &ArcStr {
        &self.0.call_id
    }

    /// Returns the event package subscribed to.
    pub fn event(&self) -> &str {
        &self.0.event
    }

    /// Ends the subscription by subscribing with `Expires: 0`.
    pub async fn unsubscribe(&self) -> Result<()> {
        if self.0.terminated.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.send_subscribe(0).await
    }

    async fn send_subscribe(&self, expires: u32) -> Result<()> {
        let ua = &self.0.ua;

        let mut request = {
            let mut ctx = self.0.ctx.lock().expect("Lock failed");
            ctx.cseq += 1;

            // Once the dialog exists, route through it.
            let dialog = self.0.dialog.lock().expect("Lock failed").clone();
            match dialog {
                Some(dialog) => {
                    let mut request = dialog.create_request(SipMethod::Subscribe, None)?;
                    let (from, to) = dialog.local_identity();
                    request.headers.push(Header::To(to));
                    request.headers.push(Header::From(from));
                    request
                }
                None => {
                    let mut request = Request::new(SipMethod::Subscribe, ctx.uri.clone());
                    request.headers.push(Header::To(ctx.to.clone()));
                    request.headers.push(Header::From(ctx.from.clone()));
                    request.headers.push(Header::CSeq(CSeq::new(ctx.cseq, SipMethod::Subscribe)));
                    request
                }
            }
        };

        let headers = &mut request.headers;
        headers.push(Header::Via(ua.new_via()));
        headers.push(Header::MaxForwards(crate::headers::MaxForwards::new(70)));
        headers.push(Header::CallId(CallId::new(&self.0.call_id)));
        headers.push(Header::Contact(ua.local_contact()));
        headers.push(Header::Event(Event::new(&self.0.event, None)));
        headers.push(Header::Expires(crate::headers::Expires::new(expires)));

        let outgoing = OutgoingRequest {
            msg: request,
            buf: None,
            socket: ua.socket(),
        };

        let tsx = ClientTransaction::send(outgoing, ua).await?;
        tsx.set_user(TsxUser::Subscriber(self.0.key.clone()));

        Ok(())
    }

    pub(crate) async fn on_response(&self, response: &IncomingResponse) -> Result<()> {
        let code = response.code();

        if code.is_provisional() {
            return Ok(());
        }

        if code.is_success() {
            let mut dialog = self.0.dialog.lock().expect("Lock failed");
            if dialog.is_none() && response.to().tag().is_some() {
                let ctx = self.0.ctx.lock().expect("Lock failed");
                let created = Dialog::new_uac(
                    self.0.ua.config().uri.clone(),
                    &ctx.uri,
                    ctx.cseq,
                    response,
                );
                drop(ctx);
                match created {
                    Ok(created) => {
                        let created = Arc::new(created);
                        created.confirm();
                        *dialog = Some(created.clone());
                        drop(dialog);
                        self.0
                            .ua
                            .register_subscription_dialog(created.id().clone(), self.clone());
                    }
                    Err(err) => {
                        tracing::debug!("SUBSCRIBE response without usable dialog info: {err}");
                    }
                }
            }
            if self.0.terminated.load(Ordering::SeqCst) {
                self.remove();
            }
            return Ok(());
        }

        // Final failure ends the subscription.
        tracing::info!(code = code.into_u16(), "subscription refused");
        self.0.terminated.store(true, Ordering::SeqCst);
        self.remove();

        Ok(())
    }

    /// A NOTIFY arrived for this subscription.
    pub(crate) async fn receive_notify(&self, request: &mut IncomingRequest) -> Result<()> {
        let current_dialog = self.0.dialog.lock().expect("Lock failed").clone();
        if let Some(dialog) = current_dialog {
            if !dialog.check_remote_seq(request.cseq().cseq(), request.method()) {
                return self
                    .0
                    .ua
                    .respond(request, StatusCode::ServerInternalError)
                    .await;
            }
        }

        let event = request.request.headers.find_map(|h| h.as_event()).cloned();
        let body = request
            .body()
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(ArcStr::from);
        let from = request.from().clone();

        let terminated = request
            .request
            .headers
            .find_map(|h| h.as_subscription_state())
            .is_some_and(|state| state.state() == &SubState::Terminated);

        self.0.ua.respond(request, StatusCode::Ok).await?;
        self.0.ua.emit(UaEvent::SipEvent { event, from, body });

        if terminated {
            self.0.terminated.store(true, Ordering::SeqCst);
            self.remove();
        }

        Ok(())
    }

    pub(crate) fn on_transaction_failure(&self, _reason: EndReason) {
        self.0.terminated.store(true, Ordering::SeqCst);
        self.remove();
    }

    fn remove(&self) {
        if let Some(dialog) = self.0.dialog.lock().expect("Lock failed").clone() {
            dialog.terminate();
            self.0.ua.remove_dialog(dialog.id());
        }
        self.0.ua.remove_subscriber(&self.0.key);
    }

    /// Terminates locally without signaling, used when the agent stops.
    pub(crate) fn close(&self) {
        self.0.terminated.store(true, Ordering::SeqCst);
        self.remove();
    }
}

// keep the local tag reachable for dialog-less NOTIFY correlation
impl Subscriber {
    pub(crate) fn local_tag(&self) -> &ArcStr {
        &self.0.local_tag
    }
}
