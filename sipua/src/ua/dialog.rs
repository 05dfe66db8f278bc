//! SIP Dialogs.
//!
//! A dialog is the peer-to-peer relationship created by a 2xx (or a
//! tagged 18x) to an INVITE or SUBSCRIBE. It owns the route set, the
//! remote target and the CSeq bookkeeping for everything sent inside it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use sipua_util::ArcStr;

use crate::error::{Error, Result};
use crate::headers::{Header, Headers, Route, SipHeaderParse};
use crate::message::{Request, Scheme, SipMethod, Uri};
use crate::transport::{IncomingRequest, IncomingResponse};

/// The CSeq space is limited to 2**31 (RFC 3261 §12.2.1.1).
const MAX_CSEQ: u32 = 1 << 31;

/// Unique identifier of a SIP dialog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialogId {
    /// The Call-ID the dialog was created under.
    pub call_id: ArcStr,
    /// The tag this agent contributed.
    pub local_tag: ArcStr,
    /// The tag the peer contributed.
    pub remote_tag: ArcStr,
}

impl DialogId {
    pub(crate) fn new(call_id: &str, local_tag: &str, remote_tag: &str) -> Self {
        DialogId {
            call_id: call_id.into(),
            local_tag: local_tag.into(),
            remote_tag: remote_tag.into(),
        }
    }

    /// The map key: the identity triple, concatenated.
    pub(crate) fn as_key(&self) -> String {
        format!("{}|{}|{}", self.call_id, self.local_tag, self.remote_tag)
    }

    /// The key with both tags swapped, to match requests coming from
    /// either direction.
    pub(crate) fn swapped_key(&self) -> String {
        format!("{}|{}|{}", self.call_id, self.remote_tag, self.local_tag)
    }
}

/// The lifecycle of a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// Created by a tagged provisional response.
    Early,
    /// A 2xx arrived (or was sent).
    Confirmed,
    /// The dialog is over.
    Terminated,
}

/// A SIP dialog.
pub struct Dialog {
    id: DialogId,
    state: Mutex<DialogState>,
    /// Ordered list of proxies in-dialog requests travel through.
    route_set: Vec<Route>,
    /// Where in-dialog requests are sent (the peer's Contact).
    remote_target: Uri,
    local_uri: Uri,
    remote_uri: Uri,
    secure: bool,
    /// Next CSeq to send. Zero means nothing was sent yet.
    local_seq: AtomicU32,
    /// Highest CSeq received. Zero means nothing was received yet.
    remote_seq: AtomicU32,
}

impl Dialog {
    /// Creates the UAC side dialog from the sent INVITE/SUBSCRIBE and the
    /// first dialog-creating response.
    ///
    /// The route set is the reversed `Record-Route` list of the response
    /// (RFC 3261 §12.1.2).
    pub(crate) fn new_uac(
        local_uri: Uri,
        request_uri: &Uri,
        local_cseq: u32,
        response: &IncomingResponse,
    ) -> Result<Self> {
        let Some(remote_tag) = response.to().tag() else {
            return Err(Error::InvalidState("Response without to-tag".into()));
        };
        let Some(local_tag) = response.core.from.tag() else {
            return Err(Error::InvalidState("Response without from-tag".into()));
        };

        let Some(contact) = response.response.headers.find_map(|h| h.as_contact()) else {
            return Err(Error::MissingRequiredHeader(crate::headers::Contact::NAME));
        };
        let Some(remote_target) = contact.addr() else {
            return Err(Error::InvalidState("Contact is the wildcard".into()));
        };

        let mut route_set: Vec<Route> = response
            .response
            .headers
            .filter_map(|h| h.as_record_route())
            .map(|rr| Route {
                addr: rr.addr.clone(),
                params: rr.params.clone(),
            })
            .collect();
        route_set.reverse();

        let id = DialogId::new(response.call_id().id(), local_tag, remote_tag);
        let state = if response.code().is_success() {
            DialogState::Confirmed
        } else {
            DialogState::Early
        };

        let remote_uri = response.to().uri().uri().clone();

        Ok(Dialog {
            id,
            state: Mutex::new(state),
            route_set,
            remote_target: remote_target.uri().clone(),
            local_uri,
            remote_uri,
            secure: matches!(request_uri.scheme, Scheme::Sips),
            local_seq: AtomicU32::new(local_cseq),
            remote_seq: AtomicU32::new(0),
        })
    }

    /// Creates the UAS side dialog from a received dialog-creating
    /// request and the local tag placed in the response.
    ///
    /// The route set is the `Record-Route` list in request order
    /// (RFC 3261 §12.1.1).
    pub(crate) fn new_uas(request: &IncomingRequest, local_uri: Uri, local_tag: &str) -> Result<Self> {
        let Some(remote_tag) = request.from().tag() else {
            return Err(Error::InvalidState("Request without from-tag".into()));
        };
        if !request.method().can_establish_a_dialog() {
            return Err(Error::InvalidState(format!(
                "{} cannot establish a dialog",
                request.method()
            )));
        }

        let remote_target = request
            .request
            .headers
            .find_map(|h| h.as_contact())
            .and_then(|contact| contact.addr())
            .map(|addr| addr.uri().clone())
            .unwrap_or_else(|| request.from().uri().uri().clone());

        let route_set: Vec<Route> = request
            .request
            .headers
            .filter_map(|h| h.as_record_route())
            .map(|rr| Route {
                addr: rr.addr.clone(),
                params: rr.params.clone(),
            })
            .collect();

        let id = DialogId::new(request.call_id().id(), local_tag, remote_tag);
        let secure = matches!(request.request.uri().scheme, Scheme::Sips) && request.socket.secure();

        Ok(Dialog {
            id,
            state: Mutex::new(DialogState::Early),
            route_set,
            remote_target,
            local_uri,
            remote_uri: request.from().uri().uri().clone(),
            secure,
            local_seq: AtomicU32::new(0),
            remote_seq: AtomicU32::new(request.cseq().cseq()),
        })
    }

    /// Returns the dialog identity.
    pub fn id(&self) -> &DialogId {
        &self.id
    }

    /// Returns the current dialog state.
    pub fn state(&self) -> DialogState {
        *self.state.lock().expect("Lock failed")
    }

    /// Returns `true` once the dialog saw a 2xx.
    pub fn is_confirmed(&self) -> bool {
        self.state() == DialogState::Confirmed
    }

    /// Returns the remote target in-dialog requests are sent to.
    pub fn remote_target(&self) -> &Uri {
        &self.remote_target
    }

    /// Returns `true` when the dialog was established over sips.
    pub fn secure(&self) -> bool {
        self.secure
    }

    pub(crate) fn confirm(&self) {
        let mut state = self.state.lock().expect("Lock failed");
        if *state == DialogState::Early {
            *state = DialogState::Confirmed;
        }
    }

    pub(crate) fn terminate(&self) {
        *self.state.lock().expect("Lock failed") = DialogState::Terminated;
    }

    /// Updates the remote target from a re-INVITE or its response.
    #[allow(dead_code)]
    pub(crate) fn set_remote_target(&mut self, target: Uri) {
        self.remote_target = target;
    }

    fn next_local_seq(&self) -> Result<u32> {
        let next = self.local_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if next >= MAX_CSEQ {
            return Err(Error::InvalidState("Local CSeq exhausted".into()));
        }
        Ok(next)
    }

    /// Returns the CSeq of the last request sent in this dialog.
    pub(crate) fn local_seq(&self) -> u32 {
        self.local_seq.load(Ordering::SeqCst)
    }

    /// Validates the CSeq of a received in-dialog request
    /// (RFC 3261 §12.2.2).
    ///
    /// Returns `false` when the request is out of order and must be
    /// answered with 500. `ACK` and `CANCEL` reuse the INVITE CSeq and
    /// are exempt.
    pub(crate) fn check_remote_seq(&self, cseq: u32, method: &SipMethod) -> bool {
        if matches!(method, SipMethod::Ack | SipMethod::Cancel) {
            return true;
        }

        let previous = self.remote_seq.load(Ordering::SeqCst);
        if previous != 0 && cseq <= previous {
            return false;
        }
        self.remote_seq.store(cseq, Ordering::SeqCst);
        true
    }

    /// Builds an in-dialog request: the Request-URI is the remote target
    /// and the route set goes into `Route` headers (loose routing,
    /// RFC 3261 §12.2.1.1).
    ///
    /// `ACK` and `CANCEL` must pass the CSeq number of the INVITE they
    /// belong to in `reuse_cseq`.
    pub(crate) fn create_request(&self, method: SipMethod, reuse_cseq: Option<u32>) -> Result<Request> {
        let cseq = match reuse_cseq {
            Some(cseq) => cseq,
            None => self.next_local_seq()?,
        };

        let mut headers = Headers::with_capacity(8);
        for route in &self.route_set {
            headers.push(Header::Route(route.clone()));
        }

        headers.push(Header::CSeq(crate::headers::CSeq::new(cseq, method)));

        let mut request = Request::new(method, self.remote_target.clone());
        request.headers = headers;

        Ok(request)
    }

    /// The From/To pair for requests this side sends.
    pub(crate) fn local_identity(&self) -> (crate::headers::From, crate::headers::To) {
        let from = crate::headers::From::new_with_tag(
            crate::message::SipAddr::Uri(self.local_uri.clone()),
            &self.id.local_tag,
        );
        let mut to = crate::headers::To::new(crate::message::SipAddr::Uri(self.remote_uri.clone()));
        to.set_tag(Some(&self.id.remote_tag));

        (from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::mock;

    #[test]
    fn test_dialog_id_keys() {
        let id = DialogId::new("abc@host", "local", "remote");

        assert_eq!(id.as_key(), "abc@host|local|remote");
        assert_eq!(id.swapped_key(), "abc@host|remote|local");
    }

    #[tokio::test]
    async fn test_uas_dialog_from_invite() {
        let request = mock::request(crate::message::SipMethod::Invite);
        let local_uri: Uri = "sip:bob@127.0.0.1".parse().unwrap();

        let dialog = Dialog::new_uas(&request, local_uri, "8bk2l").unwrap();

        assert_eq!(dialog.state(), DialogState::Early);
        assert_eq!(dialog.id().local_tag, "8bk2l");
        assert_eq!(dialog.id().remote_tag, "9fxced76sl");
        // No Contact in the mock request, falls back to the From uri.
        assert_eq!(dialog.remote_target().username(), Some("alice"));
    }

    #[tokio::test]
    async fn test_remote_seq_is_monotonic() {
        let request = mock::request(crate::message::SipMethod::Invite);
        let local_uri: Uri = "sip:bob@127.0.0.1".parse().unwrap();
        let dialog = Dialog::new_uas(&request, local_uri, "8bk2l").unwrap();

        // The mock request carried CSeq 1.
        assert!(!dialog.check_remote_seq(1, &SipMethod::Bye));
        assert!(dialog.check_remote_seq(2, &SipMethod::Bye));
        assert!(!dialog.check_remote_seq(2, &SipMethod::Bye));
        // ACK reuses the INVITE CSeq and is always acceptable.
        assert!(dialog.check_remote_seq(2, &SipMethod::Ack));
    }

    #[tokio::test]
    async fn test_in_dialog_request_carries_route_set() {
        use crate::headers::SipHeaderParse;

        let mut request = mock::request(crate::message::SipMethod::Invite);
        let rr = crate::headers::RecordRoute::from_bytes(b"<sip:proxy.example.com;lr>").unwrap();
        request.request.headers.push(Header::RecordRoute(rr));

        let local_uri: Uri = "sip:bob@127.0.0.1".parse().unwrap();
        let dialog = Dialog::new_uas(&request, local_uri, "8bk2l").unwrap();

        let bye = dialog.create_request(SipMethod::Bye, None).unwrap();

        assert!(bye.headers.contains(crate::headers::Route::NAME));
        assert_eq!(bye.method(), &SipMethod::Bye);
    }
}
