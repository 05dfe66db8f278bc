use std::cmp;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{self, Either};
use tokio::{pin, time};

use crate::headers::{self, CSeq, Header, Headers};
use crate::message::{Request, RequestLine, SipMethod, Uri};
use crate::transaction::{State, Transaction, TransactionInner};
use crate::transport::{IncomingResponse, OutgoingRequest};
use crate::ua::UserAgent;
use crate::Result;

struct OriginalRequest {
    uri: Uri,
    via: headers::Via,
    from: headers::From,
    cseq: CSeq,
    call_id: headers::CallId,
}

/// Represents a Client INVITE transaction.
#[derive(Clone)]
pub struct InvClientTransaction {
    transaction: TransactionInner,
    request: Arc<OriginalRequest>,
}

const TIMER_D: Duration = Duration::from_secs(32);
/// RFC 6026 wait in the Accepted state for retransmitted 2xx responses.
const TIMER_M: Duration = Duration::from_millis(64 * 500);

impl InvClientTransaction {
    pub(crate) async fn send(mut request: OutgoingRequest, ua: &UserAgent) -> Result<InvClientTransaction> {
        let tsx_layer = ua.tsx_layer();
        let method = request.msg.method();

        assert!(
            matches!(method, SipMethod::Invite),
            "Invalid method for client INVITE transaction: expected INVITE, got: {}",
            method
        );

        let transaction = TransactionInner::new_tsx_uac(&request, ua, State::Calling)?;
        transaction.tsx_send_request(&mut request).await?;

        let mut via = None;
        let mut cseq = None;
        let mut call_id = None;
        let mut from = None;

        for header in request.msg.headers.iter() {
            match header {
                Header::From(f) => from = Some(f.clone()),
                Header::Via(v) => via = Some(v.clone()),
                Header::CallId(c) => call_id = Some(c.clone()),
                Header::CSeq(c) => cseq = Some(*c),
                _ => continue,
            }
        }

        let (Some(via), Some(cseq), Some(call_id), Some(from)) = (via, cseq, call_id, from) else {
            return Err(crate::error::Error::InvalidState(
                "INVITE misses a mandatory header".into(),
            ));
        };

        let uri = request.msg.req_line.uri.clone();

        let request = Arc::new(OriginalRequest {
            uri,
            via,
            cseq,
            call_id,
            from,
        });
        let uac_inv = InvClientTransaction { transaction, request };

        tsx_layer.add_client_tsx(uac_inv.clone().into());

        tokio::spawn(uac_inv.clone().tsx_retrans_task());

        Ok(uac_inv)
    }

    async fn tsx_retrans_task(self) -> Result<()> {
        pin! {
            let timer_b = time::sleep(64 * Self::T1);
            let timer_a = if !self.reliable() {
                Either::Left(time::sleep(Self::T1))
            } else {
                Either::Right(future::pending::<()>())
            };
        }

        'retrans: loop {
            tokio::select! {
                _ = &mut timer_a, if self.is_calling() => {
                    match self.retransmit().await {
                        Ok(retrans) =>  {
                            let retrans = Self::T1 * (1 << retrans);
                            let interval = cmp::min(retrans, Self::T2);
                            let sleep = time::sleep(interval);
                            timer_a.set(Either::Left(sleep));
                        },
                        Err(err) =>  {
                            log::info!("Failed to retransmit: {}", err);
                        },
                    }
                }
                _ = &mut timer_b => {
                    if matches!(self.get_state(), State::Calling | State::Proceeding) {
                        // Timer B, no final response at all.
                        let user = self.user();
                        self.on_terminated();
                        if let Some(user) = user {
                            self.ua().on_tsx_timeout(user);
                        }
                    }
                    break 'retrans Ok(());
                }
            }
        }
    }

    /// Drives the machine with a received response.
    ///
    /// Returns `true` when the response was absorbed and must not reach
    /// the transaction user.
    pub(crate) async fn receive(&self, response: &IncomingResponse) -> Result<bool> {
        let code = response.code();
        self.set_last_status_code(code);

        match self.get_state() {
            State::Calling | State::Proceeding if code.is_provisional() => {
                self.change_state_to(State::Proceeding);
            }
            State::Calling | State::Proceeding if code.is_success() => {
                // The ACK for a 2xx belongs to the dialog layer.
                self.change_state_to(State::Accepted);
                self.schedule_termination(TIMER_M);
            }
            State::Calling | State::Proceeding if code.is_final() => {
                self.change_state_to(State::Completed);
                let mut ack = self.create_ack(response);

                self.tsx_send_request(&mut ack).await?;
                self.terminate();
            }
            State::Completed => {
                // 17.1.1.2 INVITE Client Transaction
                // Any retransmissions of the final response that are received while in
                // the "Completed" state MUST cause the ACK to be re-passed to the
                // transport layer for retransmission, but the newly received response
                // MUST NOT be passed up to the TU.
                self.retransmit().await?;

                return Ok(true);
            }
            State::Accepted if code.is_success() => {
                // Retransmitted 2xx, the TU generates the ACK again.
                return Ok(false);
            }
            _ => return Ok(true),
        }
        Ok(false)
    }

    fn create_ack(&self, response: &IncomingResponse) -> OutgoingRequest {
        let to = response.to().clone();
        let cseq = CSeq {
            method: SipMethod::Ack,
            ..self.request.cseq
        };

        let headers = &self.request;
        let mut ack_hdrs = Headers::with_capacity(5);

        ack_hdrs.push(Header::Via(headers.via.clone()));
        ack_hdrs.push(Header::From(headers.from.clone()));
        ack_hdrs.push(Header::To(to));
        ack_hdrs.push(Header::CallId(headers.call_id.clone()));
        ack_hdrs.push(Header::CSeq(cseq));

        OutgoingRequest {
            msg: Request {
                req_line: RequestLine {
                    method: SipMethod::Ack,
                    uri: self.request.uri.clone(),
                },
                headers: ack_hdrs,
                body: None,
            },
            buf: None,
            socket: self.socket().clone(),
        }
    }
}

#[async_trait::async_trait]
impl Transaction for InvClientTransaction {
    fn terminate(&self) {
        if self.reliable() {
            self.on_terminated();
        } else {
            // Start timer D
            self.schedule_termination(TIMER_D);
        }
    }
}

impl From<InvClientTransaction> for super::ClientTsx {
    fn from(tsx: InvClientTransaction) -> Self {
        super::ClientTsx::Invite(tsx)
    }
}

impl DerefMut for InvClientTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}

impl Deref for InvClientTransaction {
    type Target = TransactionInner;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        message::StatusCode,
        transaction::mock,
    };
    use tokio::time::{self, Duration};

    #[tokio::test]
    async fn test_state_calling() {
        let (ua, _events) = mock::default_ua();
        let request = mock::outgoing_request(SipMethod::Invite);

        let uac_inv = InvClientTransaction::send(request, &ua).await.unwrap();

        assert_eq!(uac_inv.get_state(), State::Calling);
    }

    #[tokio::test]
    async fn test_state_proceeding() {
        let (ua, _events) = mock::default_ua();
        let request = mock::outgoing_request(SipMethod::Invite);
        let response = mock::incoming_response(StatusCode::Trying);

        let uac_inv = InvClientTransaction::send(request, &ua).await.unwrap();

        uac_inv.receive(&response).await.unwrap();

        assert_eq!(uac_inv.get_state(), State::Proceeding);
    }

    #[tokio::test]
    async fn test_state_accepted_on_2xx() {
        let (ua, _events) = mock::default_ua();
        let request = mock::outgoing_request(SipMethod::Invite);
        let response = mock::incoming_response(StatusCode::Ok);

        let uac_inv = InvClientTransaction::send(request, &ua).await.unwrap();

        let absorbed = uac_inv.receive(&response).await.unwrap();

        assert!(!absorbed);
        assert_eq!(uac_inv.get_state(), State::Accepted);
    }

    #[tokio::test]
    async fn test_state_completed_sends_ack() {
        let socket = mock::socket();
        let (ua, _events) = mock::default_ua_with(socket.clone());
        let request = mock::outgoing_request_on(SipMethod::Invite, socket.clone());
        let response = mock::incoming_response(StatusCode::BusyHere);

        let uac_inv = InvClientTransaction::send(request, &ua).await.unwrap();

        uac_inv.receive(&response).await.unwrap();

        assert_eq!(uac_inv.last_status_code(), Some(StatusCode::BusyHere));

        // INVITE then ACK hit the wire.
        assert_eq!(socket.sent_count(), 2);
        assert!(socket.last_sent().unwrap().starts_with("ACK "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_a() {
        let socket = mock::unreliable_socket();
        let (ua, _events) = mock::default_ua_with(socket.clone());
        let request = mock::outgoing_request_on(SipMethod::Invite, socket);

        let uac_inv = InvClientTransaction::send(request, &ua).await.unwrap();

        assert!(uac_inv.retrans_count() == 0);
        assert_eq!(uac_inv.get_state(), State::Calling);

        time::sleep(Duration::from_millis(500 + 1)).await;
        assert!(uac_inv.retrans_count() == 1);

        time::sleep(Duration::from_secs(1) + Duration::from_millis(1)).await;
        assert!(uac_inv.retrans_count() == 2);

        time::sleep(Duration::from_secs(2) + Duration::from_millis(1)).await;
        assert!(uac_inv.retrans_count() == 3);

        time::sleep(Duration::from_secs(4) + Duration::from_millis(1)).await;
        assert!(uac_inv.retrans_count() == 4);

        time::sleep(Duration::from_secs(4) + Duration::from_millis(1)).await;
        assert!(uac_inv.retrans_count() == 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_b() {
        let (ua, _events) = mock::default_ua();
        let request = mock::outgoing_request(SipMethod::Invite);

        let uac_inv = InvClientTransaction::send(request, &ua).await.unwrap();

        assert_eq!(uac_inv.get_state(), State::Calling);

        time::sleep(InvClientTransaction::T1 * 64 + Duration::from_millis(1)).await;

        assert!(uac_inv.get_state() == State::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_d() {
        let socket = mock::unreliable_socket();
        let (ua, _events) = mock::default_ua_with(socket.clone());
        let request = mock::outgoing_request_on(SipMethod::Invite, socket);
        let response = mock::incoming_response(StatusCode::BusyHere);

        let uac_inv = InvClientTransaction::send(request, &ua).await.unwrap();

        uac_inv.receive(&response).await.unwrap();

        assert_eq!(uac_inv.get_state(), State::Completed);

        time::sleep(TIMER_D + Duration::from_millis(1)).await;

        assert!(uac_inv.get_state() == State::Terminated);
    }
}
