use std::cmp;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{self, Either};
use tokio::sync::oneshot;
use tokio::{pin, time};

use crate::error::Result;
use crate::message::SipMethod;
use crate::transaction::{State, Transaction, TransactionInner};
use crate::transport::{IncomingRequest, OutgoingResponse};
use crate::ua::UserAgent;

type TxConfirmed = Arc<Mutex<Option<oneshot::Sender<()>>>>;
type RxConfirmed = oneshot::Receiver<()>;

/// RFC 6026 wait in the Accepted state for ACKs to retransmitted 2xx.
const TIMER_L: Duration = Duration::from_millis(64 * 500);

/// Represents a Server INVITE transaction.
#[derive(Clone)]
pub struct InvServerTransaction {
    transaction: TransactionInner,
    tx_confirmed: TxConfirmed,
}

impl InvServerTransaction {
    pub(crate) fn new(ua: &UserAgent, request: &mut IncomingRequest) -> Result<Self> {
        let tsx_layer = ua.tsx_layer();
        let method = request.method();

        assert!(
            matches!(method, SipMethod::Invite),
            "Expected SipMethod::Invite for server INVITE transaction, but got: {}",
            method
        );

        let transaction = TransactionInner::new_tsx_uas(request, ua, State::Proceeding)?;
        let tx_confirmed = Default::default();

        let uas_inv = InvServerTransaction {
            transaction,
            tx_confirmed,
        };

        tsx_layer.add_server_tsx(uas_inv.clone().into());
        request.set_tsx(uas_inv.clone().into());

        Ok(uas_inv)
    }

    /// Sends a response through the transaction, driving the state
    /// machine.
    ///
    /// A 2xx is passed to the transport and moves the machine to
    /// `Accepted`; retransmitting the 2xx until the ACK arrives is the
    /// TU's job (RFC 6026).
    pub(crate) async fn respond(&self, response: &mut OutgoingResponse) -> Result<()> {
        self.tsx_send_response(response).await?;

        let code = response.status_code().into_u16();

        match code {
            100..=199 => {
                self.change_state_to(State::Proceeding);
            }
            200..=299 => {
                self.change_state_to(State::Accepted);
                self.schedule_termination(TIMER_L);
            }
            300..=699 => {
                self.change_state_to(State::Completed);

                let (tx, rx) = oneshot::channel();

                self.tx_confirmed.lock().expect("Lock failed").replace(tx);
                self.initiate_retransmission(rx);
            }
            _ => (),
        };

        Ok(())
    }

    /// An ACK arrived for a non-2xx final response.
    pub(crate) fn confirm(&self) {
        self.change_state_to(State::Confirmed);
        let mut lock = self.tx_confirmed.lock().expect("Lock failed");
        if let Some(sender) = lock.take() {
            let _ = sender.send(());
        }
        drop(lock);
        self.terminate();
    }

    fn initiate_retransmission(&self, mut rx_confirmed: RxConfirmed) {
        let unreliable = !self.reliable();
        let uas = self.clone();

        tokio::spawn(async move {
            let timer_h = time::sleep(64 * Self::T1);
            let timer_g = if unreliable {
                Either::Left(time::sleep(Self::T1))
            } else {
                Either::Right(future::pending::<()>())
            };

            pin!(timer_h);
            pin!(timer_g);

            'retrans: loop {
                tokio::select! {
                    _ = &mut timer_g => {
                        match uas.retransmit().await {
                            Ok(retrans) =>  {
                                let retrans = Self::T1 * (1 << retrans);
                                let interval = cmp::min(retrans, Self::T2);
                                let sleep = time::sleep(interval);
                                timer_g.set(Either::Left(sleep));
                            },
                            Err(err) =>  {
                                log::info!("Failed to retransmit: {}", err);
                            },
                        }
                     },
                    _ = &mut timer_h => {
                        // Timer H Expired, the ACK never arrived.
                        let user = uas.user();
                        uas.on_terminated();
                        if let Some(user) = user {
                            uas.ua().on_tsx_timeout(user);
                        }
                        break 'retrans;
                    }
                    _ = &mut rx_confirmed => {
                        // Got confirmed state!;
                        break 'retrans;
                    }
                }
            }
        });
    }
}

// The TU passes any number of provisional responses to the
// server transaction.
#[async_trait]
impl Transaction for InvServerTransaction {
    fn terminate(&self) {
        if self.reliable() {
            self.on_terminated();
        } else {
            // Timer I
            self.schedule_termination(Self::T4);
        }
    }
}

impl Deref for InvServerTransaction {
    type Target = TransactionInner;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::StatusCode;
    use crate::transaction::mock;
    use crate::ua::UserAgent;
    use tokio::time::Duration;

    async fn tsx_uas_params() -> (UserAgent, IncomingRequest) {
        let (ua, _events) = mock::default_ua();
        let request = mock::request(SipMethod::Invite);

        (ua, request)
    }

    #[tokio::test]
    async fn test_receives_100_trying() {
        let (ua, mut request) = tsx_uas_params().await;
        let tsx = InvServerTransaction::new(&ua, &mut request).unwrap();
        let response = &mut mock::response(StatusCode::Trying);

        tsx.respond(response).await.unwrap();

        assert!(tsx.last_status_code().unwrap().into_u16() == 100);
        assert!(tsx.get_state() == State::Proceeding);
    }

    #[tokio::test]
    async fn test_receives_180_ringing() {
        let (ua, mut request) = tsx_uas_params().await;
        let tsx = InvServerTransaction::new(&ua, &mut request).unwrap();
        let response = &mut mock::response(StatusCode::Trying);

        tsx.respond(response).await.unwrap();

        assert!(tsx.last_status_code().unwrap().into_u16() == 100);

        let response = &mut mock::response(StatusCode::Ringing);
        tsx.respond(response).await.unwrap();

        assert!(tsx.last_status_code().unwrap().into_u16() == 180);
        assert!(tsx.get_state() == State::Proceeding);
    }

    #[tokio::test]
    async fn test_2xx_enters_accepted() {
        let (ua, mut request) = tsx_uas_params().await;
        let tsx = InvServerTransaction::new(&ua, &mut request).unwrap();
        let response = &mut mock::response(StatusCode::Ok);

        tsx.respond(response).await.unwrap();

        assert!(tsx.get_state() == State::Accepted);
    }

    #[tokio::test]
    async fn test_ack_confirms_completed() {
        let (ua, mut request) = tsx_uas_params().await;
        let tsx = InvServerTransaction::new(&ua, &mut request).unwrap();
        let response = &mut mock::response(StatusCode::BusyHere);

        tsx.respond(response).await.unwrap();
        assert!(tsx.get_state() == State::Completed);

        tsx.confirm();

        // Reliable transport, Timer I is zero.
        assert!(matches!(tsx.get_state(), State::Terminated));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invite_timer_g_retransmission() {
        let socket = mock::unreliable_socket();
        let (ua, _events) = mock::default_ua_with(socket.clone());
        let mut request = mock::request_on(SipMethod::Invite, socket);
        let tsx = InvServerTransaction::new(&ua, &mut request).unwrap();

        let response = &mut mock::response(StatusCode::BusyHere);
        tsx.respond(response).await.unwrap();

        time::sleep(InvServerTransaction::T1 + Duration::from_millis(1)).await;
        assert!(tsx.retrans_count() == 1);

        time::sleep(InvServerTransaction::T1 * 2 + Duration::from_millis(1)).await;
        assert!(tsx.retrans_count() == 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_h_expiration() {
        let (ua, mut request) = tsx_uas_params().await;
        let tsx = InvServerTransaction::new(&ua, &mut request).unwrap();

        let response = &mut mock::response(StatusCode::BusyHere);

        tsx.respond(response).await.unwrap();

        time::sleep(InvServerTransaction::T1 * 64 + Duration::from_millis(1)).await;
        assert!(tsx.get_state() == State::Terminated);
    }
}
