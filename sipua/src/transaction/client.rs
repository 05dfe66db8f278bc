use std::cmp;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use futures_util::future::{self, Either};
use tokio::pin;
use tokio::sync::oneshot;
use tokio::time;

use crate::message::SipMethod;
use crate::transaction::{State, Transaction, TransactionInner};
use crate::transport::{IncomingResponse, OutgoingRequest};
use crate::ua::UserAgent;
use crate::Result;

type TxCompleted = Arc<Mutex<Option<oneshot::Sender<()>>>>;
type RxCompleted = oneshot::Receiver<()>;

/// Represents a Client Non INVITE transaction.
#[derive(Clone)]
pub struct ClientTransaction {
    transaction: TransactionInner,
    tx_completed: TxCompleted,
}

impl ClientTransaction {
    pub(crate) async fn send(mut request: OutgoingRequest, ua: &UserAgent) -> Result<ClientTransaction> {
        let tsx_layer = ua.tsx_layer();
        let method = request.msg.method();

        assert!(
            !matches!(method, SipMethod::Invite | SipMethod::Ack),
            "Invalid method for non-INVITE client transaction: expected non-INVITE/non-ACK, got: {}",
            method
        );

        let transaction = TransactionInner::new_tsx_uac(&request, ua, State::Trying)?;
        let (tx, rx) = oneshot::channel();

        let tx_completed = Arc::new(Mutex::new(Some(tx)));

        let uac = Self {
            transaction,
            tx_completed,
        };

        uac.tsx_send_request(&mut request).await?;

        uac.retrans_loop(rx);

        tsx_layer.add_client_tsx(uac.clone().into());

        Ok(uac)
    }

    fn retrans_loop(&self, mut rx_completed: RxCompleted) {
        let unreliable = !self.reliable();
        let uac = self.clone();

        tokio::spawn(async move {
            pin! {
                let timer_f = time::sleep(64 * Self::T1);
                let timer_e = if unreliable {
                    Either::Left(time::sleep(Self::T1))
                } else {
                    Either::Right(future::pending::<()>())
                };
            }

            'retrans: loop {
                tokio::select! {
                    _ = &mut timer_e => {
                        let state = uac.get_state();
                        match uac.retransmit().await {
                            Ok(retrans) =>  {
                                let interval = if state == State::Trying {
                                    let retrans = Self::T1 * (1 << retrans);
                                    cmp::min(retrans, Self::T2)
                                } else {
                                    Self::T2
                                };
                                let sleep = time::sleep(interval);
                                timer_e.set(Either::Left(sleep));
                            },
                            Err(err) =>  {
                                log::info!("Failed to retransmit: {}", err);
                            },
                        }
                    }
                    _ = &mut timer_f => {
                        // Timer F Expired!
                        let user = uac.user();
                        uac.on_terminated();
                        if let Some(user) = user {
                            uac.ua().on_tsx_timeout(user);
                        }
                        break 'retrans;
                    }

                    _ = &mut rx_completed => {
                        // Got completed state!;
                        break 'retrans;
                    }
                }
            }
        });
    }

    /// Drives the machine with a received response.
    ///
    /// Returns `true` when the response was absorbed and must not reach
    /// the transaction user.
    pub(crate) async fn receive(&self, response: &IncomingResponse) -> Result<bool> {
        let code = response.code();
        self.set_last_status_code(code);

        match self.get_state() {
            State::Trying if code.is_provisional() => {
                self.change_state_to(State::Proceeding);
            }
            State::Trying | State::Proceeding if code.is_final() => {
                self.change_state_to(State::Completed);

                let tx = self.tx_completed.lock().expect("Lock failed").take();
                if let Some(tx) = tx {
                    let _ = tx.send(());
                }
                self.terminate();
            }
            State::Completed => {
                return Ok(true);
            }
            _ => (),
        }

        Ok(false)
    }
}

#[async_trait::async_trait]
impl Transaction for ClientTransaction {
    fn terminate(&self) {
        if self.reliable() {
            self.on_terminated();
        } else {
            // Start timer K
            self.schedule_termination(Self::T4);
        }
    }
}

impl From<ClientTransaction> for super::ClientTsx {
    fn from(tsx: ClientTransaction) -> Self {
        super::ClientTsx::NonInvite(tsx)
    }
}

impl DerefMut for ClientTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}

impl Deref for ClientTransaction {
    type Target = TransactionInner;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{self, Duration};

    use super::*;
    use crate::message::StatusCode;
    use crate::transaction::mock;

    #[tokio::test]
    async fn test_entered_trying() {
        let (ua, _events) = mock::default_ua();
        let request = mock::outgoing_request(SipMethod::Options);

        let uac = ClientTransaction::send(request, &ua).await.unwrap();

        assert_eq!(uac.get_state(), State::Trying);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_timer_f() {
        let (ua, _events) = mock::default_ua();
        let request = mock::outgoing_request(SipMethod::Options);

        let uac = ClientTransaction::send(request, &ua).await.unwrap();

        assert_eq!(uac.get_state(), State::Trying);

        // Wait for the timer to fire
        time::sleep(ClientTransaction::T1 * 64 + Duration::from_millis(1)).await;

        assert_eq!(uac.get_state(), State::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_timer_k() {
        let socket = mock::unreliable_socket();
        let (ua, _events) = mock::default_ua_with(socket.clone());
        let request = mock::outgoing_request_on(SipMethod::Options, socket);
        let response = mock::incoming_response(StatusCode::Ok);

        let uac = ClientTransaction::send(request, &ua).await.unwrap();

        assert_eq!(uac.get_state(), State::Trying);

        uac.receive(&response).await.unwrap();
        // Wait for the timer to fire
        time::sleep(ClientTransaction::T4 + Duration::from_millis(1)).await;

        assert_eq!(uac.get_state(), State::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_e_retransmission() {
        let socket = mock::unreliable_socket();
        let (ua, _events) = mock::default_ua_with(socket.clone());
        let request = mock::outgoing_request_on(SipMethod::Options, socket);

        let uac = ClientTransaction::send(request, &ua).await.unwrap();

        assert!(uac.retrans_count() == 0);

        // For the default values of T1 and T2, this results in
        // intervals of 500 ms, 1 s, 2 s, 4 s, 4 s, 4 s, etc.
        assert_eq!(uac.get_state(), State::Trying);
        // 500 ms
        time::sleep(Duration::from_millis(500 + 1)).await;
        assert!(uac.retrans_count() == 1);
        // 1 s
        time::sleep(Duration::from_secs(1) + Duration::from_millis(1)).await;
        assert!(uac.retrans_count() == 2);
        // 2 s
        time::sleep(Duration::from_secs(2) + Duration::from_millis(1)).await;
        assert!(uac.retrans_count() == 3);
        // 4s
        time::sleep(Duration::from_secs(4) + Duration::from_millis(1)).await;
        assert!(uac.retrans_count() == 4);

        assert_eq!(uac.get_state(), State::Trying);
    }

    #[tokio::test]
    async fn test_receives_100_trying() {
        let (ua, _events) = mock::default_ua();
        let request = mock::outgoing_request(SipMethod::Options);

        let uac = ClientTransaction::send(request, &ua).await.unwrap();

        assert_eq!(uac.get_state(), State::Trying);

        let response = mock::incoming_response(StatusCode::Trying);
        uac.receive(&response).await.unwrap();

        assert_eq!(uac.get_state(), State::Proceeding);
    }

    #[tokio::test]
    async fn test_receives_200_ok() {
        let (ua, _events) = mock::default_ua();
        let request = mock::outgoing_request(SipMethod::Options);
        let response = mock::incoming_response(StatusCode::Ok);

        let uac = ClientTransaction::send(request, &ua).await.unwrap();

        assert_eq!(uac.get_state(), State::Trying);

        let absorbed = uac.receive(&response).await.unwrap();

        assert!(!absorbed);
        assert!(uac.last_status_code() == Some(StatusCode::Ok));
    }
}
