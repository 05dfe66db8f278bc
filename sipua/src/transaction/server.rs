use std::ops::{Deref, DerefMut};

use async_trait::async_trait;

use crate::error::Result;
use crate::message::SipMethod;
use crate::transaction::{State, Transaction, TransactionInner};
use crate::transport::{IncomingRequest, OutgoingResponse};
use crate::ua::UserAgent;

/// Represents a Server Non INVITE transaction.
#[derive(Clone)]
pub struct ServerTransaction {
    transaction: TransactionInner,
}

impl ServerTransaction {
    pub(crate) fn new(ua: &UserAgent, request: &mut IncomingRequest) -> Result<Self> {
        assert!(
            !matches!(request.method(), SipMethod::Ack | SipMethod::Invite),
            "Request method cannot be Ack or Invite",
        );
        let tsx_layer = ua.tsx_layer();
        let transaction = TransactionInner::new_tsx_uas(request, ua, State::Trying)?;
        let server_tsx = ServerTransaction { transaction };

        request.set_tsx(server_tsx.clone().into());
        tsx_layer.add_server_tsx(server_tsx.clone().into());

        Ok(server_tsx)
    }

    /// Sends a response through the transaction, driving the state
    /// machine. In the `Completed` state retransmissions of the request
    /// are answered with the last response until Timer J fires.
    pub(crate) async fn respond(&self, msg: &mut OutgoingResponse) -> Result<()> {
        self.tsx_send_response(msg).await?;

        match self.get_state() {
            State::Trying if msg.is_provisional() => {
                self.change_state_to(State::Proceeding);
            }
            State::Trying | State::Proceeding => {
                self.change_state_to(State::Completed);
                self.terminate();
            }
            _ => (),
        }

        Ok(())
    }
}

#[async_trait]
impl Transaction for ServerTransaction {
    fn terminate(&self) {
        if self.reliable() {
            self.on_terminated();
        } else {
            // Timer J
            self.schedule_termination(Self::T1 * 64);
        }
    }
}

impl DerefMut for ServerTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}

impl Deref for ServerTransaction {
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
    async fn test_receives_100_trying() {
        let (ua, _events) = mock::default_ua();
        let mut request = mock::request(SipMethod::Options);
        let tsx = ServerTransaction::new(&ua, &mut request).unwrap();
        let response = &mut mock::response(StatusCode::Trying);

        tsx.respond(response).await.unwrap();

        assert!(tsx.last_status_code().unwrap().into_u16() == 100);
        assert!(tsx.get_state() == State::Proceeding);
    }

    #[tokio::test]
    async fn test_receives_200_ok() {
        let (ua, _events) = mock::default_ua();
        let mut request = mock::request(SipMethod::Options);
        let tsx = ServerTransaction::new(&ua, &mut request).unwrap();
        let response = &mut mock::response(StatusCode::Ok);

        tsx.respond(response).await.unwrap();

        assert!(tsx.last_status_code().unwrap().into_u16() == 200);
        // Reliable transport, Timer J is zero.
        assert!(tsx.get_state() == State::Terminated);
    }

    #[tokio::test]
    async fn test_retransmit_proceeding() {
        let socket = mock::unreliable_socket();
        let (ua, _events) = mock::default_ua_with(socket.clone());
        let mut request = mock::request_on(SipMethod::Options, socket);
        let tsx = ServerTransaction::new(&ua, &mut request).unwrap();
        let response = &mut mock::response(StatusCode::Trying);

        tsx.respond(response).await.unwrap();

        let as_server_tsx: crate::transaction::ServerTsx = tsx.clone().into();
        as_server_tsx.receive_request(&request).await.unwrap();

        assert!(tsx.retrans_count() == 1);
        assert!(tsx.last_status_code().unwrap().into_u16() == 100);
        assert!(tsx.get_state() == State::Proceeding);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminated_timer_j() {
        let socket = mock::unreliable_socket();
        let (ua, _events) = mock::default_ua_with(socket.clone());
        let mut request = mock::request_on(SipMethod::Options, socket);
        let tsx = ServerTransaction::new(&ua, &mut request).unwrap();
        let response = &mut mock::response(StatusCode::Ok);

        tsx.respond(response).await.unwrap();

        time::sleep(ServerTransaction::T1 * 64 + Duration::from_millis(1)).await;

        assert!(tsx.last_status_code().unwrap().into_u16() == 200);
        assert!(tsx.get_state() == State::Terminated);
    }
}
