//! End-to-end flows driven over a mock socket.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;

use super::*;
use crate::transport::mock::MockSocket;

fn test_ua(socket: Arc<MockSocket>) -> (UserAgent, UnboundedReceiver<UaEvent>) {
    let config = Config {
        uri: "sip:alice@example.com".parse().unwrap(),
        password: Some("secret".into()),
        sockets: vec![socket],
        register: false,
        ..Default::default()
    };

    UserAgent::new(config).unwrap()
}

/// Builds a response to the last request the agent put on the wire,
/// echoing the transaction-identifying headers.
fn respond_to(sent: &str, code: u16, reason: &str, to_tag: Option<&str>, extra: &[&str]) -> Bytes {
    let msg = Parser::new(sent.as_bytes()).parse_sip_msg().unwrap();
    let request = msg.request().expect("sent message is a request");

    let mut out = format!("SIP/2.0 {code} {reason}\r\n");
    for header in request.headers.iter() {
        match header {
            Header::Via(_) | Header::From(_) | Header::CallId(_) | Header::CSeq(_) => {
                out.push_str(&header.to_string());
                out.push_str("\r\n");
            }
            Header::To(to) => {
                out.push_str(&to.to_string());
                if to.tag().is_none() {
                    if let Some(tag) = to_tag {
                        out.push_str(&format!(";tag={tag}"));
                    }
                }
                out.push_str("\r\n");
            }
            _ => (),
        }
    }
    for header in extra {
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str("Content-Length: 0\r\n\r\n");

    Bytes::from(out)
}

fn drain(events: &mut UnboundedReceiver<UaEvent>) -> Vec<String> {
    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(format!("{event:?}"));
    }
    names
}

#[test_log::test(tokio::test)]
async fn test_register_with_challenge() {
    let socket = MockSocket::new();
    let (ua, mut events) = test_ua(socket.clone());

    ua.registration().register().await.unwrap();
    assert_eq!(socket.sent_count(), 1);
    let first = socket.last_sent().unwrap();
    assert!(first.starts_with("REGISTER sip:example.com SIP/2.0"));
    assert!(!first.contains("Authorization:"));

    // The registrar challenges us.
    let challenge = respond_to(
        &first,
        401,
        "Unauthorized",
        Some("reg1"),
        &["WWW-Authenticate: Digest realm=\"example.com\", nonce=\"abc\", algorithm=MD5"],
    );
    ua.receive_data(challenge).await.unwrap();

    assert_eq!(socket.sent_count(), 2);
    let second = socket.last_sent().unwrap();
    assert!(second.contains("Authorization: Digest username=\"alice\""));
    assert!(second.contains("nonce=\"abc\""));

    // And accepts the authenticated retry.
    let ok = respond_to(&second, 200, "OK", Some("reg1"), &["Expires: 300"]);
    ua.receive_data(ok).await.unwrap();

    assert!(ua.is_registered());
    let names = drain(&mut events);
    assert_eq!(names.iter().filter(|n| *n == "Registered").count(), 1);
}

#[tokio::test]
async fn test_register_coalesces_concurrent_calls() {
    let socket = MockSocket::new();
    let (ua, _events) = test_ua(socket.clone());

    ua.registration().register().await.unwrap();
    // A second call while the first REGISTER is outstanding is a no-op.
    ua.registration().register().await.unwrap();

    assert_eq!(socket.sent_count(), 1);
}

#[tokio::test]
async fn test_register_interval_too_brief() {
    let socket = MockSocket::new();
    let (ua, _events) = test_ua(socket.clone());

    ua.registration().register().await.unwrap();
    let first = socket.last_sent().unwrap();

    let too_brief = respond_to(&first, 423, "Interval Too Brief", Some("reg1"), &["Min-Expires: 1800"]);
    ua.receive_data(too_brief).await.unwrap();

    // The retry adopts the registrar's minimum.
    assert_eq!(socket.sent_count(), 2);
    let second = socket.last_sent().unwrap();
    assert!(second.contains("Expires: 1800"));
}

#[test_log::test(tokio::test)]
async fn test_invite_200_ack_confirms_dialog() {
    let socket = MockSocket::new();
    let (ua, mut events) = test_ua(socket.clone());

    let session = ua.call("sip:bob@example.com", None).await.unwrap();
    let invite = socket.last_sent().unwrap();
    assert!(invite.starts_with("INVITE sip:bob@example.com SIP/2.0"));

    ua.receive_data(respond_to(&invite, 100, "Trying", None, &[])).await.unwrap();
    ua.receive_data(respond_to(&invite, 180, "Ringing", Some("bobtag"), &[]))
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Progress);

    ua.receive_data(respond_to(
        &invite,
        200,
        "OK",
        Some("bobtag"),
        &["Contact: <sip:bob@192.0.2.4;transport=ws>"],
    ))
    .await
    .unwrap();

    assert_eq!(session.state(), SessionState::Confirmed);
    let dialog = session.dialog().unwrap();
    assert!(dialog.is_confirmed());

    // Exactly one ACK, with the INVITE's CSeq number and the to-tag.
    let sent = socket.sent();
    let acks: Vec<String> = sent
        .iter()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .filter(|m| m.starts_with("ACK "))
        .collect();
    assert_eq!(acks.len(), 1);
    assert!(acks[0].contains("CSeq: 1 ACK"));
    assert!(acks[0].contains("tag=bobtag"));
    // The ACK goes to the remote target from the Contact.
    assert!(acks[0].starts_with("ACK sip:bob@192.0.2.4"));

    let names = drain(&mut events);
    assert!(names.contains(&"SessionProgress".to_string()));
    assert!(names.contains(&"SessionConfirmed".to_string()));
}

#[tokio::test]
async fn test_invite_486_ends_session() {
    let socket = MockSocket::new();
    let (ua, mut events) = test_ua(socket.clone());

    let session = ua.call("sip:bob@example.com", None).await.unwrap();
    let invite = socket.last_sent().unwrap();

    ua.receive_data(respond_to(&invite, 486, "Busy Here", Some("bobtag"), &[]))
        .await
        .unwrap();

    assert_eq!(session.state(), SessionState::Terminated);
    // The transaction acknowledged the failure.
    assert!(socket.last_sent().unwrap().starts_with("ACK "));

    let mut reason = None;
    while let Ok(event) = events.try_recv() {
        if let UaEvent::SessionEnded { reason: r, .. } = event {
            reason = Some(r);
        }
    }
    assert_eq!(reason.unwrap().status_code, 486);
}

fn incoming_invite(branch: &str, from_tag: &str) -> Bytes {
    Bytes::from(format!(
        "INVITE sip:alice@example.com SIP/2.0\r\n\
         Via: SIP/2.0/WS client.invalid;branch={branch}\r\n\
         Max-Forwards: 70\r\n\
         To: <sip:alice@example.com>\r\n\
         From: <sip:bob@example.com>;tag={from_tag}\r\n\
         Call-ID: inbound-call-1\r\n\
         CSeq: 1 INVITE\r\n\
         Contact: <sip:bob@client.invalid;transport=ws>\r\n\
         Content-Length: 0\r\n\r\n"
    ))
}

#[tokio::test]
async fn test_incoming_invite_answer() {
    let socket = MockSocket::new();
    let (ua, mut events) = test_ua(socket.clone());

    ua.receive_data(incoming_invite("z9hG4bKinb1", "bobtag")).await.unwrap();

    // 100 Trying goes out before the application hears about the call.
    assert!(socket.last_sent().unwrap().contains("SIP/2.0 100 Trying"));

    let mut session = None;
    while let Ok(event) = events.try_recv() {
        if let UaEvent::NewSession { session: s, originator, .. } = event {
            assert_eq!(originator, Originator::Remote);
            session = Some(s);
        }
    }
    let session = session.expect("NewSession event");

    session.progress().await.unwrap();
    assert!(socket.last_sent().unwrap().contains("SIP/2.0 180 Ringing"));

    session.answer(Some(Bytes::from_static(b"v=0"))).await.unwrap();
    let ok = socket.last_sent().unwrap();
    assert!(ok.contains("SIP/2.0 200 OK"));
    assert!(ok.contains(&format!("tag={}", session.id().tag)));
    assert_eq!(session.state(), SessionState::Accepted);

    // The caller's ACK confirms the session.
    let ack = Bytes::from(format!(
        "ACK sip:alice@example.com SIP/2.0\r\n\
         Via: SIP/2.0/WS client.invalid;branch=z9hG4bKack1\r\n\
         To: <sip:alice@example.com>;tag={}\r\n\
         From: <sip:bob@example.com>;tag=bobtag\r\n\
         Call-ID: inbound-call-1\r\n\
         CSeq: 1 ACK\r\n\
         Content-Length: 0\r\n\r\n",
        session.id().tag
    ));
    ua.receive_data(ack).await.unwrap();

    assert_eq!(session.state(), SessionState::Confirmed);
}

#[tokio::test]
async fn test_incoming_cancel_before_answer() {
    let socket = MockSocket::new();
    let (ua, mut events) = test_ua(socket.clone());

    ua.receive_data(incoming_invite("z9hG4bKinb2", "bobtag2")).await.unwrap();

    let cancel = Bytes::from(
        "CANCEL sip:alice@example.com SIP/2.0\r\n\
         Via: SIP/2.0/WS client.invalid;branch=z9hG4bKinb2\r\n\
         To: <sip:alice@example.com>\r\n\
         From: <sip:bob@example.com>;tag=bobtag2\r\n\
         Call-ID: inbound-call-1\r\n\
         CSeq: 1 CANCEL\r\n\
         Content-Length: 0\r\n\r\n",
    );
    ua.receive_data(cancel).await.unwrap();

    let sent: Vec<String> = socket
        .sent()
        .iter()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .collect();

    // 200 for the CANCEL, 487 for the INVITE.
    assert!(sent.iter().any(|m| m.contains("SIP/2.0 200 OK") && m.contains("CSeq: 1 CANCEL")));
    assert!(sent
        .iter()
        .any(|m| m.contains("SIP/2.0 487 Request Terminated") && m.contains("CSeq: 1 INVITE")));

    let mut reason = None;
    while let Ok(event) = events.try_recv() {
        if let UaEvent::SessionEnded { reason: r, .. } = event {
            reason = Some(r);
        }
    }
    assert_eq!(reason.unwrap().cause, "Canceled");
}

#[tokio::test]
async fn test_reinvite_collision_answers_491() {
    let socket = MockSocket::new();
    let (ua, _events) = test_ua(socket.clone());

    // Establish an outgoing call first.
    let session = ua.call("sip:bob@example.com", None).await.unwrap();
    let invite = socket.last_sent().unwrap();
    ua.receive_data(respond_to(
        &invite,
        200,
        "OK",
        Some("bobtag"),
        &["Contact: <sip:bob@192.0.2.4;transport=ws>"],
    ))
    .await
    .unwrap();
    assert_eq!(session.state(), SessionState::Confirmed);

    // Our re-INVITE goes out...
    session.renegotiate(Bytes::from_static(b"v=1")).await.unwrap();

    // ...and the peer's own re-INVITE crosses it on the wire.
    let call_id = session.id().call_id.clone();
    let local_tag = session.id().tag.clone();
    let crossing = Bytes::from(format!(
        "INVITE sip:alice@example.com SIP/2.0\r\n\
         Via: SIP/2.0/WS client.invalid;branch=z9hG4bKcross\r\n\
         To: <sip:alice@example.com>;tag={local_tag}\r\n\
         From: <sip:bob@example.com>;tag=bobtag\r\n\
         Call-ID: {call_id}\r\n\
         CSeq: 2 INVITE\r\n\
         Contact: <sip:bob@192.0.2.4;transport=ws>\r\n\
         Content-Length: 0\r\n\r\n"
    ));
    ua.receive_data(crossing).await.unwrap();

    assert!(socket.last_sent().unwrap().contains("SIP/2.0 491 Request Pending"));
}

#[tokio::test]
async fn test_transport_drop_aborts_invite() {
    let socket = MockSocket::new();
    let (ua, mut events) = test_ua(socket.clone());

    let session = ua.call("sip:bob@example.com", None).await.unwrap();
    let invite = socket.last_sent().unwrap();
    ua.receive_data(respond_to(&invite, 180, "Ringing", Some("bobtag"), &[]))
        .await
        .unwrap();

    // The socket drops between the 180 and the 200.
    ua.on_disconnected(Some("connection reset".into()));

    assert_eq!(session.state(), SessionState::Terminated);
    assert!(ua.tsx_layer().is_empty());

    let names = drain(&mut events);
    assert!(names.contains(&"SocketDisconnected".to_string()));
    assert!(names.contains(&"SessionEnded".to_string()));
}

#[tokio::test]
async fn test_request_for_unknown_user_is_404() {
    let socket = MockSocket::new();
    let (ua, _events) = test_ua(socket.clone());

    let message = Bytes::from(
        "MESSAGE sip:carol@example.com SIP/2.0\r\n\
         Via: SIP/2.0/WS client.invalid;branch=z9hG4bKmsg1\r\n\
         To: <sip:carol@example.com>\r\n\
         From: <sip:bob@example.com>;tag=m1\r\n\
         Call-ID: msg-call-1\r\n\
         CSeq: 1 MESSAGE\r\n\
         Content-Length: 0\r\n\r\n",
    );
    ua.receive_data(message).await.unwrap();

    assert!(socket.last_sent().unwrap().contains("SIP/2.0 404 Not Found"));
}

#[tokio::test]
async fn test_incoming_message_and_options() {
    let socket = MockSocket::new();
    let (ua, mut events) = test_ua(socket.clone());

    let message = Bytes::from(
        "MESSAGE sip:alice@example.com SIP/2.0\r\n\
         Via: SIP/2.0/WS client.invalid;branch=z9hG4bKmsg2\r\n\
         To: <sip:alice@example.com>\r\n\
         From: <sip:bob@example.com>;tag=m2\r\n\
         Call-ID: msg-call-2\r\n\
         CSeq: 1 MESSAGE\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: 5\r\n\r\nhello",
    );
    ua.receive_data(message).await.unwrap();
    assert!(socket.last_sent().unwrap().contains("SIP/2.0 200 OK"));

    let options = Bytes::from(
        "OPTIONS sip:alice@example.com SIP/2.0\r\n\
         Via: SIP/2.0/WS client.invalid;branch=z9hG4bKopt1\r\n\
         To: <sip:alice@example.com>\r\n\
         From: <sip:bob@example.com>;tag=o1\r\n\
         Call-ID: opt-call-1\r\n\
         CSeq: 1 OPTIONS\r\n\
         Content-Length: 0\r\n\r\n",
    );
    ua.receive_data(options).await.unwrap();

    let names = drain(&mut events);
    assert!(names.contains(&"NewMessage".to_string()));
    assert!(names.contains(&"NewOptions".to_string()));
}

#[tokio::test]
async fn test_out_of_dialog_bye_is_481() {
    let socket = MockSocket::new();
    let (ua, _events) = test_ua(socket.clone());

    let bye = Bytes::from(
        "BYE sip:alice@example.com SIP/2.0\r\n\
         Via: SIP/2.0/WS client.invalid;branch=z9hG4bKbye1\r\n\
         To: <sip:alice@example.com>\r\n\
         From: <sip:bob@example.com>;tag=b1\r\n\
         Call-ID: bye-call-1\r\n\
         CSeq: 1 BYE\r\n\
         Content-Length: 0\r\n\r\n",
    );
    ua.receive_data(bye).await.unwrap();

    assert!(socket
        .last_sent()
        .unwrap()
        .contains("SIP/2.0 481 Call/Transaction Does Not Exist"));
}

#[tokio::test]
async fn test_stop_empties_the_transaction_map() {
    let socket = MockSocket::new();
    let (ua, _events) = test_ua(socket.clone());

    ua.stop().await;

    assert!(ua.tsx_layer().is_empty());
    assert!(!ua.is_ready());
}

#[tokio::test]
async fn test_remote_bye_ends_confirmed_session() {
    let socket = MockSocket::new();
    let (ua, mut events) = test_ua(socket.clone());

    let session = ua.call("sip:bob@example.com", None).await.unwrap();
    let invite = socket.last_sent().unwrap();
    ua.receive_data(respond_to(
        &invite,
        200,
        "OK",
        Some("bobtag"),
        &["Contact: <sip:bob@192.0.2.4;transport=ws>"],
    ))
    .await
    .unwrap();

    let call_id = session.id().call_id.clone();
    let local_tag = session.id().tag.clone();
    let bye = Bytes::from(format!(
        "BYE sip:alice@example.com SIP/2.0\r\n\
         Via: SIP/2.0/WS client.invalid;branch=z9hG4bKbye2\r\n\
         To: <sip:alice@example.com>;tag={local_tag}\r\n\
         From: <sip:bob@example.com>;tag=bobtag\r\n\
         Call-ID: {call_id}\r\n\
         CSeq: 2 BYE\r\n\
         Content-Length: 0\r\n\r\n"
    ));
    ua.receive_data(bye).await.unwrap();

    assert!(socket.last_sent().unwrap().contains("SIP/2.0 200 OK"));
    assert_eq!(session.state(), SessionState::Terminated);

    let names = drain(&mut events);
    assert!(names.contains(&"SessionEnded".to_string()));
}
