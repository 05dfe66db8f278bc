//! Canned messages and user agents for transaction tests.

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::headers::{CSeq, CallId, Header, Headers, SipHeaderParse, To, Via};
use crate::message::{Request, RequestLine, Response, SipMethod, StatusLine, Uri};
use crate::parser::Parser;
use crate::transport::mock::MockSocket;
use crate::transport::{CoreHeaders, IncomingRequest, IncomingResponse, OutgoingRequest, OutgoingResponse, Packet};
use crate::ua::{Config, UaEvent, UserAgent};

pub fn socket() -> Arc<MockSocket> {
    MockSocket::new()
}

pub fn unreliable_socket() -> Arc<MockSocket> {
    MockSocket::unreliable()
}

pub fn default_ua() -> (UserAgent, UnboundedReceiver<UaEvent>) {
    default_ua_with(socket())
}

pub fn default_ua_with(socket: Arc<MockSocket>) -> (UserAgent, UnboundedReceiver<UaEvent>) {
    let config = Config {
        uri: "sip:alice@127.0.0.1".parse().unwrap(),
        sockets: vec![socket],
        register: false,
        ..Default::default()
    };

    UserAgent::new(config).unwrap()
}

fn core_headers(method: SipMethod) -> CoreHeaders {
    let from = crate::headers::From::from_bytes("sip:alice@127.0.0.1:5060;tag=9fxced76sl".as_bytes()).unwrap();
    let to = To::from_bytes("sip:bob@127.0.0.1:5060".as_bytes()).unwrap();
    let via =
        Via::from_bytes("SIP/2.0/WS 127.0.0.1:5060;branch=z9hG4bK3060200;received=127.0.0.1".as_bytes()).unwrap();
    let cseq = CSeq::new(1, method);
    let call_id = CallId::new("bs9ki9iqbee8k5kal8mpqb");

    CoreHeaders {
        via,
        from,
        cseq,
        call_id,
        to,
    }
}

fn target() -> Uri {
    let p = &mut Parser::new("sip:bob@127.0.0.1:5060".as_bytes());
    p.parse_uri(true).unwrap()
}

pub fn request(m: SipMethod) -> IncomingRequest {
    request_on(m, socket())
}

pub fn request_on(m: SipMethod, socket: Arc<MockSocket>) -> IncomingRequest {
    let core = core_headers(m);
    let packet = Packet {
        payload: Bytes::new(),
        time: SystemTime::now(),
    };

    let mut headers = Headers::with_capacity(5);
    headers.push(Header::Via(core.via.clone()));
    headers.push(Header::From(core.from.clone()));
    headers.push(Header::To(core.to.clone()));
    headers.push(Header::CallId(core.call_id.clone()));
    headers.push(Header::CSeq(core.cseq));

    let req = Request {
        req_line: RequestLine { method: m, uri: target() },
        headers,
        body: None,
    };

    IncomingRequest {
        request: req,
        socket,
        packet,
        transaction: None,
        core,
    }
}

pub fn outgoing_request(m: SipMethod) -> OutgoingRequest {
    outgoing_request_on(m, socket())
}

pub fn outgoing_request_on(m: SipMethod, socket: Arc<dyn crate::transport::Socket>) -> OutgoingRequest {
    let core = core_headers(m);

    let mut headers = Headers::with_capacity(4);

    headers.push(Header::Via(core.via));
    headers.push(Header::From(core.from));
    headers.push(Header::To(core.to));
    headers.push(Header::CSeq(core.cseq));
    headers.push(Header::CallId(core.call_id));

    let req = Request {
        req_line: RequestLine { method: m, uri: target() },
        headers,
        body: None,
    };

    OutgoingRequest {
        msg: req,
        buf: None,
        socket,
    }
}

pub fn response(c: crate::message::StatusCode) -> OutgoingResponse {
    let core = core_headers(SipMethod::Options);

    let mut headers = Headers::with_capacity(5);
    headers.push(Header::Via(core.via));
    headers.push(Header::From(core.from));
    headers.push(Header::To(core.to));
    headers.push(Header::CallId(core.call_id));
    headers.push(Header::CSeq(core.cseq));

    let mut response = Response::new(StatusLine::new(c, c.reason()));
    response.headers = headers;

    OutgoingResponse {
        response,
        buf: None,
        socket: socket(),
    }
}

pub fn incoming_response(c: crate::message::StatusCode) -> IncomingResponse {
    let core = core_headers(SipMethod::Options);

    let mut headers = Headers::with_capacity(5);
    headers.push(Header::Via(core.via.clone()));
    headers.push(Header::From(core.from.clone()));
    headers.push(Header::To(core.to.clone()));
    headers.push(Header::CallId(core.call_id.clone()));
    headers.push(Header::CSeq(core.cseq));

    let mut response = Response::new(StatusLine::new(c, c.reason()));
    response.headers = headers;

    IncomingResponse {
        response,
        socket: socket(),
        packet: Packet {
            payload: Bytes::new(),
            time: SystemTime::now(),
        },
        transaction: None,
        core,
    }
}
