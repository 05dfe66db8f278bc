#![warn(missing_docs)]
//! SIP Transport Layer.
//!
//! The transport contract is a message-framed [`Socket`]: every
//! [`SocketEvent::Data`] carries one complete SIP message (or a CRLF
//! keep-alive probe). The UA owns the receiving end of the event channel
//! and drives parsing and dispatch from there.

use std::io::Write;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::headers::{CSeq, CallId, ContentLength, From as FromHdr, Header, Headers, SipHeaderParse, To, Via};
use crate::message::{Request, Response, SipMethod, StatusCode, TransportKind};
use crate::transaction::{ClientTsx, ServerTsx, TsxKey};

pub mod ws;

#[cfg(test)]
pub(crate) mod mock;

/// A double CRLF, sent by a peer as a keep-alive probe.
pub const KEEPALIVE_PING: &[u8] = b"\r\n\r\n";
/// A single CRLF, the answer to a keep-alive probe.
pub const KEEPALIVE_PONG: &[u8] = b"\r\n";

/// This trait represents a abstraction over a message-framed SIP
/// transport, typically a WebSocket connection.
#[async_trait::async_trait]
pub trait Socket: Sync + Send + 'static {
    /// Opens the connection.
    ///
    /// Connection lifecycle and inbound frames are reported through
    /// `events`; the call returns once the connection attempt has either
    /// been established or failed.
    async fn connect(&self, events: SocketTx) -> Result<()>;

    /// Closes the connection.
    async fn disconnect(&self);

    /// Sends one complete SIP message (or keep-alive probe).
    ///
    /// Returns the number of bytes handed to the transport.
    async fn send(&self, buf: &[u8]) -> Result<usize>;

    /// Returns the transport kind placed in `Via` headers and the
    /// `transport` uri parameter.
    fn tp_kind(&self) -> TransportKind;

    /// Returns the remote endpoint in printable form (e.g. the ws url).
    fn peer_name(&self) -> &str;

    /// Returns the peer's IP address when the transport knows it; used to
    /// stamp the `received` Via parameter (RFC 3581).
    fn peer_addr(&self) -> Option<std::net::IpAddr> {
        None
    }

    /// Returns `true` if the transport guarantees delivery.
    fn reliable(&self) -> bool {
        self.tp_kind().reliable()
    }

    /// Returns `true` if the transport is encrypted.
    fn secure(&self) -> bool {
        self.tp_kind().secure()
    }
}

/// Connection lifecycle and data events produced by a [`Socket`].
pub enum SocketEvent {
    /// A connection attempt is starting.
    Connecting {
        /// 1-based attempt counter.
        attempt: u32,
    },
    /// The connection is open.
    Connected,
    /// The connection closed, voluntarily or not.
    Disconnected {
        /// The error that closed the connection, if any.
        error: Option<String>,
    },
    /// One inbound message frame.
    Data(Bytes),
}

/// Sending half of the socket event channel.
pub type SocketTx = mpsc::UnboundedSender<SocketEvent>;
/// Receiving half of the socket event channel.
pub type SocketRx = mpsc::UnboundedReceiver<SocketEvent>;

/// This type represents a received SIP packet.
#[derive(Clone)]
pub struct Packet {
    /// The packet payload.
    pub payload: Bytes,
    /// The time the packet was received.
    pub time: SystemTime,
}

/// This trait is used to convert a message into a wire buffer.
pub trait ToBytes: Sized {
    /// Converts the type into a byte buffer.
    fn to_bytes(&self) -> Result<Bytes>;
}

fn write_msg(headers: &Headers, body: Option<&[u8]>, buf_writer: &mut impl Write) -> std::io::Result<()> {
    for header in headers.iter() {
        write!(buf_writer, "{header}\r\n")?;
    }

    match body {
        Some(body) => {
            if !headers.contains(ContentLength::NAME) {
                write!(buf_writer, "{}: {}\r\n", ContentLength::NAME, body.len())?;
            }
            write!(buf_writer, "\r\n")?;
            buf_writer.write_all(body)?;
        }
        None => {
            if !headers.contains(ContentLength::NAME) {
                write!(buf_writer, "{}: 0\r\n", ContentLength::NAME)?;
            }
            write!(buf_writer, "\r\n")?;
        }
    }

    Ok(())
}

/// This type represents an outbound SIP request.
pub struct OutgoingRequest {
    /// The SIP request message.
    pub msg: Request,
    /// The message raw buffer.
    pub buf: Option<Bytes>,
    /// The socket to send the request on.
    pub socket: Arc<dyn Socket>,
}

impl ToBytes for OutgoingRequest {
    fn to_bytes(&self) -> Result<Bytes> {
        let estimated_message_size = if self.msg.body.is_none() { 800 } else { 1500 };
        let buf = BytesMut::with_capacity(estimated_message_size);

        let mut buf_writer = buf.writer();

        write!(buf_writer, "{}", &self.msg.req_line)?;
        write_msg(&self.msg.headers, self.msg.body.as_deref(), &mut buf_writer)?;

        Ok(buf_writer.into_inner().freeze())
    }
}

/// This type represents an outgoing SIP response.
pub struct OutgoingResponse {
    /// The SIP response message.
    pub response: Response,
    /// The message raw buffer.
    pub buf: Option<Bytes>,
    /// The socket to send the response on.
    pub socket: Arc<dyn Socket>,
}

impl OutgoingResponse {
    /// Returns the message status code.
    pub fn status_code(&self) -> StatusCode {
        self.response.status_line.code
    }

    /// Append headers to the message.
    pub fn append_headers(&mut self, other: &mut Headers) {
        self.response.append_headers(other);
    }

    /// Returns the message reason text.
    pub fn reason(&self) -> &str {
        &self.response.status_line.reason
    }

    /// Returns `true` if this is a provisional response.
    pub fn is_provisional(&self) -> bool {
        self.response.status_line.code.is_provisional()
    }

    /// Set the message body.
    pub fn set_body(&mut self, body: Bytes) {
        self.response.body = Some(body);
    }

    /// Returns a mutable reference to the response headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.response.headers
    }
}

impl ToBytes for OutgoingResponse {
    fn to_bytes(&self) -> Result<Bytes> {
        let estimated_message_size = if self.response.body.is_none() { 800 } else { 1500 };
        let buf = BytesMut::with_capacity(estimated_message_size);

        let mut buf_writer = buf.writer();

        write!(buf_writer, "{}", &self.response.status_line)?;
        write_msg(&self.response.headers, self.response.body.as_deref(), &mut buf_writer)?;

        Ok(buf_writer.into_inner().freeze())
    }
}

/// The mandatory headers every dispatchable message carries.
pub(crate) struct CoreHeaders {
    /// The topmost Via header as found in the message.
    pub via: Via,
    /// The From header found in the message.
    pub from: FromHdr,
    /// The CSeq header as found in the message.
    pub cseq: CSeq,
    /// The Call-ID header found in the message.
    pub call_id: CallId,
    /// The To header found in the message.
    pub to: To,
}

impl CoreHeaders {
    /// Extracts the mandatory headers, failing on the first one missing.
    pub(crate) fn extract(headers: &Headers) -> Result<Self> {
        let mut via = None;
        let mut cseq = None;
        let mut from = None;
        let mut call_id = None;
        let mut to = None;

        for header in headers.iter() {
            match header {
                Header::Via(v) if via.is_none() => via = Some(v.clone()),
                Header::From(f) => from = Some(f.clone()),
                Header::To(t) => to = Some(t.clone()),
                Header::CallId(c) => call_id = Some(c.clone()),
                Header::CSeq(c) => cseq = Some(*c),
                _ => (),
            }
        }

        let Some(via) = via else {
            return Err(Error::MissingRequiredHeader(Via::NAME));
        };
        let Some(from) = from else {
            return Err(Error::MissingRequiredHeader(FromHdr::NAME));
        };
        let Some(to) = to else {
            return Err(Error::MissingRequiredHeader(To::NAME));
        };
        let Some(call_id) = call_id else {
            return Err(Error::MissingRequiredHeader(CallId::NAME));
        };
        let Some(cseq) = cseq else {
            return Err(Error::MissingRequiredHeader(CSeq::NAME));
        };

        Ok(CoreHeaders {
            via,
            from,
            cseq,
            call_id,
            to,
        })
    }
}

/// This type represents an received SIP request.
pub struct IncomingRequest {
    /// The SIP request message.
    pub(crate) request: Request,
    /// The socket the request arrived on.
    pub(crate) socket: Arc<dyn Socket>,
    /// The packet that contained the request.
    pub(crate) packet: Packet,
    /// The server transaction associated with this request, if any.
    pub(crate) transaction: Option<ServerTsx>,
    /// The mandatory headers extracted from the request.
    pub(crate) core: CoreHeaders,
}

impl IncomingRequest {
    /// Returns the `To` header of the request.
    pub fn to(&self) -> &To {
        &self.core.to
    }

    /// Returns the `From` header of the request.
    pub fn from(&self) -> &FromHdr {
        &self.core.from
    }

    /// Returns the `Call-ID` header of the request.
    pub fn call_id(&self) -> &CallId {
        &self.core.call_id
    }

    /// Returns the `CSeq` header of the request.
    pub fn cseq(&self) -> &CSeq {
        &self.core.cseq
    }

    /// Returns the topmost `Via` header of the request.
    pub fn via(&self) -> &Via {
        &self.core.via
    }

    /// Returns the transaction key for this request (if any).
    pub fn tsx_key(&self) -> Option<&TsxKey> {
        self.transaction.as_ref().map(|tsx| tsx.key())
    }

    /// Returns `true` if the message method matches the given `SipMethod`.
    #[inline(always)]
    pub fn is_method(&self, method: &SipMethod) -> bool {
        self.request.method() == method
    }

    /// Returns the message method.
    pub fn method(&self) -> &SipMethod {
        self.request.method()
    }

    /// Returns the request message.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the message body, if any.
    pub fn body(&self) -> Option<&[u8]> {
        self.request.body.as_deref()
    }

    #[inline]
    pub(crate) fn set_tsx(&mut self, tsx: ServerTsx) {
        self.transaction = Some(tsx);
    }
}

/// Represents an received SIP response.
pub struct IncomingResponse {
    /// The SIP response message.
    pub(crate) response: Response,
    /// The socket the response arrived on.
    #[allow(dead_code)]
    pub(crate) socket: Arc<dyn Socket>,
    /// The packet that contained the response.
    #[allow(dead_code)]
    pub(crate) packet: Packet,
    /// The client transaction this response matched, if any.
    pub(crate) transaction: Option<ClientTsx>,
    /// The mandatory headers extracted from the response.
    pub(crate) core: CoreHeaders,
}

impl IncomingResponse {
    /// Returns the status code of the response.
    pub fn code(&self) -> StatusCode {
        self.response.code()
    }

    /// Returns the `To` header of the response.
    pub fn to(&self) -> &To {
        &self.core.to
    }

    /// Returns the `CSeq` header of the response.
    pub fn cseq(&self) -> &CSeq {
        &self.core.cseq
    }

    /// Returns the `Call-ID` header of the response.
    pub fn call_id(&self) -> &CallId {
        &self.core.call_id
    }

    /// Returns the response message.
    pub fn response(&self) -> &Response {
        &self.response
    }
}
