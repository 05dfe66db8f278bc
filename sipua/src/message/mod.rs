#![deny(missing_docs)]
//! SIP Message types
//!
//! The module provide the [`SipMsg`] enum that can be an [`SipMsg::Request`] or
//! [`SipMsg::Response`] and represents a SIP message.

use bytes::Bytes;

use crate::headers::Headers;
use crate::parser::SIPV2;

pub mod auth;

mod code;
mod method;
mod params;
mod protocol;
mod uri;

pub use auth::*;
pub use code::*;
pub use method::*;
pub use params::*;
pub use protocol::*;
pub use uri::*;

/// An SIP message, either Request or Response.
///
/// This enum can contain either an [`Request`] or an [`Response`], see their
/// respective documentation for more details.
#[derive(Debug)]
pub enum SipMsg {
    /// An SIP Request.
    Request(Request),
    /// An SIP Response.
    Response(Response),
}

impl SipMsg {
    /// Returns [`true`] if this message is an [`Request`] message, and [`false`]
    /// otherwise.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sipua::message::*;
    ///
    /// let uri = "sip:alice@example.com".parse().unwrap();
    /// let msg: SipMsg = Request::new(SipMethod::Options, uri).into();
    ///
    /// assert!(msg.is_request());
    /// ```
    pub const fn is_request(&self) -> bool {
        matches!(self, SipMsg::Request(_))
    }

    /// Returns [`true`] if this message is an [`Response`] message, and [`false`]
    /// otherwise.
    pub const fn is_response(&self) -> bool {
        matches!(self, SipMsg::Response(_))
    }

    /// Returns a reference to the [`Request`] if this is a [`SipMsg::Request`] variant.
    pub fn request(&self) -> Option<&Request> {
        if let SipMsg::Request(request) = self {
            Some(request)
        } else {
            None
        }
    }

    /// Returns a reference to the [`Response`] if this is a [`SipMsg::Response`] variant.
    pub fn response(&self) -> Option<&Response> {
        if let SipMsg::Response(response) = self {
            Some(response)
        } else {
            None
        }
    }

    /// Returns a reference to the headers of the message.
    pub fn headers(&self) -> &Headers {
        match self {
            SipMsg::Request(req) => &req.headers,
            SipMsg::Response(res) => &res.headers,
        }
    }

    /// Returns a mutable reference to the headers of the message.
    pub fn headers_mut(&mut self) -> &mut Headers {
        match self {
            SipMsg::Request(req) => &mut req.headers,
            SipMsg::Response(res) => &mut res.headers,
        }
    }

    /// Returns a reference to the message body.
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            SipMsg::Request(request) => request.body.as_deref(),
            SipMsg::Response(response) => response.body.as_deref(),
        }
    }

    /// Sets the body of the message. It can be `None` to remove the body.
    pub fn set_body(&mut self, body: Option<Bytes>) {
        match self {
            SipMsg::Request(req) => {
                req.body = body;
            }
            SipMsg::Response(res) => {
                res.body = body;
            }
        }
    }
}

impl From<Request> for SipMsg {
    fn from(value: Request) -> Self {
        SipMsg::Request(value)
    }
}

impl From<Response> for SipMsg {
    fn from(value: Response) -> Self {
        SipMsg::Response(value)
    }
}

/// A parsed SIP Request.
///
/// SIP request represents a request from a client to a server.
#[derive(Debug)]
pub struct Request {
    /// The Request-Line of the SIP message.
    pub req_line: RequestLine,
    /// All headers present in the SIP message.
    pub headers: Headers,
    /// The body of the SIP message, if present.
    pub body: Option<Bytes>,
}

impl Request {
    /// Creates a new SIP `Request`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sipua::message::{Request, SipMethod, Uri};
    ///
    /// let uri: Uri = "sip:localhost".parse().unwrap();
    /// let request = Request::new(SipMethod::Options, uri);
    /// ```
    pub fn new(method: SipMethod, uri: Uri) -> Self {
        Request {
            req_line: RequestLine { method, uri },
            headers: Default::default(),
            body: None,
        }
    }

    /// Creates a new `Request` with the given headers.
    #[inline]
    pub const fn new_with_headers(method: SipMethod, uri: Uri, headers: Headers) -> Self {
        Self {
            req_line: RequestLine { method, uri },
            headers,
            body: None,
        }
    }

    /// Returns the SIP method of the request.
    pub fn method(&self) -> &SipMethod {
        &self.req_line.method
    }

    /// Returns the Request-URI of the request.
    pub fn uri(&self) -> &Uri {
        &self.req_line.uri
    }
}

impl std::fmt::Display for RequestLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {SIPV2}\r\n", self.method, self.uri)
    }
}

/// Represents a SIP Request-Line.
///
/// The Request-Line contains the method and the Request-URI,
/// which indicate the target of the SIP request.
#[derive(Debug)]
pub struct RequestLine {
    /// The SIP method associated with the request (e.g., INVITE, BYE).
    pub method: SipMethod,
    /// The Request-URI indicating the target of the request.
    pub uri: Uri,
}

/// A parsed SIP Response.
#[derive(Debug)]
pub struct Response {
    /// The Status-Line of the SIP message.
    pub status_line: StatusLine,
    /// All headers present in the SIP message.
    pub headers: Headers,
    /// The body of the SIP message, if present.
    pub body: Option<Bytes>,
}

impl Response {
    /// Creates a new SIP `Response` from a `Status-Line`,
    /// with empty headers and no body.
    pub fn new(status_line: StatusLine) -> Self {
        Self {
            status_line,
            headers: Default::default(),
            body: None,
        }
    }

    /// Returns the message response code.
    pub fn code(&self) -> StatusCode {
        self.status_line.code
    }

    /// Returns the reason.
    pub fn reason(&self) -> &str {
        &self.status_line.reason
    }

    /// Creates a new `Response` with the given `Status-Line` and headers,
    pub const fn new_with_headers(status_line: StatusLine, headers: Headers) -> Self {
        Self {
            status_line,
            headers,
            body: None,
        }
    }

    /// Set the headers of the response, replacing any existing headers.
    pub fn set_headers(&mut self, headers: Headers) {
        self.headers = headers;
    }

    /// Appends headers from another collection to the current headers.
    pub fn append_headers(&mut self, other: &mut Headers) {
        self.headers.append(other);
    }
}

/// Represents a SIP Status-Line.
///
/// The Status-Line appears in SIP responses and includes a
/// status code and a reason phrase explaining the result
/// of the request.
#[derive(Debug)]
pub struct StatusLine {
    /// The SIP status code associated with the response (e.g., 200, 404).
    pub code: StatusCode,
    /// The reason phrase explaining the status code (e.g., "OK", "Not Found").
    pub reason: sipua_util::ArcStr,
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{SIPV2} {} {}\r\n", self.code.into_u16(), self.reason)
    }
}

impl StatusLine {
    /// Creates a new `StatusLine` instance from the given [`StatusCode`] and reason.
    ///
    /// # Examples
    /// ```
    /// # use sipua::message::StatusLine;
    /// let status_line = StatusLine::new(200.into(), "OK");
    /// ```
    pub fn new(code: StatusCode, reason: &str) -> Self {
        StatusLine {
            code,
            reason: reason.into(),
        }
    }
}
