//! # sipua
//!
//! A rust library that implements the core of a SIP User Agent over
//! message-framed transports such as WebSocket.

pub mod auth;
pub mod headers;
pub mod message;
pub mod parser;
pub mod transaction;
pub mod transport;
pub mod ua;

pub(crate) mod error;
pub(crate) mod macros;

pub use error::{EndReason, Result};
pub use ua::{Config, UaEvent, UserAgent};

use error::Error;
use parser::Parser;

#[cfg(test)]
#[macro_use]
extern crate assert_matches;

use std::fmt;
use std::str::{self, FromStr};

use sipua_util::ArcStr;

use crate::error::SipParserError;
use crate::message::Params;

/// Represents a quality value (q-value) used in SIP
/// headers.
///
/// The `Q` struct provides a method to parse a string
/// representation of a q-value into a `Q` instance. The
/// q-value is typically used to indicate the preference
/// of certain SIP headers.
///
/// # Example
///
/// ```
/// use sipua::Q;
///
/// let q_value = "0.5".parse();
/// assert_eq!(q_value, Ok(Q(0, 5)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub struct Q(pub u8, pub u8);

impl Q {
    /// Creates a `Q` from its integer and fractional parts.
    pub fn new(a: u8, b: u8) -> Self {
        Self(a, b)
    }
}

impl From<u8> for Q {
    fn from(value: u8) -> Self {
        Self(value, 0)
    }
}

/// Error returned when a q-value fails to parse.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseQError;

impl From<ParseQError> for Error {
    fn from(value: ParseQError) -> Self {
        Self::ParseError(SipParserError {
            message: format!("{:?}", value),
        })
    }
}

impl FromStr for Q {
    type Err = ParseQError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.rsplit_once('.') {
            Some((a, b)) => {
                let a = a.parse().map_err(|_| ParseQError)?;
                let b = b.parse().map_err(|_| ParseQError)?;
                Ok(Q(a, b))
            }
            None => match s.parse() {
                Ok(n) => Ok(Q(n, 0)),
                Err(_) => Err(ParseQError),
            },
        }
    }
}

impl fmt::Display for Q {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ";q={}.{}", self.0, self.1)
    }
}

/// This type reprents an MIME type that indicates an
/// content format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    /// The top-level type, e.g. `application`.
    pub mtype: ArcStr,
    /// The subtype, e.g. `sdp`.
    pub subtype: ArcStr,
}

/// The `media-type` that appears in `Accept` and
/// `Content-Type` SIP headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// The MIME type.
    pub mimetype: MimeType,
    /// Optional media parameters.
    pub param: Option<Params>,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let MediaType { mimetype, param } = self;
        write!(f, "{}/{}", mimetype.mtype, mimetype.subtype)?;
        if let Some(param) = &param {
            write!(f, ";{}", param)?;
        }
        Ok(())
    }
}

impl MediaType {
    /// Constructs a `MediaType` from a type and a subtype.
    pub fn new(mtype: &str, subtype: &str) -> Self {
        Self {
            mimetype: MimeType {
                mtype: mtype.into(),
                subtype: subtype.into(),
            },
            param: None,
        }
    }

    /// Parses a `media-type` from the given parser.
    pub fn parse(parser: &mut Parser) -> Result<Self> {
        let mtype = parser.parse_token()?;
        parser.must_read(b'/')?;
        let subtype = parser.parse_token()?;
        let param = crate::macros::parse_header_param!(parser);

        Ok(Self {
            mimetype: MimeType {
                mtype: mtype.into(),
                subtype: subtype.into(),
            },
            param,
        })
    }

    /// Parses a `MediaType` from a static string.
    pub fn from_static(s: &'static str) -> Result<Self> {
        Self::parse(&mut Parser::new(s.as_bytes()))
    }
}
