use std::fmt;

use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::parse_header_param;
use crate::message::Params;
use crate::parser::Parser;

const ID_PARAM: &str = "id";

/// The `Event` SIP header.
///
/// Names the event package a `SUBSCRIBE` or `NOTIFY` refers to (RFC 6665).
///
/// # Examples
///
/// ```
/// # use sipua::headers::Event;
/// let event: Event = "presence;id=42".parse().unwrap();
///
/// assert_eq!(event.event(), "presence");
/// assert_eq!(event.id(), Some("42"));
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Event {
    event: ArcStr,
    id: Option<ArcStr>,
    params: Option<Params>,
}

impl Event {
    /// Creates a new `Event` instance.
    pub fn new(event: &str, id: Option<&str>) -> Self {
        Self {
            event: event.into(),
            id: id.map(Into::into),
            params: None,
        }
    }

    /// Returns the event package name.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Returns the `id` parameter, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl std::str::FromStr for Event {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl SipHeaderParse for Event {
    const NAME: &'static str = "Event";
    const SHORT_NAME: Option<&'static str> = Some("o");
    /*
     * Event             =  ( "Event" / "o" ) HCOLON event-type
     *                      *( SEMI event-param )
     * event-type        =  event-package *( "." event-template )
     * event-param       =  generic-param / ( "id" EQUAL token )
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let event = parser.parse_token()?.into();
        let mut id = None;
        let params = parse_header_param!(parser, ID_PARAM = id);

        Ok(Event { event, id, params })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", Event::NAME, self.event)?;
        if let Some(id) = &self.id {
            write!(f, ";id={}", id)?;
        }
        if let Some(params) = &self.params {
            write!(f, ";{}", params)?;
        }

        Ok(())
    }
}
