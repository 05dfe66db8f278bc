use core::fmt;
use std::str;

use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::{SipHeaderParse, TAG_PARAM};
use crate::macros::parse_header_param;
use crate::message::{Params, SipAddr};
use crate::parser::Parser;

/// The `To` SIP header.
///
/// Specifies the logical recipient of the request.
#[derive(Debug, PartialEq, Clone)]
pub struct To {
    uri: SipAddr,
    tag: Option<ArcStr>,
    params: Option<Params>,
}

impl To {
    /// Create a new `To` instance.
    pub fn new(uri: SipAddr) -> Self {
        Self {
            uri,
            tag: None,
            params: None,
        }
    }

    /// Get the URI of the `To` header.
    pub fn uri(&self) -> &SipAddr {
        &self.uri
    }

    /// Returns the tag parameter.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Set the tag parameter.
    pub fn set_tag(&mut self, tag: Option<&str>) {
        self.tag = tag.map(Into::into);
    }
}

impl std::str::FromStr for To {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl SipHeaderParse for To {
    const NAME: &'static str = "To";
    const SHORT_NAME: Option<&'static str> = Some("t");
    /*
     * To        =  ( "To" / "t" ) HCOLON ( name-addr
     *              / addr-spec ) *( SEMI to-param )
     * to-param  =  tag-param / generic-param
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        let uri = parser.parse_sip_addr(false)?;
        let mut tag = None;
        let params = parse_header_param!(parser, TAG_PARAM = tag);

        Ok(To { tag, uri, params })
    }
}

impl fmt::Display for To {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", To::NAME, self.uri)?;
        if let Some(tag) = &self.tag {
            write!(f, ";tag={}", tag)?;
        }
        if let Some(params) = &self.params {
            write!(f, ";{}", params)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let src = b"Operator <sips:operator@cs.columbia.edu>;tag=287447\r\n";
        let mut scanner = Parser::new(src);
        let to = To::parse(&mut scanner).unwrap();

        assert_matches!(to, To { uri: SipAddr::NameAddr(addr), tag, .. } => {
            assert_eq!(addr.display(), Some("Operator"));
            assert_eq!(addr.uri.username(), Some("operator"));
            assert_eq!(tag.as_deref(), Some("287447"));
        });
    }

    #[test]
    fn test_set_tag_round_trips() {
        let mut to: To = "<sip:bob@biloxi.com>".parse().unwrap();
        assert_eq!(to.tag(), None);

        to.set_tag(Some("a6c85cf"));
        assert_eq!(to.to_string(), "To: <sip:bob@biloxi.com>;tag=a6c85cf");
    }
}
