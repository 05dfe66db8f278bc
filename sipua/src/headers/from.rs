use core::fmt;
use std::str;

use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::{SipHeaderParse, TAG_PARAM};
use crate::macros::parse_header_param;
use crate::message::{Params, SipAddr};
use crate::parser::Parser;

/// The `From` SIP header.
///
/// Indicates the initiator of the request.
///
/// # Examples
/// ```
/// # use sipua::headers::From;
/// let f: From = "\"Alice\" <sip:alice@atlanta.com>;tag=1928301774".parse().unwrap();
///
/// assert_eq!(f.tag(), Some("1928301774"));
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct From {
    uri: SipAddr,
    tag: Option<ArcStr>,
    params: Option<Params>,
}

impl From {
    /// Create a new `From` instance.
    pub fn new(uri: SipAddr) -> Self {
        Self {
            uri,
            tag: None,
            params: None,
        }
    }

    /// Create a new `From` instance with a tag.
    pub fn new_with_tag(uri: SipAddr, tag: &str) -> Self {
        Self {
            uri,
            tag: Some(tag.into()),
            params: None,
        }
    }

    /// Get the URI of the `From` header.
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

impl std::str::FromStr for From {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl SipHeaderParse for From {
    const NAME: &'static str = "From";
    const SHORT_NAME: Option<&'static str> = Some("f");
    /*
     * From        =  ( "From" / "f" ) HCOLON from-spec
     * from-spec   =  ( name-addr / addr-spec )
     *                *( SEMI from-param )
     * from-param  =  tag-param / generic-param
     * tag-param   =  "tag" EQUAL token
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        let uri = parser.parse_sip_addr(false)?;
        let mut tag = None;
        let params = parse_header_param!(parser, TAG_PARAM = tag);

        Ok(From { tag, uri, params })
    }
}

impl fmt::Display for From {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", From::NAME, self.uri)?;
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
    use crate::message::{Host, Scheme};

    use super::*;

    #[test]
    fn test_parse() {
        let src = b"\"A. G. Bell\" <sip:agb@bell-telephone.com> ;tag=a48s\r\n";
        let mut scanner = Parser::new(src);
        let from = From::parse(&mut scanner).unwrap();

        assert_matches!(from, From {
            uri: SipAddr::NameAddr(addr),
            tag,
            ..
        } => {
            assert_eq!(addr.display(), Some("A. G. Bell"));
            assert_eq!(addr.uri.username(), Some("agb"));
            assert_eq!(addr.uri.host_port.host, Host::DomainName("bell-telephone.com".into()));
            assert_eq!(addr.uri.scheme, Scheme::Sip);
            assert_eq!(tag.as_deref(), Some("a48s"));
        });

        let src = b"sip:+12125551212@server.phone2net.com;tag=887s\r\n";
        let mut scanner = Parser::new(src);
        let from = From::parse(&mut scanner).unwrap();

        assert_matches!(from, From {
            uri: SipAddr::Uri(uri),
            tag,
            ..
        } => {
            assert_eq!(uri.username(), Some("+12125551212"));
            assert_eq!(uri.host_port.host, Host::DomainName("server.phone2net.com".into()));
            assert_eq!(uri.scheme, Scheme::Sip);
            assert_eq!(tag.as_deref(), Some("887s"));
        });

        let src = b"Anonymous <sip:c8oqz84zk7z@privacy.org>;tag=hyh8\r\n";
        let mut scanner = Parser::new(src);
        let from = From::parse(&mut scanner).unwrap();

        assert_matches!(from, From {
            uri: SipAddr::NameAddr(addr),
            tag,
            ..
        } => {
            assert_eq!(addr.display(), Some("Anonymous"));
            assert_eq!(addr.uri.username(), Some("c8oqz84zk7z"));
            assert_eq!(tag.as_deref(), Some("hyh8"));
        });
    }
}
