use core::fmt;
use std::str;

use crate::error::Result;
use crate::headers::{SipHeaderParse, EXPIRES_PARAM};
use crate::macros::parse_header_param;
use crate::message::{Params, SipAddr};
use crate::parser::Parser;
use crate::Q;

const Q_PARAM: &str = "q";

/// The `Contact` SIP header.
///
/// Specifies the URI the sender wants to receive new requests at.
/// A `REGISTER` request removing every binding carries the wildcard
/// form `Contact: *`.
///
/// # Examples
///
/// ```
/// # use sipua::headers::Contact;
/// let contact: Contact = "<sips:bob@192.0.2.4>;expires=60".parse().unwrap();
///
/// assert_eq!(contact.expires(), Some(60));
/// ```
#[derive(Debug, PartialEq, Clone)]
pub enum Contact {
    /// The wildcard contact, `*`.
    Star,
    /// A concrete contact address.
    Addr(ContactAddr),
}

/// A single non-wildcard `Contact` entry.
#[derive(Debug, PartialEq, Clone)]
pub struct ContactAddr {
    /// The contact address.
    pub addr: SipAddr,
    /// The `q` parameter, if any.
    pub q: Option<Q>,
    /// The `expires` parameter, if any.
    pub expires: Option<u32>,
    /// Remaining header parameters.
    pub params: Option<Params>,
}

impl Contact {
    /// Creates a contact from an address with no parameters.
    pub fn new(addr: SipAddr) -> Self {
        Contact::Addr(ContactAddr {
            addr,
            q: None,
            expires: None,
            params: None,
        })
    }

    /// Returns `true` for the wildcard contact.
    pub fn is_star(&self) -> bool {
        matches!(self, Contact::Star)
    }

    /// Returns the contact address unless this is the wildcard.
    pub fn addr(&self) -> Option<&SipAddr> {
        match self {
            Contact::Star => None,
            Contact::Addr(c) => Some(&c.addr),
        }
    }

    /// Returns the `expires` parameter, if any.
    pub fn expires(&self) -> Option<u32> {
        match self {
            Contact::Star => None,
            Contact::Addr(c) => c.expires,
        }
    }
}

impl std::str::FromStr for Contact {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl SipHeaderParse for Contact {
    const NAME: &'static str = "Contact";
    const SHORT_NAME: Option<&'static str> = Some("m");
    /*
     * Contact        =  ("Contact" / "m" ) HCOLON
     *                   ( STAR / (contact-param *(COMMA contact-param)))
     * contact-param  =  (name-addr / addr-spec) *(SEMI contact-params)
     * contact-params     =  c-p-q / c-p-expires
     *                       / contact-extension
     * c-p-q              =  "q" EQUAL qvalue
     * c-p-expires        =  "expires" EQUAL delta-seconds
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        if parser.peek() == Some(&b'*') {
            parser.advance();
            return Ok(Contact::Star);
        }

        let addr = parser.parse_sip_addr(false)?;
        let mut q = None;
        let mut expires = None;
        let params = parse_header_param!(parser, Q_PARAM = q, EXPIRES_PARAM = expires);

        let q = q.and_then(|v: sipua_util::ArcStr| v.parse().ok());
        let expires = expires.and_then(|v: sipua_util::ArcStr| v.parse().ok());

        Ok(Contact::Addr(ContactAddr {
            addr,
            q,
            expires,
            params,
        }))
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", Contact::NAME)?;
        match self {
            Contact::Star => write!(f, "*"),
            Contact::Addr(ContactAddr {
                addr,
                q,
                expires,
                params,
            }) => {
                write!(f, "{}", addr)?;
                if let Some(q) = q {
                    write!(f, "{}", q)?;
                }
                if let Some(expires) = expires {
                    write!(f, ";expires={}", expires)?;
                }
                if let Some(params) = params {
                    write!(f, ";{}", params)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let src = b"\"Mr. Watson\" <sip:watson@worcester.bell-telephone.com>;q=0.7; expires=3600\r\n";
        let mut scanner = Parser::new(src);
        let contact = Contact::parse(&mut scanner).unwrap();

        assert_matches!(contact, Contact::Addr(ContactAddr { addr, q, expires, .. }) => {
            assert_eq!(addr.display(), Some("Mr. Watson"));
            assert_eq!(addr.uri().username(), Some("watson"));
            assert_eq!(q, Some(Q(0, 7)));
            assert_eq!(expires, Some(3600));
        });
    }

    #[test]
    fn test_parse_star() {
        let src = b"*\r\n";
        let mut scanner = Parser::new(src);
        let contact = Contact::parse(&mut scanner).unwrap();

        assert!(contact.is_star());
    }

    #[test]
    fn test_parse_with_sip_instance() {
        let src = b"<sip:alice@203.0.113.10;transport=ws>;+sip.instance=\"<urn:uuid:f81d4fae>\"\r\n";
        let mut scanner = Parser::new(src);
        let contact = Contact::parse(&mut scanner).unwrap();

        assert_matches!(contact, Contact::Addr(ContactAddr { params: Some(params), .. }) => {
            assert!(params.contains("+sip.instance"));
        });
    }
}
