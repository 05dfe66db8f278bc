use core::fmt;
use std::str;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::parse_header_param;
use crate::message::{Params, SipAddr};
use crate::parser::Parser;

/// The `Refer-To` SIP header.
///
/// Carries the target a `REFER` request asks the recipient to contact
/// (RFC 3515). The embedded URI may carry a `Replaces` header parameter
/// for attended transfer.
#[derive(Debug, PartialEq, Clone)]
pub struct ReferTo {
    /// The refer target.
    pub addr: SipAddr,
    /// Header parameters.
    pub params: Option<Params>,
}

impl ReferTo {
    /// Creates a `ReferTo` from an address.
    pub fn new(addr: SipAddr) -> Self {
        Self { addr, params: None }
    }
}

impl std::str::FromStr for ReferTo {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl SipHeaderParse for ReferTo {
    const NAME: &'static str = "Refer-To";
    const SHORT_NAME: Option<&'static str> = Some("r");
    /*
     * Refer-To  =  ("Refer-To" / "r") HCOLON ( name-addr / addr-spec )
     *              *(SEMI generic-param)
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let addr = parser.parse_sip_addr(false)?;
        let params = parse_header_param!(parser);

        Ok(ReferTo { addr, params })
    }
}

impl fmt::Display for ReferTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", ReferTo::NAME, self.addr)?;
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
        let src = b"<sip:carol@cleveland.example.org?Replaces=2342%40host%3Bto-tag%3D3%3Bfrom-tag%3D9>\r\n";
        let mut scanner = Parser::new(src);
        let refer_to = ReferTo::parse(&mut scanner).unwrap();

        assert_matches!(&refer_to.addr, SipAddr::NameAddr(addr) => {
            assert_eq!(addr.uri.username(), Some("carol"));
            assert!(addr.uri.headers.as_ref().unwrap().contains("Replaces"));
        });
    }
}
