use core::fmt;
use std::str;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::parse_header_param;
use crate::message::{NameAddr, Params};
use crate::parser::Parser;

/// The `Record-Route` SIP header.
///
/// Inserted by proxies that want to stay on the path of
/// subsequent requests in a dialog.
#[derive(Debug, PartialEq, Clone)]
pub struct RecordRoute {
    /// The route address.
    pub addr: NameAddr,
    /// Header parameters.
    pub params: Option<Params>,
}

impl RecordRoute {
    /// Creates a `RecordRoute` from an address.
    pub fn new(addr: NameAddr) -> Self {
        Self { addr, params: None }
    }
}

impl SipHeaderParse for RecordRoute {
    const NAME: &'static str = "Record-Route";
    /*
     * Record-Route  =  "Record-Route" HCOLON rec-route *(COMMA rec-route)
     * rec-route     =  name-addr *( SEMI rr-param )
     * rr-param      =  generic-param
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let addr = parser.parse_name_addr()?;
        let params = parse_header_param!(parser);

        Ok(RecordRoute { addr, params })
    }
}

impl fmt::Display for RecordRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", RecordRoute::NAME, self.addr)?;
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
        let src = b"<sip:ss1.example.com;lr>\r\n";
        let mut scanner = Parser::new(src);
        let rr = RecordRoute::parse(&mut scanner).unwrap();

        assert_eq!(rr.addr.uri.host_port.to_string(), "ss1.example.com");
        assert!(rr.addr.uri.lr_param);
    }
}
