use core::fmt;
use std::str;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::parse_header_param;
use crate::message::{NameAddr, Params};
use crate::parser::Parser;

/// The `Route` SIP header.
///
/// Forces routing of a request through the listed set of proxies.
///
/// # Examples
///
/// ```
/// # use sipua::headers::Route;
/// let route: Route = "<sip:proxy.example.com;lr>".parse().unwrap();
///
/// assert!(route.addr.uri.lr_param);
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct Route {
    /// The route address.
    pub addr: NameAddr,
    /// Header parameters.
    pub params: Option<Params>,
}

impl Route {
    /// Creates a `Route` from an address.
    pub fn new(addr: NameAddr) -> Self {
        Self { addr, params: None }
    }
}

impl std::str::FromStr for Route {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl SipHeaderParse for Route {
    const NAME: &'static str = "Route";
    /*
     * Route        =  "Route" HCOLON route-param *(COMMA route-param)
     * route-param  =  name-addr *( SEMI rr-param )
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let addr = parser.parse_name_addr()?;
        let params = parse_header_param!(parser);

        Ok(Route { addr, params })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", Route::NAME, self.addr)?;
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
        let src = b"<sip:bigbox3.site3.atlanta.com;lr>,<sip:server10.biloxi.com;lr>\r\n";
        let mut scanner = Parser::new(src);
        let route = Route::parse(&mut scanner).unwrap();

        assert_eq!(route.addr.uri.host_port.to_string(), "bigbox3.site3.atlanta.com");
        assert!(route.addr.uri.lr_param);
        // The next list element stays in the buffer for the caller.
        assert_eq!(scanner.peek(), Some(&b','));
    }
}
