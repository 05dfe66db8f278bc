use std::fmt;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::message::auth::Challenge;
use crate::parser::Parser;

/// The `Proxy-Authenticate` SIP header.
///
/// Carried by a `407 Proxy Authentication Required` response, holding the
/// challenge applicable to the proxy.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ProxyAuthenticate(pub Challenge);

impl ProxyAuthenticate {
    /// Get the `Challenge` carried by the header.
    pub fn challenge(&self) -> &Challenge {
        &self.0
    }
}

impl SipHeaderParse for ProxyAuthenticate {
    const NAME: &'static str = "Proxy-Authenticate";
    /*
     * Proxy-Authenticate  =  "Proxy-Authenticate" HCOLON challenge
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        let challenge = parser.parse_auth_challenge()?;

        Ok(ProxyAuthenticate(challenge))
    }
}

impl fmt::Display for ProxyAuthenticate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", ProxyAuthenticate::NAME, self.0)
    }
}
