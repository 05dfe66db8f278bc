use std::fmt;

use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::parser::Parser;

/// The `User-Agent` SIP header.
///
/// Contains information about the client originating the request.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UserAgent(ArcStr);

impl UserAgent {
    /// Creates a new `UserAgent` instance.
    pub fn new(agent: &str) -> Self {
        Self(agent.into())
    }

    /// Returns the product token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SipHeaderParse for UserAgent {
    const NAME: &'static str = "User-Agent";
    /*
     * User-Agent  =  "User-Agent" HCOLON server-val *(LWS server-val)
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let agent = parser.read_while_str(|b| !sipua_util::util::is_newline(b))?;

        Ok(UserAgent(agent.trim_end().into()))
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", UserAgent::NAME, self.0)
    }
}
