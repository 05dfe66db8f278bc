use std::fmt;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::parser::Parser;

/// The `Expires` SIP header.
///
/// Gives the relative time after which the message (or content) expires.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Expires(u32);

impl Expires {
    /// Creates a new `Expires` instance.
    pub fn new(expires: u32) -> Self {
        Self(expires)
    }

    /// Returns the expiration in seconds.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl SipHeaderParse for Expires {
    const NAME: &'static str = "Expires";
    /*
     * Expires  =  "Expires" HCOLON delta-seconds
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let expires = parser.parse_u32()?;

        Ok(Expires(expires))
    }
}

impl fmt::Display for Expires {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", Expires::NAME, self.0)
    }
}
