use std::fmt;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::parser::Parser;

/// The `Min-Expires` SIP header.
///
/// Carried by a `423 Interval Too Brief` response to tell the client the
/// minimum registration interval the registrar accepts.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MinExpires(u32);

impl MinExpires {
    /// Creates a new `MinExpires` instance.
    pub fn new(expires: u32) -> Self {
        Self(expires)
    }

    /// Returns the minimum expiration in seconds.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl SipHeaderParse for MinExpires {
    const NAME: &'static str = "Min-Expires";
    /*
     * Min-Expires  =  "Min-Expires" HCOLON delta-seconds
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let expires = parser.parse_u32()?;

        Ok(MinExpires(expires))
    }
}

impl fmt::Display for MinExpires {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", MinExpires::NAME, self.0)
    }
}
