use std::fmt;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::parser::Parser;

/// The `Max-Forwards` SIP header.
///
/// Limits the number of proxies or gateways that can forward the request.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MaxForwards(u32);

impl MaxForwards {
    /// Creates a new `MaxForwards` instance.
    pub fn new(fowards: u32) -> Self {
        Self(fowards)
    }

    /// Returns the hop count.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl SipHeaderParse for MaxForwards {
    const NAME: &'static str = "Max-Forwards";
    /*
     * Max-Forwards  =  "Max-Forwards" HCOLON 1*DIGIT
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let fowards = parser.parse_u32()?;

        Ok(MaxForwards(fowards))
    }
}

impl fmt::Display for MaxForwards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", MaxForwards::NAME, self.0)
    }
}
