use std::fmt;
use std::str;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::message::SipMethod;
use crate::parser::Parser;

/// The `CSeq` SIP header.
///
/// Orders transactions within a dialog and serves as a way to
/// uniquely identify transactions.
///
/// # Examples
///
/// ```
/// # use sipua::headers::CSeq;
/// # use sipua::message::SipMethod;
/// let cseq = CSeq::new(4711, SipMethod::Invite);
///
/// assert_eq!("CSeq: 4711 INVITE", cseq.to_string());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CSeq {
    /// The sequence number.
    pub cseq: u32,
    /// The method that matches the request.
    pub method: SipMethod,
}

impl CSeq {
    /// Creates a new `CSeq` instance.
    pub fn new(cseq: u32, method: SipMethod) -> Self {
        Self { cseq, method }
    }

    /// Returns the method.
    pub fn method(&self) -> &SipMethod {
        &self.method
    }

    /// Returns the sequence number.
    pub fn cseq(&self) -> u32 {
        self.cseq
    }
}

impl SipHeaderParse for CSeq {
    const NAME: &'static str = "CSeq";
    /*
     * CSeq  =  "CSeq" HCOLON 1*DIGIT LWS Method
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let cseq = parser.parse_u32()?;

        parser.ws();
        let method = parser.parse_token()?.as_bytes().into();

        Ok(CSeq { cseq, method })
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", CSeq::NAME, self.cseq, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let src = b"4711 INVITE\r\n";
        let mut scanner = Parser::new(src);
        let cseq = CSeq::parse(&mut scanner).unwrap();

        assert_eq!(cseq.cseq(), 4711);
        assert_eq!(cseq.method(), &SipMethod::Invite);
    }
}
