use std::fmt;
use std::str;

use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::parser::Parser;

/// The `Call-ID` SIP header.
///
/// Uniquely identifies a particular invitation or all registrations of a
/// particular client.
///
/// # Examples
///
/// ```
/// # use sipua::headers::CallId;
/// let cid = CallId::new("bs9ki9iqbee8k5kal8mpqb");
///
/// assert_eq!("Call-ID: bs9ki9iqbee8k5kal8mpqb", cid.to_string());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Default, Hash)]
pub struct CallId(ArcStr);

impl CallId {
    /// Creates a new `CallId` instance.
    pub fn new(id: &str) -> Self {
        Self(id.into())
    }

    /// Returns the id.
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Returns the id as an [`ArcStr`].
    pub fn as_arc(&self) -> &ArcStr {
        &self.0
    }
}

impl SipHeaderParse for CallId {
    const NAME: &'static str = "Call-ID";
    const SHORT_NAME: Option<&'static str> = Some("i");
    /*
     * Call-ID  =  ( "Call-ID" / "i" ) HCOLON callid
     * callid   =  word [ "@" word ]
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let id = parser.read_while_str(|b| !sipua_util::util::is_space(b) && !sipua_util::util::is_newline(b))?;

        Ok(CallId(id.into()))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", CallId::NAME, self.0)
    }
}

impl From<&str> for CallId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let src = b"f81d4fae-7dec-11d0-a765-00a0c91e6bf6@foo.bar.com\r\n";
        let mut scanner = Parser::new(src);
        let cid = CallId::parse(&mut scanner).unwrap();

        assert_eq!(cid.id(), "f81d4fae-7dec-11d0-a765-00a0c91e6bf6@foo.bar.com");
    }
}
