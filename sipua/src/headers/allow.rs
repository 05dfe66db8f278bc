use std::fmt;

use itertools::Itertools;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::hdr_list;
use crate::message::SipMethod;
use crate::parser::Parser;

/// The `Allow` SIP header.
///
/// Lists the set of methods supported by the `UserAgent` generating the
/// message.
///
/// # Examples
///
/// ```
/// # use sipua::headers::Allow;
/// # use sipua::message::SipMethod;
/// let allow = Allow::from([SipMethod::Invite, SipMethod::Ack, SipMethod::Bye]);
///
/// assert_eq!("Allow: INVITE, ACK, BYE", allow.to_string());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Allow(Vec<SipMethod>);

impl Allow {
    /// Returns `true` if the method is listed.
    pub fn contains(&self, method: &SipMethod) -> bool {
        self.0.contains(method)
    }

    /// Returns an iterator over the methods.
    pub fn iter(&self) -> impl Iterator<Item = &SipMethod> {
        self.0.iter()
    }
}

impl<const N: usize> From<[SipMethod; N]> for Allow {
    fn from(methods: [SipMethod; N]) -> Self {
        Self(methods.to_vec())
    }
}

impl SipHeaderParse for Allow {
    const NAME: &'static str = "Allow";
    /*
     * Allow  =  "Allow" HCOLON [Method *(COMMA Method)]
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        let methods = hdr_list!(parser => {
            let method = parser.parse_token()?;
            method.as_bytes().into()
        });

        Ok(Allow(methods))
    }
}

impl fmt::Display for Allow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", Allow::NAME, self.0.iter().format(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let src = b"INVITE, ACK, OPTIONS, CANCEL, BYE\r\n";
        let mut scanner = Parser::new(src);
        let allow = Allow::parse(&mut scanner).unwrap();

        assert!(allow.contains(&SipMethod::Invite));
        assert!(allow.contains(&SipMethod::Bye));
        assert!(!allow.contains(&SipMethod::Register));
    }
}
