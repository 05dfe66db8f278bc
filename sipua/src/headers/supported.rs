use std::fmt;

use itertools::Itertools;
use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::hdr_list;
use crate::parser::Parser;

/// The `Supported` SIP header.
///
/// Enumerates all the extensions supported by the `UserAgent`.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Supported(Vec<ArcStr>);

impl Supported {
    /// Returns `true` if the option tag is listed.
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

impl<const N: usize> From<[&str; N]> for Supported {
    fn from(tags: [&str; N]) -> Self {
        Self(tags.map(Into::into).to_vec())
    }
}

impl SipHeaderParse for Supported {
    const NAME: &'static str = "Supported";
    const SHORT_NAME: Option<&'static str> = Some("k");
    /*
     * Supported  =  ( "Supported" / "k" ) HCOLON
     *               [option-tag *(COMMA option-tag)]
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        let tags = hdr_list!(parser => parser.parse_token()?.into());

        Ok(Supported(tags))
    }
}

impl fmt::Display for Supported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", Supported::NAME, self.0.iter().format(", "))
    }
}
