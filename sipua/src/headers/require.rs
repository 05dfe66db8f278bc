use std::fmt;

use itertools::Itertools;
use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::hdr_list;
use crate::parser::Parser;

/// The `Require` SIP header.
///
/// Tells the receiving `UserAgent` about options the sender expects it to
/// support in order to process the request.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Require(Vec<ArcStr>);

impl Require {
    /// Returns `true` if the option tag is listed.
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Returns an iterator over the option tags.
    pub fn iter(&self) -> impl Iterator<Item = &ArcStr> {
        self.0.iter()
    }
}

impl<const N: usize> From<[&str; N]> for Require {
    fn from(tags: [&str; N]) -> Self {
        Self(tags.map(Into::into).to_vec())
    }
}

impl SipHeaderParse for Require {
    const NAME: &'static str = "Require";
    /*
     * Require  =  "Require" HCOLON option-tag *(COMMA option-tag)
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        let tags = hdr_list!(parser => parser.parse_token()?.into());

        Ok(Require(tags))
    }
}

impl fmt::Display for Require {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", Require::NAME, self.0.iter().format(", "))
    }
}
