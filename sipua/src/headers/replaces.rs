use std::fmt;

use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::{parse_error, parse_header_param};
use crate::message::Params;
use crate::parser::Parser;

const TO_TAG_PARAM: &str = "to-tag";
const FROM_TAG_PARAM: &str = "from-tag";
const EARLY_ONLY_PARAM: &str = "early-only";

/// The `Replaces` SIP header.
///
/// Names an existing dialog an incoming `INVITE` wants to replace
/// (RFC 3891). Both tags are mandatory.
///
/// # Examples
///
/// ```
/// # use sipua::headers::Replaces;
/// let replaces: Replaces = "425928@bobster.example.org;to-tag=7743;from-tag=6472"
///     .parse()
///     .unwrap();
///
/// assert_eq!(replaces.call_id(), "425928@bobster.example.org");
/// assert_eq!(replaces.to_tag(), "7743");
/// assert_eq!(replaces.from_tag(), "6472");
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Replaces {
    call_id: ArcStr,
    to_tag: ArcStr,
    from_tag: ArcStr,
    early_only: bool,
    params: Option<Params>,
}

impl Replaces {
    /// Returns the Call-ID of the dialog to replace.
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Returns the to-tag of the dialog to replace.
    pub fn to_tag(&self) -> &str {
        &self.to_tag
    }

    /// Returns the from-tag of the dialog to replace.
    pub fn from_tag(&self) -> &str {
        &self.from_tag
    }

    /// Returns `true` if only an early dialog may be replaced.
    pub fn early_only(&self) -> bool {
        self.early_only
    }
}

impl std::str::FromStr for Replaces {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl SipHeaderParse for Replaces {
    const NAME: &'static str = "Replaces";
    /*
     * Replaces        = "Replaces" HCOLON callid *(SEMI replaces-param)
     * replaces-param  = to-tag / from-tag / early-flag / generic-param
     * to-tag          = "to-tag" EQUAL token
     * from-tag        = "from-tag" EQUAL token
     * early-flag      = "early-only"
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let call_id =
            parser.read_while_str(|b| !matches!(b, b';') && !sipua_util::util::is_newline(b) && b != b' ')?;

        let mut to_tag: Option<ArcStr> = None;
        let mut from_tag: Option<ArcStr> = None;
        let mut params = parse_header_param!(parser, TO_TAG_PARAM = to_tag, FROM_TAG_PARAM = from_tag);

        // early-only carries no value and lands in the generic list.
        let early_only = params
            .as_mut()
            .is_some_and(|params| params.remove(EARLY_ONLY_PARAM).is_some());

        let (Some(to_tag), Some(from_tag)) = (to_tag, from_tag) else {
            return parse_error!("Replaces header without to-tag/from-tag");
        };

        Ok(Replaces {
            call_id: call_id.into(),
            to_tag,
            from_tag,
            early_only,
            params,
        })
    }
}

impl fmt::Display for Replaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {};to-tag={};from-tag={}",
            Replaces::NAME,
            self.call_id,
            self.to_tag,
            self.from_tag
        )?;
        if self.early_only {
            write!(f, ";early-only")?;
        }
        if let Some(params) = &self.params {
            write!(f, ";{}", params)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let src = b"98732@sip.example.com;from-tag=r33th4x0r;to-tag=ff87ff;early-only\r\n";
        let mut scanner = Parser::new(src);
        let replaces = Replaces::parse(&mut scanner).unwrap();

        assert_eq!(replaces.call_id(), "98732@sip.example.com");
        assert_eq!(replaces.from_tag(), "r33th4x0r");
        assert_eq!(replaces.to_tag(), "ff87ff");
        assert!(replaces.early_only());
    }

    #[test]
    fn test_missing_tags_is_rejected() {
        let src = b"98732@sip.example.com\r\n";
        let mut scanner = Parser::new(src);

        assert!(Replaces::parse(&mut scanner).is_err());
    }
}
