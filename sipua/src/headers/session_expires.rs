use std::fmt;

use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::parse_header_param;
use crate::message::Params;
use crate::parser::Parser;

const REFRESHER_PARAM: &str = "refresher";

/// Which side is responsible for sending session refreshes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Refresher {
    /// The client refreshes.
    Uac,
    /// The server refreshes.
    Uas,
}

impl Refresher {
    /// Returns the token used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Refresher::Uac => "uac",
            Refresher::Uas => "uas",
        }
    }
}

/// The `Session-Expires` SIP header.
///
/// Conveys the session interval for the session timers extension
/// (RFC 4028).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SessionExpires {
    interval: u32,
    refresher: Option<Refresher>,
    params: Option<Params>,
}

impl SessionExpires {
    /// Creates a new `SessionExpires` instance.
    pub fn new(interval: u32, refresher: Option<Refresher>) -> Self {
        Self {
            interval,
            refresher,
            params: None,
        }
    }

    /// Returns the session interval in seconds.
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Returns the refresher, if specified.
    pub fn refresher(&self) -> Option<Refresher> {
        self.refresher
    }
}

impl SipHeaderParse for SessionExpires {
    const NAME: &'static str = "Session-Expires";
    const SHORT_NAME: Option<&'static str> = Some("x");
    /*
     * Session-Expires  = ("Session-Expires" / "x") HCOLON delta-seconds
     *                    *(SEMI se-params)
     * se-params        = refresher-param / generic-param
     * refresher-param  = "refresher" EQUAL ("uas" / "uac")
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let interval = parser.parse_u32()?;
        let mut refresher: Option<ArcStr> = None;
        let params = parse_header_param!(parser, REFRESHER_PARAM = refresher);

        let refresher = refresher.and_then(|r| match r {
            r if r.eq_ignore_ascii_case("uac") => Some(Refresher::Uac),
            r if r.eq_ignore_ascii_case("uas") => Some(Refresher::Uas),
            _ => None,
        });

        Ok(SessionExpires {
            interval,
            refresher,
            params,
        })
    }
}

impl fmt::Display for SessionExpires {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", SessionExpires::NAME, self.interval)?;
        if let Some(refresher) = self.refresher {
            write!(f, ";refresher={}", refresher.as_str())?;
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
        let src = b"1800;refresher=uac\r\n";
        let mut scanner = Parser::new(src);
        let se = SessionExpires::parse(&mut scanner).unwrap();

        assert_eq!(se.interval(), 1800);
        assert_eq!(se.refresher(), Some(Refresher::Uac));
    }
}
