use std::fmt;

use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::parse_header_param;
use crate::message::Params;
use crate::parser::Parser;

const REASON_PARAM: &str = "reason";
const EXPIRES_PARAM: &str = "expires";

/// The state a subscription is in, per RFC 6665.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SubState {
    /// The subscription has been accepted and is active.
    Active,
    /// The subscription has been received but not yet authorized.
    Pending,
    /// The subscription is over.
    Terminated,
    /// An extension state.
    Other(ArcStr),
}

impl SubState {
    /// Returns the state token.
    pub fn as_str(&self) -> &str {
        match self {
            SubState::Active => "active",
            SubState::Pending => "pending",
            SubState::Terminated => "terminated",
            SubState::Other(s) => s,
        }
    }
}

impl From<&str> for SubState {
    fn from(value: &str) -> Self {
        match value {
            v if v.eq_ignore_ascii_case("active") => SubState::Active,
            v if v.eq_ignore_ascii_case("pending") => SubState::Pending,
            v if v.eq_ignore_ascii_case("terminated") => SubState::Terminated,
            other => SubState::Other(other.into()),
        }
    }
}

/// The `Subscription-State` SIP header.
///
/// Carried by every `NOTIFY`, telling the subscriber the state of the
/// subscription.
///
/// # Examples
///
/// ```
/// # use sipua::headers::{SubscriptionState, SubState};
/// let ss: SubscriptionState = "active;expires=599".parse().unwrap();
///
/// assert_eq!(ss.state(), &SubState::Active);
/// assert_eq!(ss.expires(), Some(599));
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubscriptionState {
    state: SubState,
    expires: Option<u32>,
    reason: Option<ArcStr>,
    params: Option<Params>,
}

impl SubscriptionState {
    /// Creates a new `SubscriptionState` instance.
    pub fn new(state: SubState, expires: Option<u32>, reason: Option<&str>) -> Self {
        Self {
            state,
            expires,
            reason: reason.map(Into::into),
            params: None,
        }
    }

    /// Returns the subscription state.
    pub fn state(&self) -> &SubState {
        &self.state
    }

    /// Returns the `expires` parameter, if any.
    pub fn expires(&self) -> Option<u32> {
        self.expires
    }

    /// Returns the `reason` parameter, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl std::str::FromStr for SubscriptionState {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl SipHeaderParse for SubscriptionState {
    const NAME: &'static str = "Subscription-State";
    /*
     * Subscription-State   = "Subscription-State" HCOLON substate-value
     *                        *( SEMI subexp-params )
     * substate-value       = "active" / "pending" / "terminated"
     *                        / extension-substate
     * subexp-params        =   ("reason" EQUAL event-reason-value)
     *                        / ("expires" EQUAL delta-seconds)
     *                        / generic-param
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let state = parser.parse_token()?.into();
        let mut expires = None;
        let mut reason = None;
        let params = parse_header_param!(parser, EXPIRES_PARAM = expires, REASON_PARAM = reason);

        let expires = expires.and_then(|v: ArcStr| v.parse().ok());

        Ok(SubscriptionState {
            state,
            expires,
            reason,
            params,
        })
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", SubscriptionState::NAME, self.state.as_str())?;
        if let Some(reason) = &self.reason {
            write!(f, ";reason={}", reason)?;
        }
        if let Some(expires) = self.expires {
            write!(f, ";expires={}", expires)?;
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
        let src = b"terminated;reason=timeout\r\n";
        let mut scanner = Parser::new(src);
        let ss = SubscriptionState::parse(&mut scanner).unwrap();

        assert_eq!(ss.state(), &SubState::Terminated);
        assert_eq!(ss.reason(), Some("timeout"));
        assert_eq!(ss.expires(), None);
    }
}
