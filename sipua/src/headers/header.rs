use enum_as_inner::EnumAsInner;
use std::fmt;
use std::str;

use sipua_util::ArcStr;

use crate::headers::*;

/// A SIP Header.
///
/// This enum contain the SIP headers, as defined in `RFC3261`, see their
/// respective documentation for more details. Headers the grammar does not
/// know are kept verbatim in [`Header::Other`] so they survive
/// re-serialization.
#[derive(Debug, PartialEq, EnumAsInner, Clone)]
pub enum Header {
    /// `Allow` Header
    Allow(Allow),
    /// `Authorization` Header
    Authorization(Authorization),
    /// `Call-ID` Header
    CallId(CallId),
    /// `Contact` Header
    Contact(Contact),
    /// `Content-Length` Header
    ContentLength(ContentLength),
    /// `Content-Type` Header
    ContentType(ContentType),
    /// `CSeq` Header
    CSeq(CSeq),
    /// `Event` Header
    Event(Event),
    /// `Expires` Header
    Expires(Expires),
    /// `From` Header
    From(From),
    /// `Max-Fowards` Header
    MaxForwards(MaxForwards),
    /// `Min-Expires` Header
    MinExpires(MinExpires),
    /// `Proxy-Authenticate` Header
    ProxyAuthenticate(ProxyAuthenticate),
    /// `Proxy-Authorization` Header
    ProxyAuthorization(ProxyAuthorization),
    /// `Record-Route` Header
    RecordRoute(RecordRoute),
    /// `Refer-To` Header
    ReferTo(ReferTo),
    /// `Replaces` Header
    Replaces(Replaces),
    /// `Require` Header
    Require(Require),
    /// `Route` Header
    Route(Route),
    /// `Session-Expires` Header
    SessionExpires(SessionExpires),
    /// `Subscription-State` Header
    SubscriptionState(SubscriptionState),
    /// `Supported` Header
    Supported(Supported),
    /// `To` Header
    To(To),
    /// `User-Agent` Header
    UserAgent(UserAgent),
    /// `Via` Header
    Via(Via),
    /// `WWW-Authenticate` Header
    WWWAuthenticate(WWWAuthenticate),
    /// Other Generic Header
    Other(OtherHeader),
}

impl Header {
    /// Returns the canonical name of this header as it appears on the wire.
    pub fn name(&self) -> &str {
        match self {
            Header::Allow(_) => Allow::NAME,
            Header::Authorization(_) => Authorization::NAME,
            Header::CallId(_) => CallId::NAME,
            Header::Contact(_) => Contact::NAME,
            Header::ContentLength(_) => ContentLength::NAME,
            Header::ContentType(_) => ContentType::NAME,
            Header::CSeq(_) => CSeq::NAME,
            Header::Event(_) => Event::NAME,
            Header::Expires(_) => Expires::NAME,
            Header::From(_) => From::NAME,
            Header::MaxForwards(_) => MaxForwards::NAME,
            Header::MinExpires(_) => MinExpires::NAME,
            Header::ProxyAuthenticate(_) => ProxyAuthenticate::NAME,
            Header::ProxyAuthorization(_) => ProxyAuthorization::NAME,
            Header::RecordRoute(_) => RecordRoute::NAME,
            Header::ReferTo(_) => ReferTo::NAME,
            Header::Replaces(_) => Replaces::NAME,
            Header::Require(_) => Require::NAME,
            Header::Route(_) => Route::NAME,
            Header::SessionExpires(_) => SessionExpires::NAME,
            Header::SubscriptionState(_) => SubscriptionState::NAME,
            Header::Supported(_) => Supported::NAME,
            Header::To(_) => To::NAME,
            Header::UserAgent(_) => UserAgent::NAME,
            Header::Via(_) => Via::NAME,
            Header::WWWAuthenticate(_) => WWWAuthenticate::NAME,
            Header::Other(other) => &other.name,
        }
    }
}

/// Other generic Header.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OtherHeader {
    /// Generic Header name
    pub name: ArcStr,
    /// Generic Header value
    pub value: ArcStr,
}

impl fmt::Display for OtherHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

macro_rules! impl_header_display {
    ( $($variant:ident),* $(,)? ) => {
        impl fmt::Display for Header {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( Header::$variant(inner) => inner.fmt(f), )*
                }
            }
        }
    };
}

impl_header_display!(
    Allow,
    Authorization,
    CallId,
    Contact,
    ContentLength,
    ContentType,
    CSeq,
    Event,
    Expires,
    From,
    MaxForwards,
    MinExpires,
    ProxyAuthenticate,
    ProxyAuthorization,
    RecordRoute,
    ReferTo,
    Replaces,
    Require,
    Route,
    SessionExpires,
    SubscriptionState,
    Supported,
    To,
    UserAgent,
    Via,
    WWWAuthenticate,
    Other
);
