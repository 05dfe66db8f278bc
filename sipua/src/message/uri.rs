use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use itertools::Itertools;
use sipua_util::ArcStr;

use super::{Param, Params, SipMethod, TransportKind};
use crate::error::{Error, Result};
use crate::parser::Parser;

/// A SIP address.
///
/// Represents the address forms used in SIP headers, which can either be a
/// plain `Uri` or a `NameAddr` (a bracketed address with optional display
/// name).
///
/// # Examples
///
/// ```rust
/// use sipua::message::SipAddr;
///
/// let uri: SipAddr = "sip:alice@example.com".parse().unwrap();
/// assert!(uri.is_uri());
///
/// let name_addr: SipAddr = "\"Alice\" <sip:alice@example.com>".parse().unwrap();
/// assert!(name_addr.is_name_addr());
/// ```
#[derive(Debug, PartialEq, Clone)]
pub enum SipAddr {
    /// A plain SIP URI (e.g. `sip:user@example.com`)
    Uri(Uri),
    /// A named address (e.g. `"Alice" <sip:user@example.com>`)
    NameAddr(NameAddr),
}

impl SipAddr {
    /// Returns `true` if this is a [`SipAddr::NameAddr`] variant, otherwise
    /// returns `false`.
    pub fn is_name_addr(&self) -> bool {
        matches!(self, SipAddr::NameAddr(_))
    }

    /// Returns `true` if this is a [`SipAddr::Uri`] variant, otherwise returns
    /// `false`.
    pub fn is_uri(&self) -> bool {
        matches!(self, SipAddr::Uri(_))
    }

    /// Returns a reference to the [`Uri`].
    pub fn uri(&self) -> &Uri {
        match self {
            SipAddr::Uri(uri) => uri,
            SipAddr::NameAddr(name_addr) => &name_addr.uri,
        }
    }

    /// Consumes the address and returns its [`Uri`].
    pub fn into_uri(self) -> Uri {
        match self {
            SipAddr::Uri(uri) => uri,
            SipAddr::NameAddr(name_addr) => name_addr.uri,
        }
    }

    /// Returns a reference to the [`NameAddr`] if this is a
    /// [`SipAddr::NameAddr`] variant.
    pub fn name_addr(&self) -> Option<&NameAddr> {
        if let SipAddr::NameAddr(addr) = self {
            Some(addr)
        } else {
            None
        }
    }

    /// Returns the display part if present.
    pub fn display(&self) -> Option<&str> {
        if let SipAddr::NameAddr(addr) = self {
            addr.display()
        } else {
            None
        }
    }

    /// Returns the scheme of the uri.
    pub fn scheme(&self) -> Scheme {
        self.uri().scheme
    }

    /// Returns the user part of the uri.
    pub fn user(&self) -> Option<&UserInfo> {
        self.uri().user.as_ref()
    }

    /// Returns a reference to the [`HostPort`] of the uri.
    pub fn host_port(&self) -> &HostPort {
        &self.uri().host_port
    }
}

impl From<Uri> for SipAddr {
    fn from(uri: Uri) -> Self {
        SipAddr::Uri(uri)
    }
}

impl From<NameAddr> for SipAddr {
    fn from(addr: NameAddr) -> Self {
        SipAddr::NameAddr(addr)
    }
}

impl FromStr for SipAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Parser::new(s.as_bytes()).parse_sip_addr(true)
    }
}

impl fmt::Display for SipAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SipAddr::Uri(uri) => write!(f, "{}", uri),
            SipAddr::NameAddr(addr) => write!(f, "{}", addr),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Default, Copy)]
/// A SIP URI scheme.
pub enum Scheme {
    #[default]
    /// An Sip uri scheme.
    Sip,
    /// An Sips uri scheme.
    Sips,
    /// A telephone uri scheme (RFC 3966).
    Tel,
}

impl Scheme {
    /// Returns the lowercase scheme token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
            Scheme::Tel => "tel",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents the header parameters of a SIP URI.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct UriHeaders {
    pub(crate) inner: Params,
}

impl std::ops::Deref for UriHeaders {
    type Target = Params;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Eq, Clone, Default)]
/// An SIP uri.
///
/// Equality follows RFC 3261 §19.1.4: the user part is compared
/// case-sensitively, hosts ignore case, the `user`, `ttl`, `method` and
/// `maddr` parameters must agree whenever either side carries them, and
/// unknown parameters are only compared when both sides carry them.
pub struct Uri {
    /// The uri scheme.
    pub scheme: Scheme,
    /// Optional user part of uri.
    pub user: Option<UserInfo>,
    /// The uri host.
    pub host_port: HostPort,
    /// The user parameter.
    pub user_param: Option<ArcStr>,
    /// The method parameter.
    pub method_param: Option<SipMethod>,
    /// The transport parameter.
    pub transport_param: Option<TransportKind>,
    /// The ttl parameter.
    pub ttl_param: Option<u8>,
    /// The lr parameter.
    pub lr_param: bool,
    /// The maddr parameter.
    pub maddr_param: Option<Host>,
    /// Other parameters.
    pub parameters: Option<Params>,
    /// Optional header parameters
    pub headers: Option<UriHeaders>,
}

impl Uri {
    /// Returns a builder to create an `Uri`.
    pub fn builder() -> UriBuilder {
        UriBuilder::new()
    }

    /// Creates an `Uri` instance.
    pub fn new(scheme: Scheme, user: Option<UserInfo>, host_port: HostPort) -> Self {
        Uri {
            scheme,
            user,
            host_port,
            ..Default::default()
        }
    }

    /// Returns the user name, if any.
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.user())
    }

    /// Returns `true` for the `sips` scheme.
    pub fn is_secure(&self) -> bool {
        matches!(self.scheme, Scheme::Sips)
    }

    fn params_match(&self, other: &Uri) -> bool {
        // user, ttl, method and maddr must agree when either side has them.
        if self.user_param.as_deref().map(str::to_ascii_lowercase)
            != other.user_param.as_deref().map(str::to_ascii_lowercase)
        {
            return false;
        }
        if self.ttl_param != other.ttl_param {
            return false;
        }
        if self.method_param != other.method_param {
            return false;
        }
        if self.maddr_param != other.maddr_param {
            return false;
        }

        // Remaining parameters only matter when both sides carry them.
        let (Some(mine), Some(theirs)) = (&self.parameters, &other.parameters) else {
            return true;
        };
        mine.iter().all(|param| match theirs.get(&param.name) {
            Some(other_value) => match (param.value.as_deref(), other_value) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            },
            None => true,
        })
    }
}

impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        if self.scheme != other.scheme {
            return false;
        }
        // Case-sensitive on user and password.
        if self.user != other.user {
            return false;
        }
        if self.host_port != other.host_port {
            return false;
        }
        if self.transport_param.is_some()
            && other.transport_param.is_some()
            && self.transport_param != other.transport_param
        {
            return false;
        }

        self.params_match(other) && other.params_match(self)
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut p = Parser::new(s.as_bytes());

        p.parse_uri(true)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;

        if let Some(user) = &self.user {
            write!(f, "{}", user.user)?;
            if let Some(pass) = &user.pass {
                write!(f, ":{}", pass)?;
            }
            if !matches!(self.scheme, Scheme::Tel) {
                write!(f, "@")?;
            }
        }
        if !matches!(self.scheme, Scheme::Tel) {
            write!(f, "{}", self.host_port)?;
        }

        if let Some(user) = &self.user_param {
            write!(f, ";user={}", user)?;
        }
        if let Some(method) = &self.method_param {
            write!(f, ";method={}", method)?;
        }
        if let Some(maddr) = &self.maddr_param {
            write!(f, ";maddr={}", maddr)?;
        }
        if let Some(transport) = &self.transport_param {
            write!(f, ";transport={}", transport.as_str().to_ascii_lowercase())?;
        }
        if let Some(ttl) = self.ttl_param {
            write!(f, ";ttl={}", ttl)?;
        }
        if self.lr_param {
            write!(f, ";lr")?;
        }
        if let Some(params) = &self.parameters {
            write!(f, ";{}", params)?;
        }
        if let Some(hdr_params) = &self.headers {
            let formater = Itertools::format_with(hdr_params.inner.iter(), "&", |it, f| {
                f(&format_args!(
                    "{}={}",
                    it.name,
                    it.value.as_ref().map_or("", |v| v)
                ))
            });
            write!(f, "?{}", formater)?;
        }

        Ok(())
    }
}

#[derive(Default)]
/// Builder for creating a new SIP URI.
pub struct UriBuilder {
    uri: Uri,
}

impl UriBuilder {
    /// Returns a builder to create an `UriBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the uri scheme.
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.uri.scheme = scheme;
        self
    }

    /// Sets the user part of the uri.
    pub fn user(mut self, user: UserInfo) -> Self {
        self.uri.user = Some(user);
        self
    }

    /// Sets the host of the uri.
    pub fn host(mut self, host_port: HostPort) -> Self {
        self.uri.host_port = host_port;
        self
    }

    /// Sets the user parameter of the uri.
    pub fn user_param(mut self, param: &str) -> Self {
        self.uri.user_param = Some(param.into());
        self
    }

    /// Sets the method parameter of the uri.
    pub fn method_param(mut self, param: SipMethod) -> Self {
        self.uri.method_param = Some(param);
        self
    }

    /// Sets the transport parameter of the uri.
    pub fn transport_param(mut self, param: TransportKind) -> Self {
        self.uri.transport_param = Some(param);
        self
    }

    /// Sets the lr parameter of the uri.
    pub fn lr_param(mut self, param: bool) -> Self {
        self.uri.lr_param = param;
        self
    }

    /// Set generic parameter of the uri.
    pub fn param(mut self, name: &str, value: Option<&str>) -> Self {
        self.uri
            .parameters
            .get_or_insert_with(Params::new)
            .push(Param::new(name, value));
        self
    }

    /// Set header parameter of the uri.
    pub fn header(mut self, name: &str, value: Option<&str>) -> Self {
        self.uri
            .headers
            .get_or_insert_with(UriHeaders::default)
            .inner
            .push(Param::new(name, value));
        self
    }

    /// Finalize the builder into a `Uri`.
    pub fn build(self) -> Uri {
        self.uri
    }
}

/// Escape `\` and `"` inside a quoted display name.
fn write_quoted(f: &mut fmt::Formatter<'_>, display: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in display.chars() {
        if matches!(c, '"' | '\\') {
            write!(f, "\\")?;
        }
        write!(f, "{c}")?;
    }
    write!(f, "\"")
}

/// Represents an SIP `name-addr`.
///
/// Typically appear in `From`, `To`, and `Contact` header. Contains an sip uri
/// and a optional display part. The display part is stored unescaped; emission
/// always re-quotes it.
#[derive(Debug, PartialEq, Clone)]
pub struct NameAddr {
    /// The optional display part.
    pub display: Option<ArcStr>,
    /// The uri of the `name-addr`.
    pub uri: Uri,
}

impl NameAddr {
    /// Creates a `NameAddr` without a display name.
    pub fn new(uri: Uri) -> Self {
        NameAddr { display: None, uri }
    }

    /// Returns the display part if present.
    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }
}

impl FromStr for NameAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut p = Parser::new(s.as_bytes());

        p.parse_name_addr()
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(display) = &self.display {
            if !display.is_empty() {
                write_quoted(f, display)?;
                write!(f, " ")?;
            }
        }
        write!(f, "<{}>", self.uri)?;

        Ok(())
    }
}

/// Represents the user information component of a URI.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UserInfo {
    /// The username part of the URI.
    pub user: ArcStr,
    /// The optional password associated with the user.
    pub pass: Option<ArcStr>,
}

impl UserInfo {
    /// Creates a new `UserInfo` with the given `user` and optional `pass`.
    pub fn new(user: &str, pass: Option<&str>) -> Self {
        Self {
            user: user.into(),
            pass: pass.map(|pass| pass.into()),
        }
    }

    /// Returns the user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns the pass.
    pub fn pass(&self) -> Option<&str> {
        self.pass.as_deref()
    }
}

/// Represents a domain name in a SIP URI.
///
/// Comparison ignores ASCII case.
#[derive(Debug, Clone)]
pub struct DomainName(pub(crate) ArcStr);

impl From<&str> for DomainName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl DomainName {
    /// Creates a new `DomainName` from a string slice.
    pub fn new(name: &str) -> Self {
        DomainName(name.into())
    }

    /// Returns the string representation of the domain name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for DomainName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for DomainName {}

impl std::hash::Hash for DomainName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for b in self.0.as_bytes() {
            b.to_ascii_lowercase().hash(state);
        }
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents the host part of a URI, which can be either a
/// domain name or an IP address.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Host {
    /// A domain name, such as `example.com`.
    DomainName(DomainName),
    /// An IP address, either IPv4 or IPv6.
    IpAddr(IpAddr),
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::DomainName(domain) => write!(f, "{domain}"),
            Host::IpAddr(IpAddr::V6(ip)) => write!(f, "[{ip}]"),
            Host::IpAddr(ip_addr) => write!(f, "{ip_addr}"),
        }
    }
}

impl Host {
    /// Returns `true` if the host is an IP address (IPv4 or IPv6).
    pub fn is_ip_addr(&self) -> bool {
        matches!(self, Host::IpAddr(_))
    }

    /// Returns the string representation of the host.
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl FromStr for Host {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(ip_addr) = s.parse::<IpAddr>() {
            Ok(Host::IpAddr(ip_addr))
        } else {
            Ok(Host::DomainName(DomainName(s.into())))
        }
    }
}

/// Represents a combination of a host (domain or IP address) and an optional
/// port.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct HostPort {
    /// The host part, which may be a domain name or an IP address.
    pub host: Host,
    /// The optional port number.
    pub port: Option<u16>,
}

impl FromStr for HostPort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut p = Parser::new(s.as_bytes());

        p.parse_host_port()
    }
}

impl HostPort {
    /// Creates a new `HostPort` from a host and optional port.
    pub fn new(host: Host, port: Option<u16>) -> Self {
        Self { host, port }
    }

    /// Returns the IP address if the host is an IP address, otherwise `None`.
    pub fn ip_addr(&self) -> Option<IpAddr> {
        match self.host {
            Host::DomainName(_) => None,
            Host::IpAddr(ip_addr) => Some(ip_addr),
        }
    }

    /// Returns `true` if the host is a domain name.
    pub fn is_domain(&self) -> bool {
        matches!(self.host, Host::DomainName(_))
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

impl From<Host> for HostPort {
    fn from(host: Host) -> Self {
        Self { host, port: None }
    }
}

impl Default for HostPort {
    fn default() -> Self {
        Self {
            host: Host::DomainName(DomainName::new("localhost")),
            port: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_equivalent_uris() {
        // RFC 3261 §19.1.4 examples.
        assert_eq!(
            uri("sip:alice@atlanta.com;transport=TCP"),
            uri("sip:alice@AtLanTa.CoM;Transport=tcp"),
        );
        assert_eq!(
            uri("sip:carol@chicago.com;newparam=5"),
            uri("sip:carol@chicago.com;security=on"),
        );
    }

    #[test]
    fn test_distinct_uris() {
        // Different usernames are always distinct.
        assert_ne!(uri("SIP:ALICE@AtLanTa.CoM"), uri("sip:alice@AtLanTa.CoM"));
        // Explicit port vs none.
        assert_ne!(uri("sip:bob@biloxi.com"), uri("sip:bob@biloxi.com:5060"));
        // Conflicting generic parameter values.
        assert_ne!(
            uri("sip:carol@chicago.com;security=off"),
            uri("sip:carol@chicago.com;security=on"),
        );
        // method appearing on only one side never matches.
        assert_ne!(
            uri("sip:carol@chicago.com"),
            uri("sip:carol@chicago.com;method=INVITE"),
        );
    }

    #[test]
    fn test_display_round_trip() {
        let s = "sips:alice:secret@example.com:5061;transport=ws;lr";
        assert_eq!(uri(s).to_string(), s);
    }

    #[test]
    fn test_name_addr_quoting() {
        let addr = NameAddr {
            display: Some(r#"Alice "A" B\C"#.into()),
            uri: uri("sip:alice@example.com"),
        };

        assert_eq!(addr.to_string(), r#""Alice \"A\" B\\C" <sip:alice@example.com>"#);

        // And it survives a parse back.
        let parsed: NameAddr = addr.to_string().parse().unwrap();
        assert_eq!(parsed.display(), Some(r#"Alice "A" B\C"#));
    }
}
