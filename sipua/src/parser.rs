//! SIP message parser.
//!
//! [`Parser`] splits wire bytes into a first line, a header list and an
//! optional body, handing each well-known header value to its typed
//! grammar. Unknown headers are kept verbatim so they can be forwarded.

use std::borrow::Cow;
use std::str;

use bytes::Bytes;
use sipua_util::util::{is_newline, is_space};
use sipua_util::{ArcStr, Position, Scanner};

use crate::error::Result;
use crate::headers::{
    Allow, Authorization, CallId, Contact, ContentLength, ContentType, CSeq, Event, Expires, From, Header, Headers,
    MaxForwards, MinExpires, OtherHeader, ProxyAuthenticate, ProxyAuthorization, RecordRoute, ReferTo, Replaces,
    Require, Route, SessionExpires, SipHeaderParse, SubscriptionState, Supported, To, UserAgent, Via, WWWAuthenticate,
};
use crate::macros::{b_map, comma_sep, parse_error, parse_header};
use crate::message::auth::{Challenge, Credential, DigestChallenge, DigestCredential};
use crate::message::{
    Host, HostPort, Param, Params, Request, RequestLine, Response, Scheme, SipAddr, SipMsg, StatusLine, NameAddr, Uri,
    UriHeaders, UserInfo,
};

pub(crate) const SIPV2: &str = "SIP/2.0";

const ALPHA_NUM: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const UNRESERVED: &[u8] = b"-_.!~*'()";
const ESCAPED: &[u8] = b"%";
const USER_UNRESERVED: &[u8] = b"&=+$,;?/";
const TOKEN: &[u8] = b"-.!%*_`'~+";
const PASS: &[u8] = b"&=+$,";
const HOST: &[u8] = b"_-.";
const PARAM_VALUE: &[u8] = b"[]/:&+$@";
const HDR_VALUE: &[u8] = b"[]/:+$@;?%!*_`'~.-";

b_map!(TOKEN_MAP => ALPHA_NUM, TOKEN);
b_map!(USER_MAP => ALPHA_NUM, UNRESERVED, ESCAPED, USER_UNRESERVED);
b_map!(PASS_MAP => ALPHA_NUM, UNRESERVED, ESCAPED, PASS);
b_map!(HOST_MAP => ALPHA_NUM, HOST);
b_map!(PARAM_MAP => ALPHA_NUM, TOKEN, PARAM_VALUE);
b_map!(HDR_MAP => ALPHA_NUM, HDR_VALUE);

#[inline(always)]
fn is_token(b: u8) -> bool {
    TOKEN_MAP[b as usize]
}

#[inline(always)]
fn is_user(b: u8) -> bool {
    USER_MAP[b as usize]
}

#[inline(always)]
fn is_pass(b: u8) -> bool {
    PASS_MAP[b as usize]
}

#[inline(always)]
fn is_host(b: u8) -> bool {
    HOST_MAP[b as usize]
}

#[inline(always)]
fn is_param_value(b: u8) -> bool {
    PARAM_MAP[b as usize]
}

#[inline(always)]
fn is_uri_hdr(b: u8) -> bool {
    HDR_MAP[b as usize]
}

/// This struct provides methods for parsing various components of SIP
/// messages, from whole requests and responses down to single URIs and
/// parameters.
pub struct Parser<'buf> {
    scanner: Scanner<'buf>,
}

impl<'buf> Parser<'buf> {
    /// Creates a parser over the given byte slice.
    pub fn new(buf: &'buf [u8]) -> Self {
        Self {
            scanner: Scanner::new(buf),
        }
    }

    /// Parses a complete SIP message.
    ///
    /// The buffer must contain the whole message. Header lines folded with
    /// leading whitespace are unfolded before their grammar runs. When a
    /// `Content-Length` header is present the body is cut to that many
    /// bytes; announcing more bytes than the packet carries is an error,
    /// while excess bytes beyond the announced length are discarded.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sipua::parser::Parser;
    /// let msg = b"SIP/2.0 200 OK\r\nContent-Length: 0\r\n\r\n";
    /// let msg = Parser::new(msg).parse_sip_msg().unwrap();
    ///
    /// assert!(msg.is_response());
    /// ```
    pub fn parse_sip_msg(&mut self) -> Result<SipMsg> {
        let mut msg = self.parse_start_line()?;

        let headers = msg.headers_mut();
        loop {
            if self.scanner.is_eof() {
                return parse_error!("Missing CRLF at end of headers", self);
            }
            if self.scanner.cur_is_some_and(is_newline) {
                // Blank line, end of headers.
                self.read_crlf()?;
                break;
            }

            let name = self.scanner.read_while(is_token);
            self.ws();
            if self.scanner.must_read(b':').is_err() {
                return parse_error!("Malformed header line", self);
            }
            let value = self.read_folded_value()?;

            parse_header_line(name, &value, headers)?;
        }

        let announced = headers
            .find_map(|h| match h {
                Header::ContentLength(c) => Some(c),
                _ => None,
            })
            .map(|clen| clen.len() as usize);
        let body = self.scanner.remaing();

        let body = match announced {
            Some(announced) => {
                if announced > body.len() {
                    return parse_error!(format!(
                        "Content-Length {} exceeds the {} bytes available",
                        announced,
                        body.len()
                    ));
                }
                // RFC 3261 §18.3, octets beyond Content-Length are discarded.
                (announced > 0).then(|| Bytes::copy_from_slice(&body[..announced]))
            }
            None => (!body.is_empty()).then(|| Bytes::copy_from_slice(body)),
        };

        msg.set_body(body);

        Ok(msg)
    }

    fn parse_start_line(&mut self) -> Result<SipMsg> {
        if self.scanner.starts_with(SIPV2.as_bytes()) {
            let status_line = self.parse_status_line()?;
            Ok(SipMsg::Response(Response::new(status_line)))
        } else {
            let req_line = self.parse_request_line()?;
            Ok(SipMsg::Request(Request {
                req_line,
                headers: Headers::default(),
                body: None,
            }))
        }
    }

    pub(crate) fn parse_request_line(&mut self) -> Result<RequestLine> {
        let method = self.parse_token()?;
        if method.bytes().any(|b| b.is_ascii_lowercase()) {
            return parse_error!("Request method must be an uppercase token", self);
        }
        let method = method.as_bytes().into();

        self.ws();
        let uri = self.parse_uri(true)?;
        self.ws();
        self.parse_sip_v2()?;
        self.read_crlf()?;

        Ok(RequestLine { method, uri })
    }

    pub(crate) fn parse_status_line(&mut self) -> Result<StatusLine> {
        self.parse_sip_v2()?;
        self.ws();

        let code = self.parse_u32()?;
        if !(100..=699).contains(&code) {
            return parse_error!("Status code out of range", self);
        }
        self.ws();

        let reason = self.read_while_str(|b| !is_newline(b))?;
        self.read_crlf()?;

        Ok(StatusLine::new((code as u16).into(), reason))
    }

    /// Reads one header value, unfolding continuation lines.
    fn read_folded_value(&mut self) -> Result<Cow<'buf, [u8]>> {
        self.ws();
        let first = self.scanner.read_while(|b| !is_newline(b));
        self.read_crlf()?;

        if !self.scanner.cur_is_some_and(is_space) {
            return Ok(Cow::Borrowed(first));
        }

        let mut unfolded = first.to_vec();
        while self.scanner.cur_is_some_and(is_space) {
            self.ws();
            unfolded.push(b' ');
            unfolded.extend_from_slice(self.scanner.read_while(|b| !is_newline(b)));
            self.read_crlf()?;
        }

        Ok(Cow::Owned(unfolded))
    }

    fn read_crlf(&mut self) -> Result<()> {
        self.scanner.consume_if(|b| b == b'\r');
        if self.scanner.must_read(b'\n').is_err() {
            return parse_error!("Expected CRLF", self);
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn ws(&mut self) {
        self.scanner.read_while(is_space);
    }

    #[inline]
    pub(crate) fn advance(&mut self) -> Option<u8> {
        self.scanner.next()
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<&u8> {
        self.scanner.peek()
    }

    #[inline]
    pub(crate) fn position(&self) -> &Position {
        self.scanner.position()
    }

    #[inline]
    pub(crate) fn remaining(&self) -> &[u8] {
        self.scanner.remaing()
    }

    #[inline]
    pub(crate) fn read_until_byte(&mut self, byte: u8) -> &'buf [u8] {
        self.scanner.take_until(byte)
    }

    pub(crate) fn must_read(&mut self, b: u8) -> Result<()> {
        if self.scanner.must_read(b).is_err() {
            return parse_error!(format!("Expected '{}'", b as char), self);
        }
        Ok(())
    }

    pub(crate) fn parse_u32(&mut self) -> Result<u32> {
        Ok(self.scanner.read_u32()?)
    }

    pub(crate) fn read_while_str<F>(&mut self, func: F) -> Result<&'buf str>
    where
        F: Fn(u8) -> bool,
    {
        Ok(str::from_utf8(self.scanner.read_while(func))?)
    }

    /// Reads a SIP token, which must not be empty.
    pub(crate) fn parse_token(&mut self) -> Result<&'buf str> {
        let token = self.scanner.read_while(is_token);
        if token.is_empty() {
            return parse_error!("Expected a token", self);
        }

        // Token bytes are always valid UTF-8.
        Ok(unsafe { str::from_utf8_unchecked(token) })
    }

    pub(crate) fn parse_sip_v2(&mut self) -> Result<()> {
        if self.scanner.matches_slice(SIPV2.as_bytes()).is_err() {
            return parse_error!("Expected SIP/2.0", self);
        }
        Ok(())
    }

    /// Reads a quoted string, unescaping `\"` and `\\`.
    pub(crate) fn parse_quoted(&mut self) -> Result<ArcStr> {
        self.must_read(b'"')?;

        let mut unquoted = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(escaped) => unquoted.push(escaped),
                    None => return parse_error!("Unterminated quoted string", self),
                },
                Some(b) if !is_newline(b) => unquoted.push(b),
                _ => return parse_error!("Unterminated quoted string", self),
            }
        }

        Ok(str::from_utf8(&unquoted)?.into())
    }

    fn parse_scheme(&mut self) -> Result<Scheme> {
        let scheme = self.parse_token()?;
        let scheme = match scheme {
            s if s.eq_ignore_ascii_case("sip") => Scheme::Sip,
            s if s.eq_ignore_ascii_case("sips") => Scheme::Sips,
            s if s.eq_ignore_ascii_case("tel") => Scheme::Tel,
            _ => return parse_error!(format!("Unsupported uri scheme '{}'", scheme), self),
        };
        self.must_read(b':')?;

        Ok(scheme)
    }

    fn has_user_part(&self) -> bool {
        for &b in self.remaining() {
            match b {
                b'@' => return true,
                b' ' | b'\r' | b'\n' | b'>' | b';' | b'?' => return false,
                _ => (),
            }
        }
        false
    }

    pub(crate) fn parse_user_info(&mut self) -> Result<Option<UserInfo>> {
        if !self.has_user_part() {
            return Ok(None);
        }

        let user = self.read_while_str(is_user)?;
        let pass = if self.peek() == Some(&b':') {
            self.advance();
            Some(self.read_while_str(is_pass)?)
        } else {
            None
        };
        self.must_read(b'@')?;

        Ok(Some(UserInfo::new(user, pass)))
    }

    /// Parses a `host [":" port]`.
    ///
    /// The hostname production is relaxed so a label may begin with a
    /// digit, which also covers plain IPv4 addresses. Whatever parses as
    /// an IP address becomes [`Host::IpAddr`], the rest a domain name.
    pub(crate) fn parse_host_port(&mut self) -> Result<HostPort> {
        let host = if self.peek() == Some(&b'[') {
            self.advance();
            let host = self.read_while_str(|b| b != b']')?;
            self.must_read(b']')?;
            match host.parse() {
                Ok(ip) => Host::IpAddr(std::net::IpAddr::V6(ip)),
                Err(_) => return parse_error!("Invalid IPv6 reference", self),
            }
        } else {
            let host = self.read_while_str(is_host)?;
            if host.is_empty() {
                return parse_error!("Missing uri host", self);
            }
            match host.parse() {
                Ok(ip) => Host::IpAddr(ip),
                Err(_) => Host::DomainName(host.into()),
            }
        };

        let port = if self.peek() == Some(&b':') {
            self.advance();
            match self.scanner.read_u16() {
                Ok(port) => Some(port),
                Err(_) => return parse_error!("Invalid port", self),
            }
        } else {
            None
        };

        Ok(HostPort { host, port })
    }

    /// Parses a SIP uri.
    ///
    /// When `parse_params` is `false` the uri stops before any `;`
    /// parameters, leaving them to the surrounding header grammar. This is
    /// the `addr-spec` behavior of `From`, `To` and `Contact` without
    /// angle brackets.
    pub fn parse_uri(&mut self, parse_params: bool) -> Result<Uri> {
        let scheme = self.parse_scheme()?;

        if matches!(scheme, Scheme::Tel) {
            let number = self.read_while_str(|b| is_user(b) && b != b';' && b != b'?')?;
            let mut uri = Uri::new(scheme, Some(UserInfo::new(number, None)), HostPort::new(Host::DomainName("".into()), None));
            if parse_params {
                self.parse_uri_params(&mut uri)?;
            }
            return Ok(uri);
        }

        let user = self.parse_user_info()?;
        let host_port = self.parse_host_port()?;

        let mut uri = Uri::new(scheme, user, host_port);
        if parse_params {
            self.parse_uri_params(&mut uri)?;
        }

        Ok(uri)
    }

    fn parse_uri_params(&mut self, uri: &mut Uri) -> Result<()> {
        while self.peek() == Some(&b';') {
            self.advance();
            let param = self.parse_param()?;
            match param.name.as_ref() {
                "user" => uri.user_param = param.value,
                "method" => uri.method_param = param.value.map(|v| v.as_bytes().into()),
                "transport" => uri.transport_param = param.value.map(|v| v.as_bytes().into()),
                "ttl" => uri.ttl_param = param.value.and_then(|v| v.parse().ok()),
                "lr" => uri.lr_param = true,
                "maddr" => uri.maddr_param = param.value.and_then(|v| v.parse().ok()),
                _ => uri.parameters.get_or_insert_with(Params::new).push(param),
            }
        }

        if self.peek() == Some(&b'?') {
            self.advance();
            let mut headers = Params::new();
            loop {
                let name = self.read_while_str(is_uri_hdr)?;
                self.must_read(b'=')?;
                let value = self.read_while_str(|b| is_uri_hdr(b) || b == b'=')?;
                headers.push(Param::new(name, Some(value)));

                if self.peek() == Some(&b'&') {
                    self.advance();
                } else {
                    break;
                }
            }
            uri.headers = Some(UriHeaders { inner: headers });
        }

        Ok(())
    }

    fn parse_display_name(&mut self) -> Result<Option<ArcStr>> {
        self.ws();
        match self.peek() {
            Some(b'"') => Ok(Some(self.parse_quoted()?)),
            Some(b'<') => Ok(None),
            _ => {
                let display = self.read_while_str(|b| b != b'<' && !is_newline(b))?;
                let display = display.trim_end();
                Ok((!display.is_empty()).then(|| display.into()))
            }
        }
    }

    /// Parses a `name-addr`: an optional display name followed by a uri in
    /// angle brackets.
    pub fn parse_name_addr(&mut self) -> Result<NameAddr> {
        let display = self.parse_display_name()?;
        self.ws();
        self.must_read(b'<')?;
        let uri = self.parse_uri(true)?;
        self.must_read(b'>')?;

        Ok(NameAddr { display, uri })
    }

    /// Parses either a `name-addr` or a bare `addr-spec`.
    pub fn parse_sip_addr(&mut self, parse_uri_params: bool) -> Result<SipAddr> {
        self.ws();
        let has_brackets = self
            .remaining()
            .iter()
            .take_while(|&&b| !is_newline(b))
            .any(|&b| b == b'<');

        if has_brackets {
            Ok(SipAddr::NameAddr(self.parse_name_addr()?))
        } else {
            Ok(SipAddr::Uri(self.parse_uri(parse_uri_params)?))
        }
    }

    /// Parses a single `;name[=value]` parameter body (the `;` must already
    /// be consumed). Names are lowercased, values kept verbatim.
    pub(crate) fn parse_param(&mut self) -> Result<Param> {
        self.ws();
        let name = self.parse_token()?;
        let name: ArcStr = if name.bytes().any(|b| b.is_ascii_uppercase()) {
            name.to_ascii_lowercase().into()
        } else {
            name.into()
        };

        self.ws();
        let value = if self.peek() == Some(&b'=') {
            self.advance();
            self.ws();
            if self.peek() == Some(&b'"') {
                // Keep generic quoted values verbatim, quotes included.
                self.advance();
                let inner = self.read_while_str(|b| b != b'"' && !is_newline(b))?;
                self.must_read(b'"')?;
                Some(format!("\"{inner}\"").as_str().into())
            } else {
                Some(self.read_while_str(is_param_value)?.into())
            }
        } else {
            None
        };

        Ok(Param { name, value })
    }

    fn parse_auth_param(&mut self) -> Result<(String, Option<ArcStr>)> {
        self.ws();
        let name = self.parse_token()?.to_ascii_lowercase();
        self.ws();
        let value = if self.peek() == Some(&b'=') {
            self.advance();
            self.ws();
            if self.peek() == Some(&b'"') {
                Some(self.parse_quoted()?)
            } else {
                Some(self.read_while_str(is_param_value)?.into())
            }
        } else {
            None
        };

        Ok((name, value))
    }

    /// Parses an authentication challenge as found in `WWW-Authenticate`
    /// and `Proxy-Authenticate` headers.
    pub(crate) fn parse_auth_challenge(&mut self) -> Result<Challenge> {
        self.ws();
        let scheme = self.parse_token()?;

        if !scheme.eq_ignore_ascii_case("Digest") {
            let scheme: ArcStr = scheme.into();
            let mut param = Params::new();
            comma_sep!(self => {
                let (name, value) = self.parse_auth_param()?;
                param.push(Param { name: name.as_str().into(), value });
            });

            return Ok(Challenge::Other { scheme, param });
        }

        let mut digest = DigestChallenge::default();
        comma_sep!(self => {
            let (name, value) = self.parse_auth_param()?;
            match name.as_str() {
                "realm" => digest.realm = value,
                "domain" => digest.domain = value,
                "nonce" => digest.nonce = value,
                "opaque" => digest.opaque = value,
                "stale" => digest.stale = value,
                "algorithm" => digest.algorithm = value,
                "qop" => digest.qop = value,
                _ => (),
            }
        });

        Ok(Challenge::Digest(digest))
    }

    /// Parses authentication credentials as found in `Authorization` and
    /// `Proxy-Authorization` headers.
    pub(crate) fn parse_auth_credential(&mut self) -> Result<Credential> {
        self.ws();
        let scheme = self.parse_token()?;

        if !scheme.eq_ignore_ascii_case("Digest") {
            let scheme: ArcStr = scheme.into();
            let mut param = Params::new();
            comma_sep!(self => {
                let (name, value) = self.parse_auth_param()?;
                param.push(Param { name: name.as_str().into(), value });
            });

            return Ok(Credential::Other { scheme, param });
        }

        let mut digest = DigestCredential::default();
        comma_sep!(self => {
            let (name, value) = self.parse_auth_param()?;
            match name.as_str() {
                "realm" => digest.realm = value,
                "username" => digest.username = value,
                "nonce" => digest.nonce = value,
                "uri" => digest.uri = value,
                "response" => digest.response = value,
                "algorithm" => digest.algorithm = value,
                "cnonce" => digest.cnonce = value,
                "opaque" => digest.opaque = value,
                "qop" => digest.qop = value,
                "nc" => digest.nc = value,
                _ => (),
            }
        });

        Ok(Credential::Digest(digest))
    }
}

/// Free-standing variant of [`Parser::parse_param`] used by the `Via`
/// grammar, whose `received` values may carry colons (IPv6).
pub(crate) fn parse_via_param(parser: &mut Parser) -> Result<Param> {
    parser.parse_param()
}

/// Runs the right typed grammar for one (unfolded) header line.
fn parse_header_line(name: &[u8], value: &[u8], headers: &mut Headers) -> Result<()> {
    let parser = &mut Parser::new(value);

    if Via::matches_name(name) {
        comma_sep!(parser => {
            headers.push(Header::Via(parse_header!(Via, parser)));
        });
    } else if From::matches_name(name) {
        headers.push(Header::From(parse_header!(From, parser)));
    } else if To::matches_name(name) {
        headers.push(Header::To(parse_header!(To, parser)));
    } else if CallId::matches_name(name) {
        headers.push(Header::CallId(parse_header!(CallId, parser)));
    } else if CSeq::matches_name(name) {
        headers.push(Header::CSeq(parse_header!(CSeq, parser)));
    } else if Contact::matches_name(name) {
        comma_sep!(parser => {
            headers.push(Header::Contact(parse_header!(Contact, parser)));
        });
    } else if Route::matches_name(name) {
        comma_sep!(parser => {
            headers.push(Header::Route(parse_header!(Route, parser)));
        });
    } else if RecordRoute::matches_name(name) {
        comma_sep!(parser => {
            headers.push(Header::RecordRoute(parse_header!(RecordRoute, parser)));
        });
    } else if ContentLength::matches_name(name) {
        headers.push(Header::ContentLength(parse_header!(ContentLength, parser)));
    } else if ContentType::matches_name(name) {
        headers.push(Header::ContentType(parse_header!(ContentType, parser)));
    } else if MaxForwards::matches_name(name) {
        headers.push(Header::MaxForwards(parse_header!(MaxForwards, parser)));
    } else if Expires::matches_name(name) {
        headers.push(Header::Expires(parse_header!(Expires, parser)));
    } else if MinExpires::matches_name(name) {
        headers.push(Header::MinExpires(parse_header!(MinExpires, parser)));
    } else if Allow::matches_name(name) {
        headers.push(Header::Allow(parse_header!(Allow, parser)));
    } else if Supported::matches_name(name) {
        headers.push(Header::Supported(parse_header!(Supported, parser)));
    } else if Require::matches_name(name) {
        headers.push(Header::Require(parse_header!(Require, parser)));
    } else if WWWAuthenticate::matches_name(name) {
        headers.push(Header::WWWAuthenticate(parse_header!(WWWAuthenticate, parser)));
    } else if ProxyAuthenticate::matches_name(name) {
        headers.push(Header::ProxyAuthenticate(parse_header!(ProxyAuthenticate, parser)));
    } else if Authorization::matches_name(name) {
        headers.push(Header::Authorization(parse_header!(Authorization, parser)));
    } else if ProxyAuthorization::matches_name(name) {
        headers.push(Header::ProxyAuthorization(parse_header!(ProxyAuthorization, parser)));
    } else if Event::matches_name(name) {
        headers.push(Header::Event(parse_header!(Event, parser)));
    } else if SubscriptionState::matches_name(name) {
        headers.push(Header::SubscriptionState(parse_header!(SubscriptionState, parser)));
    } else if ReferTo::matches_name(name) {
        headers.push(Header::ReferTo(parse_header!(ReferTo, parser)));
    } else if Replaces::matches_name(name) {
        headers.push(Header::Replaces(parse_header!(Replaces, parser)));
    } else if SessionExpires::matches_name(name) {
        headers.push(Header::SessionExpires(parse_header!(SessionExpires, parser)));
    } else if UserAgent::matches_name(name) {
        headers.push(Header::UserAgent(parse_header!(UserAgent, parser)));
    } else {
        let name = str::from_utf8(name)?;
        let value = str::from_utf8(value)?;
        headers.push(Header::Other(OtherHeader {
            name: name.into(),
            value: value.trim().into(),
        }));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SipMethod;

    const REGISTER_MSG: &[u8] = b"REGISTER sip:registrar.biloxi.com SIP/2.0\r\n\
        Via: SIP/2.0/UDP bobspc.biloxi.com:5060;branch=z9hG4bKnashds7\r\n\
        Max-Forwards: 70\r\n\
        To: Bob <sip:bob@biloxi.com>\r\n\
        From: Bob <sip:bob@biloxi.com>;tag=456248\r\n\
        Call-ID: 843817637684230@998sdasdh09\r\n\
        CSeq: 1826 REGISTER\r\n\
        Contact: <sip:bob@192.0.2.4>\r\n\
        Expires: 7200\r\n\
        Content-Length: 0\r\n\r\n";

    #[test]
    fn test_parse_register() {
        let msg = Parser::new(REGISTER_MSG).parse_sip_msg().unwrap();

        let request = msg.request().unwrap();
        assert_eq!(request.method(), &SipMethod::Register);
        assert_eq!(request.uri().host_port.to_string(), "registrar.biloxi.com");
        assert_eq!(request.headers.len(), 9);
        assert!(msg.body().is_none());
    }

    #[test]
    fn test_parse_response() {
        let src = b"SIP/2.0 180 Ringing\r\n\
            Via: SIP/2.0/WS df7jal23ls0d.invalid;branch=z9hG4bKnashds7;received=192.0.2.201\r\n\
            To: <sip:bob@biloxi.com>;tag=8321234356\r\n\
            From: <sip:alice@atlanta.com>;tag=1928301774\r\n\
            Call-ID: a84b4c76e66710\r\n\
            CSeq: 314159 INVITE\r\n\
            Content-Length: 0\r\n\r\n";
        let msg = Parser::new(src).parse_sip_msg().unwrap();

        let response = msg.response().unwrap();
        assert_eq!(response.code().into_u16(), 180);
        assert_eq!(response.reason(), "Ringing");

        let to = msg.headers().find_map(|h| h.as_to()).unwrap();
        assert_eq!(to.tag(), Some("8321234356"));
    }

    #[test]
    fn test_parse_folded_header() {
        let src = b"OPTIONS sip:bob@biloxi.com SIP/2.0\r\n\
            Via: SIP/2.0/WS host.invalid;branch=z9hG4bK1\r\n\
            Subject: I know you're there,\r\n \
            \tpick up the phone\r\n\
            Call-ID: folded@test\r\n\
            CSeq: 1 OPTIONS\r\n\
            To: <sip:bob@biloxi.com>\r\n\
            From: <sip:alice@atlanta.com>;tag=88\r\n\
            Content-Length: 0\r\n\r\n";
        let msg = Parser::new(src).parse_sip_msg().unwrap();

        let subject = msg.headers().get_by_name("Subject").unwrap();
        assert_eq!(
            subject.to_string(),
            "Subject: I know you're there, pick up the phone"
        );
    }

    #[test]
    fn test_body_respects_content_length() {
        let src = b"MESSAGE sip:bob@biloxi.com SIP/2.0\r\n\
            Via: SIP/2.0/WS host.invalid;branch=z9hG4bK1\r\n\
            Call-ID: body@test\r\n\
            CSeq: 1 MESSAGE\r\n\
            To: <sip:bob@biloxi.com>\r\n\
            From: <sip:alice@atlanta.com>;tag=88\r\n\
            Content-Type: text/plain\r\n\
            Content-Length: 5\r\n\r\nhello, this is ignored";
        let msg = Parser::new(src).parse_sip_msg().unwrap();

        assert_eq!(msg.body(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_content_length_larger_than_packet_is_rejected() {
        let src = b"MESSAGE sip:bob@biloxi.com SIP/2.0\r\n\
            Via: SIP/2.0/WS host.invalid;branch=z9hG4bK1\r\n\
            Call-ID: body@test\r\n\
            CSeq: 1 MESSAGE\r\n\
            To: <sip:bob@biloxi.com>\r\n\
            From: <sip:alice@atlanta.com>;tag=88\r\n\
            Content-Length: 500\r\n\r\nshort";

        assert!(Parser::new(src).parse_sip_msg().is_err());
    }

    #[test]
    fn test_unparseable_known_header_rejects_message() {
        let src = b"OPTIONS sip:bob@biloxi.com SIP/2.0\r\n\
            Via: SIP/2.0/WS host.invalid;branch=z9hG4bK1\r\n\
            CSeq: not-a-number OPTIONS\r\n\
            Call-ID: x@test\r\n\
            To: <sip:bob@biloxi.com>\r\n\
            From: <sip:alice@atlanta.com>;tag=88\r\n\
            Content-Length: 0\r\n\r\n";

        assert!(Parser::new(src).parse_sip_msg().is_err());
    }

    #[test]
    fn test_host_starting_with_digit() {
        let uri: Uri = "sip:alice@203.0.113.10".parse().unwrap();
        assert!(uri.host_port.host.is_ip_addr());

        let uri: Uri = "sip:alice@1and1-hosted.example".parse().unwrap();
        assert!(!uri.host_port.host.is_ip_addr());
        assert_eq!(uri.host_port.to_string(), "1and1-hosted.example");
    }

    #[test]
    fn test_comma_separated_via_expands() {
        let src = b"SIP/2.0 200 OK\r\n\
            Via: SIP/2.0/UDP one.example;branch=z9hG4bK1, SIP/2.0/UDP two.example;branch=z9hG4bK2\r\n\
            Call-ID: x@test\r\n\
            CSeq: 1 OPTIONS\r\n\
            To: <sip:bob@biloxi.com>;tag=1\r\n\
            From: <sip:alice@atlanta.com>;tag=88\r\n\
            Content-Length: 0\r\n\r\n";
        let msg = Parser::new(src).parse_sip_msg().unwrap();

        let vias: Vec<_> = msg.headers().filter(|h| matches!(h, Header::Via(_))).collect();
        assert_eq!(vias.len(), 2);
    }

    #[test]
    fn test_round_trip_modulo_header_order() {
        let msg = Parser::new(REGISTER_MSG).parse_sip_msg().unwrap();
        let request = msg.request().unwrap();

        let rendered = format!("{}{}\r\n", request.req_line, request.headers);
        let reparsed = Parser::new(rendered.as_bytes()).parse_sip_msg().unwrap();

        assert_eq!(reparsed.headers().len(), msg.headers().len());
        for (a, b) in reparsed.headers().iter().zip(msg.headers().iter()) {
            assert_eq!(a.to_string(), b.to_string());
        }
    }
}
