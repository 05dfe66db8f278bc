use core::fmt;
use std::net::IpAddr;
use std::str::{self};

use sipua_util::ArcStr;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::macros::{parse_error, parse_param};
use crate::message::{Host, HostPort, Params, TransportKind};
use crate::parser::{self, Parser, SIPV2};

const MADDR_PARAM: &str = "maddr";
const BRANCH_PARAM: &str = "branch";
const TTL_PARAM: &str = "ttl";
const RPORT_PARAM: &str = "rport";
const RECEIVED_PARAM: &str = "received";

/// The branch prefix every RFC 3261 transaction id starts with.
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// The `Via` SIP header.
///
/// Indicates the path taken by the request so far and the
/// path that should be followed in routing responses.
///
/// # Examples
/// ```
/// # use sipua::headers::Via;
/// # use sipua::message::TransportKind;
///
/// let via = Via::new(
///     TransportKind::Ws,
///     "server10.biloxi.com".parse().unwrap(),
///     Some("z9hG4bKnashds8"),
/// );
///
/// assert_eq!(
///     "Via: SIP/2.0/WS server10.biloxi.com;branch=z9hG4bKnashds8",
///     via.to_string()
/// );
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Via {
    transport: TransportKind,
    sent_by: HostPort,
    ttl: Option<ArcStr>,
    maddr: Option<Host>,
    received: Option<IpAddr>,
    branch: Option<ArcStr>,
    rport: Option<u16>,
    params: Option<Params>,
}

impl Via {
    /// Creates a new `Via` header with the given transport and optional
    /// branch.
    pub fn new(transport: TransportKind, sent_by: HostPort, branch: Option<&str>) -> Self {
        Self {
            transport,
            sent_by,
            ttl: None,
            maddr: None,
            received: None,
            branch: branch.map(Into::into),
            rport: None,
            params: None,
        }
    }

    /// Set the `received` parameter.
    pub fn set_received(&mut self, received: IpAddr) {
        self.received = Some(received);
    }

    /// Returns the `received` parameter.
    pub fn received(&self) -> Option<IpAddr> {
        self.received
    }

    /// Returns the `transport`.
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Returns the `rport`.
    pub fn rport(&self) -> Option<u16> {
        self.rport
    }

    /// Set the sent_by field.
    pub fn set_sent_by(&mut self, sent_by: HostPort) {
        self.sent_by = sent_by;
    }

    /// Returns the branch parameter.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Returns the sent_by field.
    pub fn sent_by(&self) -> &HostPort {
        &self.sent_by
    }

    /// Returns the `maddr` parameter.
    pub fn maddr(&self) -> &Option<Host> {
        &self.maddr
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}/{} {}", Via::NAME, SIPV2, self.transport, self.sent_by)?;

        if let Some(rport) = self.rport {
            write!(f, ";rport={}", rport)?;
        }
        if let Some(received) = &self.received {
            write!(f, ";received={received}")?;
        }
        if let Some(ttl) = &self.ttl {
            write!(f, ";ttl={ttl}")?;
        }
        if let Some(maddr) = &self.maddr {
            write!(f, ";maddr={maddr}")?;
        }
        if let Some(branch) = &self.branch {
            write!(f, ";branch={branch}")?;
        }
        if let Some(params) = &self.params {
            write!(f, ";{params}")?;
        }

        Ok(())
    }
}

impl SipHeaderParse for Via {
    const NAME: &'static str = "Via";
    const SHORT_NAME: Option<&'static str> = Some("v");
    /*
     * Via               =  ( "Via" / "v" ) HCOLON via-parm *(COMMA via-parm)
     * via-parm          =  sent-protocol LWS sent-by *( SEMI via-params )
     * via-params        =  via-ttl / via-maddr
     *                      / via-received / via-branch
     *                      / via-extension
     * via-ttl           =  "ttl" EQUAL ttl
     * via-maddr         =  "maddr" EQUAL host
     * via-received      =  "received" EQUAL (IPv4address / IPv6address)
     * via-branch        =  "branch" EQUAL token
     * via-extension     =  generic-param
     * sent-protocol     =  protocol-name SLASH protocol-version
     *                      SLASH transport
     * sent-by           =  host [ COLON port ]
     * ttl               =  1*3DIGIT ; 0 to 255
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        parser.parse_sip_v2()?;
        parser.must_read(b'/')?;

        let b = parser.read_until_byte(b' ');
        let transport = b.into();

        parser.ws();

        let sent_by = parser.parse_host_port()?;
        let mut branch = None;
        let mut ttl = None;
        let mut maddr = None;
        let mut received = None;
        let mut rport_p = None;
        let params = parse_param!(
            parser,
            parser::parse_via_param,
            BRANCH_PARAM = branch,
            TTL_PARAM = ttl,
            MADDR_PARAM = maddr,
            RECEIVED_PARAM = received,
            RPORT_PARAM = rport_p
        );
        let received: Option<IpAddr> = received.and_then(|r: ArcStr| r.parse().ok());
        let maddr = maddr.map(|a: ArcStr| match a.parse() {
            Ok(addr) => Host::IpAddr(addr),
            Err(_) => Host::DomainName(a.as_ref().into()),
        });

        let rport = match rport_p.filter(|rport: &ArcStr| !rport.is_empty()) {
            Some(rport) => match rport.parse::<u16>() {
                Ok(rport) => Some(rport),
                Err(_) => return parse_error!("Via param rport is invalid!"),
            },
            None => None,
        };

        Ok(Via {
            transport,
            sent_by,
            params,
            ttl,
            maddr,
            received,
            branch,
            rport,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn test_parse() {
        let src = b"SIP/2.0/UDP bobspc.biloxi.com:5060;received=192.0.2.4\r\n";
        let mut scanner = Parser::new(src);
        let via = Via::parse(&mut scanner);
        let via = via.unwrap();

        assert_eq!(via.transport, TransportKind::Udp);
        assert_eq!(
            via.sent_by,
            HostPort {
                host: Host::DomainName("bobspc.biloxi.com".into()),
                port: Some(5060)
            }
        );

        assert_eq!(via.received, Some("192.0.2.4".parse().unwrap()));

        let src = b"SIP/2.0/UDP 192.0.2.1:5060 ;received=192.0.2.207 \
        ;branch=z9hG4bK77asjd\r\n";
        let mut scanner = Parser::new(src);
        let via = Via::parse(&mut scanner);
        let via = via.unwrap();

        assert_eq!(via.transport, TransportKind::Udp);
        assert_eq!(
            via.sent_by,
            HostPort {
                host: Host::IpAddr(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))),
                port: Some(5060)
            }
        );

        assert_eq!(via.received, Some("192.0.2.207".parse().unwrap()));
        assert_eq!(via.branch(), Some("z9hG4bK77asjd"));
    }

    #[test]
    fn test_parse_ws() {
        let src = b"SIP/2.0/WSS f5nvgsm0x0qo.invalid;branch=z9hG4bK8537077\r\n";
        let mut scanner = Parser::new(src);
        let via = Via::parse(&mut scanner).unwrap();

        assert_eq!(via.transport, TransportKind::Wss);
        assert_eq!(via.branch(), Some("z9hG4bK8537077"));
        assert!(via.branch().unwrap().starts_with(BRANCH_MAGIC_COOKIE));
    }
}
