//! SIP Auth types
//!
use std::fmt;

use sipua_util::ArcStr;

use crate::message::Params;

/// A Digest Challenge.
///
/// Parameter values are stored unquoted; [`fmt::Display`] re-quotes the
/// fields the grammar requires to be quoted strings.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct DigestChallenge {
    /// The realm of the digest authentication.
    pub realm: Option<ArcStr>,

    /// The domain of the digest authentication.
    pub domain: Option<ArcStr>,

    /// The nonce of the digest authentication.
    pub nonce: Option<ArcStr>,

    /// The opaque value of the digest authentication.
    pub opaque: Option<ArcStr>,

    /// Indicates whether the previous request was stale.
    pub stale: Option<ArcStr>,

    /// The algorithm used in the digest authentication.
    pub algorithm: Option<ArcStr>,

    /// The quality of protection (qop) value.
    pub qop: Option<ArcStr>,
}

impl DigestChallenge {
    /// Returns `true` if the challenge marks the previous nonce as stale.
    pub fn is_stale(&self) -> bool {
        self.stale.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("true"))
    }
}

/// This enum represents an authentication challenge mechanism
/// used in `Proxy-Authenticate` and `WWW-Authenticate` headers.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Challenge {
    /// A `Digest` authentication scheme.
    Digest(DigestChallenge),
    /// Any other authentication scheme not specifically handled.
    Other {
        /// The name of the authentication scheme.
        scheme: ArcStr,

        /// The parameters associated with the scheme.
        param: Params,
    },
}

impl Challenge {
    /// Returns the digest challenge, if this is one.
    pub fn digest(&self) -> Option<&DigestChallenge> {
        match self {
            Challenge::Digest(digest) => Some(digest),
            Challenge::Other { .. } => None,
        }
    }
}

fn quoted(f: &mut fmt::Formatter<'_>, name: &str, value: &Option<ArcStr>, first: &mut bool) -> fmt::Result {
    if let Some(value) = value {
        let sep = if *first { "" } else { ", " };
        *first = false;
        write!(f, "{sep}{name}=\"{value}\"")?;
    }
    Ok(())
}

fn unquoted(f: &mut fmt::Formatter<'_>, name: &str, value: &Option<ArcStr>, first: &mut bool) -> fmt::Result {
    if let Some(value) = value {
        let sep = if *first { "" } else { ", " };
        *first = false;
        write!(f, "{sep}{name}={value}")?;
    }
    Ok(())
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Challenge::Digest(DigestChallenge {
                realm,
                domain,
                nonce,
                opaque,
                stale,
                algorithm,
                qop,
            }) => {
                write!(f, "Digest ")?;
                let first = &mut true;
                quoted(f, "realm", realm, first)?;
                quoted(f, "domain", domain, first)?;
                quoted(f, "nonce", nonce, first)?;
                quoted(f, "opaque", opaque, first)?;
                unquoted(f, "stale", stale, first)?;
                unquoted(f, "algorithm", algorithm, first)?;
                quoted(f, "qop", qop, first)?;

                Ok(())
            }
            Challenge::Other { scheme, param } => {
                write!(f, "{scheme} ")?;
                let mut first = true;
                for p in param.iter() {
                    let sep = if first { "" } else { ", " };
                    first = false;
                    match &p.value {
                        Some(value) => write!(f, "{sep}{}={}", p.name, value)?,
                        None => write!(f, "{sep}{}", p.name)?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Represents credentials for a `Digest` authentication scheme,
/// typically found in the `Authorization` and `Proxy-Authorization` headers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigestCredential {
    /// The realm value that defines the protection space.
    pub realm: Option<ArcStr>,

    /// The username associated with the credential.
    pub username: Option<ArcStr>,

    /// The nonce value provided by the server.
    pub nonce: Option<ArcStr>,

    /// The URI of the requested resource.
    pub uri: Option<ArcStr>,

    /// The response hash calculated from the credential data.
    pub response: Option<ArcStr>,

    /// The algorithm used to hash the credentials (e.g., "MD5").
    pub algorithm: Option<ArcStr>,

    /// The client nonce value (cnonce) used to prevent replay attacks.
    pub cnonce: Option<ArcStr>,

    /// The opaque value provided by the server, to be returned unchanged.
    pub opaque: Option<ArcStr>,

    /// The quality of protection (qop) applied to the message.
    pub qop: Option<ArcStr>,

    /// The nonce count (nc), indicating the number of requests made with the same nonce.
    pub nc: Option<ArcStr>,
}

/// This type represent a credential containing the
/// authentication information in `Authorization` and
/// `Proxy-Authorization` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// A `digest` authentication scheme.
    Digest(DigestCredential),
    /// Other scheme not specified.
    Other {
        /// The name of the authentication scheme.
        scheme: ArcStr,

        /// The parameters associated with the scheme.
        param: Params,
    },
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Digest(DigestCredential {
                realm,
                username,
                nonce,
                uri,
                response,
                algorithm,
                cnonce,
                opaque,
                qop,
                nc,
            }) => {
                write!(f, "Digest ")?;
                let first = &mut true;
                quoted(f, "username", username, first)?;
                quoted(f, "realm", realm, first)?;
                quoted(f, "nonce", nonce, first)?;
                quoted(f, "uri", uri, first)?;
                quoted(f, "response", response, first)?;
                unquoted(f, "algorithm", algorithm, first)?;
                quoted(f, "cnonce", cnonce, first)?;
                unquoted(f, "qop", qop, first)?;
                unquoted(f, "nc", nc, first)?;
                quoted(f, "opaque", opaque, first)?;

                Ok(())
            }
            Credential::Other { scheme, param } => {
                write!(f, "{scheme} ")?;
                let mut first = true;
                for p in param.iter() {
                    let sep = if first { "" } else { ", " };
                    first = false;
                    match &p.value {
                        Some(value) => write!(f, "{sep}{}={}", p.name, value)?,
                        None => write!(f, "{sep}{}", p.name)?,
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_display() {
        let challenge = Challenge::Digest(DigestChallenge {
            realm: Some("atlanta.com".into()),
            nonce: Some("84a4cc6f3082121f32b42a2187831a9e".into()),
            algorithm: Some("MD5".into()),
            ..Default::default()
        });

        assert_eq!(
            challenge.to_string(),
            "Digest realm=\"atlanta.com\", nonce=\"84a4cc6f3082121f32b42a2187831a9e\", algorithm=MD5"
        );
    }

    #[test]
    fn test_credential_display() {
        let credential = Credential::Digest(DigestCredential {
            username: Some("alice".into()),
            realm: Some("atlanta.com".into()),
            nonce: Some("84a4cc6f3082121f32b42a2187831a9e".into()),
            uri: Some("sip:atlanta.com".into()),
            response: Some("7587245234b3434cc3412213e5f113a5432".into()),
            ..Default::default()
        });

        assert_eq!(
            credential.to_string(),
            "Digest username=\"alice\", realm=\"atlanta.com\", \
             nonce=\"84a4cc6f3082121f32b42a2187831a9e\", uri=\"sip:atlanta.com\", \
             response=\"7587245234b3434cc3412213e5f113a5432\""
        );
    }
}
