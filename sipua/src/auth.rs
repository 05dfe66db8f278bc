//! Digest access authentication.
//!
//! Turns a challenge from a `401`/`407` response into the credentials for
//! the retried request. Only the `MD5` algorithm is supported; `auth-int`
//! protection is not.

use rand::distr::{Alphanumeric, SampleString};

use crate::error::{Error, Result};
use crate::message::auth::{Challenge, DigestChallenge, DigestCredential};
use crate::message::SipMethod;

/// Account credentials used to answer digest challenges.
///
/// Either a plain `password` or a precomputed `ha1`
/// (`md5(user:realm:password)`) must be present.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// The authentication user name.
    pub username: String,
    /// The plain text password.
    pub password: Option<String>,
    /// Precomputed `ha1`, used instead of the password when set.
    pub ha1: Option<String>,
    /// The realm these credentials belong to, when pinned.
    pub realm: Option<String>,
}

impl Credentials {
    /// Creates credentials from a user name and plain password.
    pub fn new(username: &str, password: &str) -> Self {
        Credentials {
            username: username.into(),
            password: Some(password.into()),
            ha1: None,
            realm: None,
        }
    }

    fn ha1(&self, realm: &str) -> String {
        match &self.ha1 {
            Some(ha1) => ha1.clone(),
            None => {
                let password = self.password.as_deref().unwrap_or("");
                md5_hex(&format!("{}:{}:{}", self.username, realm, password))
            }
        }
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Computes the `Authorization` credential answering `challenge` for the
/// given request method and Request-URI.
///
/// With `qop="auth"` in the challenge a fresh `cnonce` is generated and
/// `nc` starts at 1; without qop the original RFC 2069 computation is
/// used.
pub fn digest_credential(
    challenge: &Challenge,
    credentials: &Credentials,
    method: &SipMethod,
    uri: &str,
) -> Result<DigestCredential> {
    let Challenge::Digest(digest) = challenge else {
        return Err(Error::Auth("Unsupported authentication scheme".into()));
    };

    digest_with_cnonce(digest, credentials, method, uri, None, 1)
}

pub(crate) fn digest_with_cnonce(
    digest: &DigestChallenge,
    credentials: &Credentials,
    method: &SipMethod,
    uri: &str,
    cnonce: Option<&str>,
    nc: u32,
) -> Result<DigestCredential> {
    if let Some(algorithm) = digest.algorithm.as_deref() {
        if !algorithm.eq_ignore_ascii_case("MD5") {
            return Err(Error::Auth(format!("Unsupported digest algorithm '{algorithm}'")));
        }
    }

    let realm = digest.realm.as_deref().unwrap_or("");
    let nonce = digest
        .nonce
        .as_deref()
        .ok_or_else(|| Error::Auth("Challenge without nonce".into()))?;

    let qop = match digest.qop.as_deref() {
        None => None,
        Some(qop) if qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")) => Some("auth"),
        Some(qop) => {
            return Err(Error::Auth(format!("Unsupported qop '{qop}'")));
        }
    };

    let ha1 = credentials.ha1(realm);
    let ha2 = md5_hex(&format!("{}:{}", method, uri));

    let mut credential = DigestCredential {
        username: Some(credentials.username.as_str().into()),
        realm: Some(realm.into()),
        nonce: Some(nonce.into()),
        uri: Some(uri.into()),
        algorithm: Some("MD5".into()),
        opaque: digest.opaque.clone(),
        ..Default::default()
    };

    let response = match qop {
        Some(qop) => {
            let cnonce = match cnonce {
                Some(cnonce) => cnonce.to_string(),
                None => Alphanumeric.sample_string(&mut rand::rng(), 12),
            };
            let nc = format!("{:08}", nc);
            let response = md5_hex(&format!("{}:{}:{}:{}:{}:{}", ha1, nonce, nc, cnonce, qop, ha2));

            credential.qop = Some(qop.into());
            credential.cnonce = Some(cnonce.as_str().into());
            credential.nc = Some(nc.as_str().into());
            response
        }
        None => md5_hex(&format!("{}:{}:{}", ha1, nonce, ha2)),
    };

    credential.response = Some(response.as_str().into());

    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(qop: Option<&str>) -> DigestChallenge {
        DigestChallenge {
            realm: Some("testrealm@host.com".into()),
            nonce: Some("dcd98b7102dd2f0e8b11d0f600bfb0c093".into()),
            qop: qop.map(Into::into),
            ..Default::default()
        }
    }

    #[test]
    fn test_rfc2069_response() {
        let credentials = Credentials::new("Mufasa", "Circle Of Life");
        let digest = challenge(None);

        let credential =
            digest_with_cnonce(&digest, &credentials, &SipMethod::Register, "sip:host.com", None, 1).unwrap();

        // md5(ha1:nonce:ha2) with
        // ha1 = md5("Mufasa:testrealm@host.com:Circle Of Life")
        let ha1 = md5_hex("Mufasa:testrealm@host.com:Circle Of Life");
        let ha2 = md5_hex("REGISTER:sip:host.com");
        let expected = md5_hex(&format!("{ha1}:dcd98b7102dd2f0e8b11d0f600bfb0c093:{ha2}"));

        assert_eq!(credential.response.as_deref(), Some(expected.as_str()));
        assert_eq!(credential.qop, None);
        assert_eq!(credential.cnonce, None);
    }

    #[test]
    fn test_qop_auth_response() {
        let credentials = Credentials::new("Mufasa", "Circle Of Life");
        let digest = challenge(Some("auth"));

        let credential = digest_with_cnonce(
            &digest,
            &credentials,
            &SipMethod::Register,
            "sip:host.com",
            Some("0a4f113b"),
            1,
        )
        .unwrap();

        let ha1 = md5_hex("Mufasa:testrealm@host.com:Circle Of Life");
        let ha2 = md5_hex("REGISTER:sip:host.com");
        let expected = md5_hex(&format!(
            "{ha1}:dcd98b7102dd2f0e8b11d0f600bfb0c093:00000001:0a4f113b:auth:{ha2}"
        ));

        assert_eq!(credential.response.as_deref(), Some(expected.as_str()));
        assert_eq!(credential.qop.as_deref(), Some("auth"));
        assert_eq!(credential.nc.as_deref(), Some("00000001"));
    }

    #[test]
    fn test_unsupported_algorithm() {
        let credentials = Credentials::new("Mufasa", "Circle Of Life");
        let digest = DigestChallenge {
            algorithm: Some("SHA-512".into()),
            ..challenge(None)
        };

        let result = digest_with_cnonce(&digest, &credentials, &SipMethod::Register, "sip:host.com", None, 1);

        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn test_auth_int_only_is_rejected() {
        let credentials = Credentials::new("Mufasa", "Circle Of Life");
        let digest = challenge(Some("auth-int"));

        let result = digest_with_cnonce(&digest, &credentials, &SipMethod::Register, "sip:host.com", None, 1);

        assert!(matches!(result, Err(Error::Auth(_))));
    }
}
