//! User agent configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::message::{Scheme, Uri};
use crate::transport::Socket;

/// Registrations shorter than this are refused up front.
const MIN_REGISTER_EXPIRES: u32 = 10;

/// Configuration of a [`crate::ua::UserAgent`].
///
/// Only `uri` and `sockets` are mandatory; everything else has a
/// sensible default. Validation runs once at construction and a bad
/// value fails `UserAgent::new` synchronously.
#[derive(Clone)]
pub struct Config {
    /// The address of record this agent registers and receives calls as.
    pub uri: Uri,
    /// Authentication user name, when different from the AOR user.
    pub authorization_user: Option<String>,
    /// Plain text password for digest authentication.
    pub password: Option<String>,
    /// Precomputed `md5(user:realm:password)`, used instead of `password`.
    pub ha1: Option<String>,
    /// The realm `ha1` was computed for.
    pub realm: Option<String>,
    /// Display name placed in outgoing `From` headers.
    pub display_name: Option<String>,
    /// Whether to register on startup.
    pub register: bool,
    /// Requested registration lifetime in seconds.
    pub register_expires: u32,
    /// The registrar uri; defaults to the AOR host.
    pub registrar_server: Option<Uri>,
    /// A fixed contact uri; defaults to a generated one.
    pub contact_uri: Option<Uri>,
    /// The `+sip.instance` value advertised in Contact headers.
    pub instance_id: Option<String>,
    /// How long an incoming call may ring before it is answered.
    pub no_answer_timeout: Duration,
    /// Shortest pause between reconnection attempts.
    pub connection_recovery_min_interval: Duration,
    /// Longest pause between reconnection attempts.
    pub connection_recovery_max_interval: Duration,
    /// The sockets to reach the peer through, in order of preference.
    pub sockets: Vec<Arc<dyn Socket>>,
    /// Whether RFC 4028 session timers are advertised.
    pub session_timers_enabled: bool,
    /// Whether an answer whose audio media port is zero ends the session.
    pub terminate_on_audio_media_port_zero: bool,
    /// The product token sent in `User-Agent`.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            uri: Uri::default(),
            authorization_user: None,
            password: None,
            ha1: None,
            realm: None,
            display_name: None,
            register: true,
            register_expires: 600,
            registrar_server: None,
            contact_uri: None,
            instance_id: None,
            no_answer_timeout: Duration::from_secs(60),
            connection_recovery_min_interval: Duration::from_secs(2),
            connection_recovery_max_interval: Duration::from_secs(30),
            sockets: Vec::new(),
            session_timers_enabled: true,
            terminate_on_audio_media_port_zero: true,
            user_agent: concat!("sipua/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.sockets.is_empty() {
            return Err(Error::Configuration("At least one socket is required".into()));
        }
        if self.uri.username().is_none() {
            return Err(Error::Configuration("The uri must carry a user part".into()));
        }
        if matches!(self.uri.scheme, Scheme::Tel) {
            return Err(Error::Configuration("The uri must be a sip or sips uri".into()));
        }
        if self.register_expires < MIN_REGISTER_EXPIRES {
            return Err(Error::Configuration(format!(
                "register_expires must be at least {MIN_REGISTER_EXPIRES} seconds"
            )));
        }
        if self.connection_recovery_min_interval > self.connection_recovery_max_interval {
            return Err(Error::Configuration(
                "connection_recovery_min_interval exceeds the maximum".into(),
            ));
        }
        if self.ha1.is_some() && self.realm.is_none() {
            return Err(Error::Configuration("ha1 requires the matching realm".into()));
        }
        if let Some(registrar) = &self.registrar_server {
            if registrar.username().is_some() {
                return Err(Error::Configuration(
                    "registrar_server must not carry a user part".into(),
                ));
            }
        }

        Ok(())
    }

    /// The user name presented in digest authentication.
    pub(crate) fn auth_username(&self) -> &str {
        match &self.authorization_user {
            Some(user) => user,
            None => self.uri.username().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockSocket;

    fn valid() -> Config {
        Config {
            uri: "sip:alice@example.com".parse().unwrap(),
            sockets: vec![MockSocket::new()],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_socket() {
        let config = Config {
            sockets: vec![],
            ..valid()
        };

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_uri_without_user() {
        let config = Config {
            uri: "sip:example.com".parse().unwrap(),
            ..valid()
        };

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_ha1_without_realm() {
        let config = Config {
            ha1: Some("f84f1cec41e6cbe5aea9c8e88d359".into()),
            ..valid()
        };

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }
}
