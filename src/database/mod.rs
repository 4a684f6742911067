//! Database sessions used by the collection cycle.
//!
//! The orchestrator only sees the [`Connector`] and [`Session`] traits, so it
//! can be driven by `PostgreSQL` in production and by in-memory fakes in tests.
//! A `Connector` hands out one freshly authenticated session per `open()`;
//! there is no pooling across scrapes.

use crate::collectors::error::ConnectError;
use secrecy::SecretString;
use std::{future::Future, time::Duration};

pub mod postgres;
pub mod row;

pub use postgres::{PgConnector, PgSession};
pub use row::{Row, Value};

/// Boxed error returned by drivers; kept opaque so any driver fits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Opens database sessions.
pub trait Connector: Clone + Send + Sync + 'static {
    type Session: Session;

    /// Open one new session. No retry is performed.
    fn open(&self) -> impl Future<Output = Result<Self::Session, ConnectError>> + Send;
}

/// A single live session. `&mut self` keeps one query in flight at a time.
pub trait Session: Send + 'static {
    /// Run `sql` and return every row it produced.
    ///
    /// `limit` must also bound the statement on the server: once it passes,
    /// the session has to be usable for the next query even if the caller
    /// already gave up on this one.
    fn query(
        &mut self,
        sql: &str,
        limit: Duration,
    ) -> impl Future<Output = Result<Vec<Row>, BoxError>> + Send;

    /// Close the session. Errors are logged by the implementation, not returned.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Static connection settings, validated once at startup.
#[derive(Clone, Debug)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub database: String,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
    pub connect_timeout: Duration,
}

/// How the transport toggles map onto a TLS mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsMode {
    Disabled,
    /// Encrypted, server certificate not verified.
    Unverified,
    /// Encrypted, certificate chain and hostname verified.
    Verified,
}

impl TargetConfig {
    pub const fn tls_mode(&self) -> TlsMode {
        match (self.encrypt, self.trust_server_certificate) {
            (false, _) => TlsMode::Disabled,
            (true, true) => TlsMode::Unverified,
            (true, false) => TlsMode::Verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(encrypt: bool, trust: bool) -> TargetConfig {
        TargetConfig {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: SecretString::from("secret"),
            database: "postgres".to_string(),
            encrypt,
            trust_server_certificate: trust,
            connect_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_tls_mode_mapping() {
        assert_eq!(config(false, true).tls_mode(), TlsMode::Disabled);
        assert_eq!(config(false, false).tls_mode(), TlsMode::Disabled);
        assert_eq!(config(true, true).tls_mode(), TlsMode::Unverified);
        assert_eq!(config(true, false).tls_mode(), TlsMode::Verified);
    }

    #[test]
    fn test_debug_does_not_leak_password() {
        let rendered = format!("{:?}", config(true, true));
        assert!(!rendered.contains("secret"));
    }
}
