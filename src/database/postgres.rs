//! `PostgreSQL` implementation of [`Connector`] and [`Session`] on top of `sqlx`.

use super::{BoxError, Connector, Row, Session, TargetConfig, TlsMode};
use crate::collectors::error::ConnectError;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{ConnectOptions, Connection};
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{debug, info_span};
use tracing_futures::Instrument as _;

/// Opens one `PgConnection` per call; nothing is pooled.
#[derive(Clone)]
pub struct PgConnector {
    options: Arc<PgConnectOptions>,
    target: Arc<str>,
    tls: TlsMode,
    user: Arc<str>,
    connect_timeout: Duration,
}

impl PgConnector {
    pub fn new(config: &TargetConfig) -> Self {
        let tls = config.tls_mode();

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password.expose_secret())
            .database(&config.database)
            .ssl_mode(ssl_mode(tls))
            .application_name(env!("CARGO_PKG_NAME"))
            .disable_statement_logging();

        Self {
            options: Arc::new(options),
            target: Arc::from(format!("{}:{}/{}", config.host, config.port, config.database)),
            tls,
            user: Arc::from(config.user.as_str()),
            connect_timeout: config.connect_timeout,
        }
    }

    /// `host:port/database`, used in logs and errors.
    pub fn target(&self) -> &str {
        &self.target
    }
}

const fn ssl_mode(tls: TlsMode) -> PgSslMode {
    match tls {
        TlsMode::Disabled => PgSslMode::Disable,
        TlsMode::Unverified => PgSslMode::Require,
        TlsMode::Verified => PgSslMode::VerifyFull,
    }
}

impl Connector for PgConnector {
    type Session = PgSession;

    async fn open(&self) -> Result<PgSession, ConnectError> {
        debug!(
            target_db = %self.target,
            user = %self.user,
            tls = ?self.tls,
            timeout_ms = u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX),
            "opening database session"
        );

        let span = info_span!(
            "db.connect",
            otel.kind = "client",
            db.system = "postgresql",
            server.address = %self.target,
        );

        let mut conn = match timeout(
            self.connect_timeout,
            PgConnection::connect_with(&self.options),
        )
        .instrument(span)
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => return Err(ConnectError::new(self.target(), err)),
            Err(_) => {
                return Err(ConnectError::new(
                    self.target(),
                    format!("timed out after {:?}", self.connect_timeout),
                ));
            }
        };

        // A session dropped right after the handshake is still a connect failure.
        if let Err(err) = conn.ping().await {
            let _ = conn.close().await;
            return Err(ConnectError::new(self.target(), err));
        }

        Ok(PgSession {
            conn,
            statement_timeout: None,
        })
    }
}

/// Largest `statement_timeout` the server accepts, in milliseconds.
const MAX_STATEMENT_TIMEOUT_MS: u64 = 2_147_483_647;

pub struct PgSession {
    conn: PgConnection,
    // Last value sent with `SET statement_timeout`.
    statement_timeout: Option<Duration>,
}

impl PgSession {
    /// Make the server cancel any statement running longer than `limit`.
    ///
    /// Dropping a query future only stops the client from waiting; the backend
    /// keeps executing and the connection stays busy until it finishes.
    async fn bound_statements(&mut self, limit: Duration) -> Result<(), sqlx::Error> {
        if self.statement_timeout == Some(limit) {
            return Ok(());
        }

        sqlx::query(&statement_timeout_sql(limit))
            .execute(&mut self.conn)
            .await?;
        self.statement_timeout = Some(limit);

        Ok(())
    }
}

fn statement_timeout_sql(limit: Duration) -> String {
    // 0 would disable the timeout altogether.
    let ms = u64::try_from(limit.as_millis())
        .unwrap_or(u64::MAX)
        .clamp(1, MAX_STATEMENT_TIMEOUT_MS);
    format!("SET statement_timeout = {ms}")
}

impl Session for PgSession {
    async fn query(&mut self, sql: &str, limit: Duration) -> Result<Vec<Row>, BoxError> {
        self.bound_statements(limit).await?;

        let span = info_span!(
            "db.query",
            otel.kind = "client",
            db.system = "postgresql",
            db.statement = sql,
        );

        let rows = sqlx::query(sql)
            .fetch_all(&mut self.conn)
            .instrument(span)
            .await?;

        Ok(rows.iter().map(Row::from_pg).collect())
    }

    async fn close(self) {
        if let Err(err) = self.conn.close().await {
            debug!(error = %err, "error while closing database session");
        }
    }
}
