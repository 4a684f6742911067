use anyhow::Result;
use pgscrape_exporter::{
    cli::{actions::Action, commands, dispatch::handler},
    database::TlsMode,
};
use secrecy::ExposeSecret;
use std::time::Duration;

const ENV_VARS: [&str; 10] = [
    "PGSCRAPE_PORT",
    "PGSCRAPE_LISTEN",
    "PGSCRAPE_HOST",
    "PGSCRAPE_DB_PORT",
    "PGSCRAPE_USER",
    "PGSCRAPE_PASSWORD",
    "PGSCRAPE_DATABASE",
    "PGSCRAPE_ENCRYPT",
    "PGSCRAPE_TRUST_SERVER_CERTIFICATE",
    "PGSCRAPE_CONNECT_TIMEOUT",
];

#[test]
fn test_handler_builds_target() -> Result<()> {
    temp_env::with_vars_unset(ENV_VARS, || -> Result<()> {
        let matches = commands::new().get_matches_from([
            "pgscrape_exporter",
            "--port",
            "9898",
            "--host",
            "db.internal",
            "--db-port",
            "6432",
            "--user",
            "monitor",
            "--password",
            "s3cret",
            "--database",
            "app",
            "--trust-server-certificate",
            "false",
            "--connect-timeout",
            "3",
        ]);

        let Action::Run {
            port,
            listen,
            target,
            collectors,
        } = handler(&matches)?;

        assert_eq!(port, 9898);
        assert!(listen.is_none());
        assert_eq!(target.host, "db.internal");
        assert_eq!(target.port, 6432);
        assert_eq!(target.user, "monitor");
        assert_eq!(target.password.expose_secret(), "s3cret");
        assert_eq!(target.database, "app");
        assert_eq!(target.connect_timeout, Duration::from_secs(3));
        assert_eq!(target.tls_mode(), TlsMode::Verified);
        assert!(!format!("{target:?}").contains("s3cret"));

        assert!(collectors.contains(&"version".to_string()));
        assert!(!collectors.contains(&"tables".to_string()));

        Ok(())
    })
}

#[test]
fn test_handler_reads_environment() -> Result<()> {
    temp_env::with_vars_unset(ENV_VARS, || {
        temp_env::with_vars(
            [
                ("PGSCRAPE_USER", Some("env_user")),
                ("PGSCRAPE_PASSWORD", Some("env_pass")),
                ("PGSCRAPE_ENCRYPT", Some("off")),
                ("PGSCRAPE_LISTEN", Some("::1")),
            ],
            || -> Result<()> {
                let matches = commands::new().get_matches_from(["pgscrape_exporter"]);

                let Action::Run { listen, target, .. } = handler(&matches)?;

                assert_eq!(listen.as_deref(), Some("::1"));
                assert_eq!(target.user, "env_user");
                assert_eq!(target.password.expose_secret(), "env_pass");
                assert_eq!(target.host, "localhost");
                assert_eq!(target.port, 5432);
                assert_eq!(target.tls_mode(), TlsMode::Disabled);

                Ok(())
            },
        )
    })
}

#[test]
fn test_handler_collector_flags() -> Result<()> {
    temp_env::with_vars_unset(ENV_VARS, || -> Result<()> {
        let matches = commands::new().get_matches_from([
            "pgscrape_exporter",
            "--user",
            "monitor",
            "--password",
            "secret",
            "--collector.tables",
            "--no-collector.connections",
        ]);

        let Action::Run { collectors, .. } = handler(&matches)?;

        assert_eq!(
            collectors,
            vec!["version", "database", "database_size", "tables"]
        );

        Ok(())
    })
}
