use crate::{
    cli::actions::Action,
    collectors::{COLLECTOR_NAMES, all_factories},
    database::TargetConfig,
};
use anyhow::{Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use std::time::Duration;
use tracing::info;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    // Get the port or return an error
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .ok_or_else(|| anyhow!("Port is required. Please provide it using the --port flag."))?;

    // Get the listen address (None means auto-detect)
    let listen = matches.get_one::<String>("listen").map(ToString::to_string);

    let target = target_config(matches)?;

    info!(
        host = %target.host,
        port = target.port,
        database = %target.database,
        user = %target.user,
        tls = ?target.tls_mode(),
        "target configured"
    );

    Ok(Action::Run {
        port,
        listen,
        target,
        collectors: get_enabled_collectors(matches),
    })
}

fn required<'a>(matches: &'a ArgMatches, id: &str, flag: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(id)
        .ok_or_else(|| anyhow!("{id} is required. Please provide it using the --{flag} flag."))
}

fn target_config(matches: &ArgMatches) -> Result<TargetConfig> {
    let host = required(matches, "host", "host")?.clone();
    let user = required(matches, "user", "user")?.clone();
    let password = SecretString::from(required(matches, "password", "password")?.as_str());
    let database = required(matches, "database", "database")?.clone();

    let port = matches
        .get_one::<u16>("db-port")
        .copied()
        .ok_or_else(|| anyhow!("db-port is required. Please provide it using the --db-port flag."))?;

    let encrypt = matches.get_one::<bool>("encrypt").copied().unwrap_or(true);
    let trust_server_certificate = matches
        .get_one::<bool>("trust-server-certificate")
        .copied()
        .unwrap_or(true);

    let connect_timeout = matches
        .get_one::<u64>("connect-timeout")
        .copied()
        .map_or(Duration::from_secs(5), Duration::from_secs);

    if host.trim().is_empty() {
        return Err(anyhow!("host must not be empty"));
    }

    if user.trim().is_empty() {
        return Err(anyhow!("user must not be empty"));
    }

    Ok(TargetConfig {
        host,
        port,
        user,
        password,
        database,
        encrypt,
        trust_server_certificate,
        connect_timeout,
    })
}

pub fn get_enabled_collectors(matches: &ArgMatches) -> Vec<String> {
    let factories = all_factories();

    COLLECTOR_NAMES
        .iter()
        .filter(|&name| {
            let enable_flag = format!("collector.{name}");
            let disable_flag = format!("no-collector.{name}");

            // If explicitly disabled, skip it
            if matches.get_flag(&disable_flag) {
                return false;
            }

            // If explicitly enabled, include it
            if matches.get_flag(&enable_flag) {
                return true;
            }

            // Otherwise, check the collector's default setting
            factories
                .get(name)
                .is_some_and(|factory| factory().enabled_by_default())
        })
        .map(|&name| name.to_string())
        .collect()
}
