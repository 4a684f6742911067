use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::{
        BoolishValueParser,
        styling::{AnsiColor, Effects, Styles},
    },
};

mod collectors;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let cmd = Command::new("pgscrape_exporter")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(built_info::GIT_COMMIT_HASH.unwrap_or(env!("CARGO_PKG_VERSION")))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("9188")
                .env("PGSCRAPE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("listen")
                .long("listen")
                .help("IP address to bind to (default: [::], falling back to 0.0.0.0)")
                .env("PGSCRAPE_LISTEN")
                .value_name("IP"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .help("PostgreSQL server address")
                .default_value("localhost")
                .env("PGSCRAPE_HOST"),
        )
        .arg(
            Arg::new("db-port")
                .long("db-port")
                .help("PostgreSQL server port")
                .default_value("5432")
                .env("PGSCRAPE_DB_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .help("User to connect as")
                .env("PGSCRAPE_USER")
                .required(true),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .help("Password for --user")
                .env("PGSCRAPE_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("database")
                .long("database")
                .help("Database to connect to")
                .default_value("postgres")
                .env("PGSCRAPE_DATABASE"),
        )
        .arg(
            Arg::new("encrypt")
                .long("encrypt")
                .help("Encrypt the connection with TLS")
                .default_value("true")
                .env("PGSCRAPE_ENCRYPT")
                .value_name("BOOL")
                .action(ArgAction::Set)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new("trust-server-certificate")
                .long("trust-server-certificate")
                .help("Accept the server certificate without verifying it (only with --encrypt)")
                .default_value("true")
                .env("PGSCRAPE_TRUST_SERVER_CERTIFICATE")
                .value_name("BOOL")
                .action(ArgAction::Set)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new("connect-timeout")
                .long("connect-timeout")
                .help("Seconds to wait for a database session to open")
                .default_value("5")
                .env("PGSCRAPE_CONNECT_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity, -vv for debug")
                .action(ArgAction::Count),
        );

    collectors::add_collectors_args(cmd)
}
