use std::borrow::Cow;

use clap::{Args, Parser, ValueEnum};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment, Provider,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::level_filters::LevelFilter;

mod validate;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Trace,
}

/// Transforms our custom `LogLevel` enum into a `tracing::level_filters::LevelFilter`
/// enum used by the `tracing` crate.
impl From<&LogLevel> for LevelFilter {
    fn from(val: &LogLevel) -> Self {
        match val {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Serialize, Deserialize, Clone, Args)]
#[group(id = "logging")]
pub struct Logging {
    /// If logging is enabled at all. Setting this to `false` will disable all logging output.
    #[arg(
        long = "log.enabled",
        required = false,
        value_parser,
        default_value = "true",
        id = "log.enabled"
    )]
    pub enabled: bool,

    /// The level of logging to be used.
    #[serde(deserialize_with = "log_level_deser")]
    #[arg(
        long = "log.level",
        required = false,
        value_enum,
        default_value = "info"
    )]
    pub level: LogLevel,

    /// The format of the log output
    #[serde(deserialize_with = "log_format_deser")]
    #[arg(
        long = "log.format",
        required = false,
        value_enum,
        default_value = "pretty"
    )]
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Info,
            format: LogFormat::Pretty,
        }
    }
}

/// The main configuration: where to listen and which certificate to present
/// for which hostname.
///
/// Certificate records use the `hostname,chain-file,key-file` format, one
/// record per hostname; only the first two commas delimit, so a key path may
/// itself contain commas. Example:
///
/// ```yaml
/// listen: "0.0.0.0:8443"
/// default_hostname: "example.com"
///
/// certificates:
///   - "example.com,/etc/snigate/example.com.chain.pem,/etc/snigate/example.com.key.pem"
///   - "internal.example.com,/etc/snigate/internal.pem,/etc/snigate/internal.pkcs8"
/// ```
#[derive(Debug, Serialize, Deserialize, Parser)]
#[command(name = "Snigate")]
#[command(version, about, long_about = None)]
pub(crate) struct Config {
    /// The name of the service (will appear as a log property)
    #[serde(default)]
    #[clap(short, long, default_value = "snigate")]
    pub service_name: Cow<'static, str>,

    /// The PATH to the configuration file to be used.
    ///
    /// The configuration file should be named `snigate.yaml`
    /// and be present in that path.
    #[clap(long, required = false)]
    #[allow(clippy::struct_field_names)]
    pub config_path: Option<Cow<'static, str>>,

    /// The address the TLS listener binds to.
    #[clap(short, long, default_value = "0.0.0.0:443")]
    pub listen: Cow<'static, str>,

    /// Certificate records, `hostname,chain-file,key-file`, repeatable.
    #[clap(short = 'c', long = "cert", id = "cert")]
    pub certificates: Vec<String>,

    /// The hostname whose certificate is presented when a client sends no
    /// SNI (or an unknown one, unless `strict_sni` is set). Defaults to the
    /// hostname of the first certificate record.
    #[clap(long, required = false)]
    pub default_hostname: Option<String>,

    /// Abort the handshake for SNI hostnames without a configured
    /// certificate instead of falling back to the default one.
    #[clap(long, default_value = "false")]
    pub strict_sni: bool,

    #[command(flatten)]
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            service_name: Cow::Borrowed("snigate"),
            config_path: Some(Cow::Borrowed("/etc/snigate/config")),
            listen: Cow::Borrowed("0.0.0.0:443"),
            certificates: vec![],
            default_hostname: None,
            strict_sni: false,
            logging: Logging::default(),
        }
    }
}

/// Implement the `Provider` trait for the `Config` struct.
/// This allows the `Config` struct to be used as a configuration provider with *defaults*.
impl Provider for Config {
    fn metadata(&self) -> figment::Metadata {
        figment::Metadata::named("snigate")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        Serialized::defaults(Config::default()).data()
    }
}

/// Load the configuration from the configuration file(s) as a `Config` struct.
///
/// Nested keys can be separated by double underscores (__) in the
/// environment variables. E.g. `SNIGATE_LOGGING__LEVEL=DEBUG` will set the
/// `level` key in the `logging` key.
pub fn load(fallback: &str) -> Result<Config, figment::Error> {
    let parsed_commands = Config::parse();

    let path_with_fallback = match &parsed_commands.config_path {
        Some(path) => path.as_ref(),
        None => fallback,
    };

    load_from_path(path_with_fallback, &parsed_commands)
}

/// Test-friendly version of load that doesn't parse command line arguments
#[cfg(test)]
pub(crate) fn load_for_test(fallback: &str) -> Result<Config, figment::Error> {
    load_from_path(fallback, &Config::default())
}

/// Load configuration from a specific path, used for testing and internal logic
pub(crate) fn load_from_path(
    config_path: &str,
    parsed_commands: &Config,
) -> Result<Config, figment::Error> {
    let mut figment = Figment::new()
        .merge(Config::default())
        .merge(Serialized::defaults(parsed_commands));

    if std::path::Path::new(config_path).is_file() {
        figment = figment.merge(Yaml::file(config_path));
    } else {
        figment = figment
            .merge(Yaml::file(format!("{config_path}/snigate.yml")))
            .merge(Yaml::file(format!("{config_path}/snigate.yaml")));
    }

    let config: Config = figment
        .merge(Env::prefixed("SNIGATE_").split("__"))
        .extract()?;

    // validate configuration and throw error upwards
    validate::check_config(&config).map_err(|err| figment::Error::from(err.to_string()))?;

    Ok(config)
}

/// Deserialize function to convert a string to a `LogLevel` Enum
fn log_level_deser<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.to_lowercase().as_str() {
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        "trace" => Ok(LogLevel::Trace),
        _ => Err(serde::de::Error::custom(
            "expected one of DEBUG, INFO, WARN, ERROR, TRACE",
        )),
    }
}

/// Deserialize function to convert a string to a `LogFormat` Enum
fn log_format_deser<'de, D>(deserializer: D) -> Result<LogFormat, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.to_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "pretty" => Ok(LogFormat::Pretty),
        _ => Err(serde::de::Error::custom("expected one of: json, pretty")),
    }
}
