use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::stores::CertificateStore;

mod config;
mod server;
mod stores;
mod tls;

fn main() -> Result<(), anyhow::Error> {
    // Loads configuration from command-line, YAML or environment sources
    let proxy_config = config::load("/etc/snigate/configs")?;

    // Creates a tracing/logging subscriber based on the configuration
    // provided. RUST_LOG-style directives still win, so individual modules
    // can be raised or silenced without touching the config file.
    if proxy_config.logging.enabled {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                tracing::level_filters::LevelFilter::from(&proxy_config.logging.level).to_string(),
            )
        });
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
        match proxy_config.logging.format {
            config::LogFormat::Json => subscriber.json().init(),
            config::LogFormat::Pretty => subscriber.compact().init(),
        }
    }

    // Populating phase: every record must build or the server does not start
    let mut store = CertificateStore::new();
    let mut first_hostname: Option<String> = None;
    for record in &proxy_config.certificates {
        let entry = tls::builder::build_certificate(record)
            .with_context(|| format!("certificate bootstrap failed for record {record:?}"))?;
        first_hostname.get_or_insert_with(|| entry.hostname.clone());
        info!("loaded certificate for {}", entry.hostname);
        store.insert(entry);
    }

    // The acceptor presents the default identity to clients without SNI
    let default_hostname = proxy_config
        .default_hostname
        .clone()
        .or(first_hostname)
        .context("no certificates configured")?;
    let default_record = tls::builder::effective_record(&proxy_config.certificates, &default_hostname)
        .with_context(|| format!("no certificate record for default hostname {default_hostname}"))?;

    let acceptor = tls::acceptor::build_acceptor(&default_record, proxy_config.strict_sni)?;

    info!(
        "serving {} certificate(s), default identity {default_hostname}",
        store.len()
    );

    // Serving phase: the store is published read-only from here on
    stores::activate(store);

    server::Server::new(acceptor, &proxy_config.listen).run()
}
