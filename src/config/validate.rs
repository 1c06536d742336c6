use anyhow::anyhow;

use crate::tls::builder;

use super::Config;

/// given a Config struct, validate the values to ensure
/// the server won't start in a state it cannot serve from
pub fn check_config(config: &Config) -> Result<(), anyhow::Error> {
    if config.listen.is_empty() {
        return Err(anyhow!("listen address cannot be empty"));
    }

    // A TLS terminator with nothing to present cannot serve anything
    if config.certificates.is_empty() {
        return Err(anyhow!("at least one certificate record is required"));
    }

    // Validate the record format up-front so a typo is reported before any
    // file is touched
    let mut hostnames = Vec::with_capacity(config.certificates.len());
    for (index, record) in config.certificates.iter().enumerate() {
        let record = builder::parse_record(record)
            .map_err(|err| anyhow!("certificates[{index}]: {err}"))?;
        hostnames.push(record.hostname);
    }

    if let Some(default_hostname) = &config.default_hostname {
        if !hostnames.iter().any(|h| h == default_hostname) {
            return Err(anyhow!(
                "default_hostname {default_hostname:?} does not match any certificate record"
            ));
        }
    }

    Ok(())
}
