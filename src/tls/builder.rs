use std::fs;

use openssl::{
    error::ErrorStack,
    pkey::PKey,
    ssl::{SslContext, SslContextBuilder, SslFiletype, SslMethod},
};
use tracing::error;

use crate::stores::CertificateEntry;

/// Reasons a certificate record cannot become a TLS server context.
/// Every variant aborts the bootstrap of that hostname; partially loaded
/// state is released when the context builder is dropped.
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("malformed certificate record {record:?}: expected hostname,chain-file,key-file")]
    ConfigFormat { record: String },

    #[error("TLS server context allocation failed")]
    CryptoContext(#[source] ErrorStack),

    #[error("loading certificate chain from {path} failed")]
    CertificateLoad {
        path: String,
        #[source]
        source: ErrorStack,
    },

    #[error("reading private key {path} failed")]
    KeyRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("decoding DER/PKCS#8 private key {path} failed")]
    KeyDecode {
        path: String,
        #[source]
        source: ErrorStack,
    },

    #[error("loading PEM private key {path} failed")]
    KeyLoad {
        path: String,
        #[source]
        source: ErrorStack,
    },
}

/// One `hostname,chain-file,key-file` configuration record, split apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub hostname: String,
    pub chain_path: String,
    pub key_path: String,
}

/// Splits a record on its first two commas only; any further commas belong
/// to the key path. The hostname field must be non-empty.
pub fn parse_record(record: &str) -> Result<CertificateRecord, CertificateError> {
    let mut fields = record.splitn(3, ',');
    let (Some(hostname), Some(chain_path), Some(key_path)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(CertificateError::ConfigFormat {
            record: record.to_string(),
        });
    };

    if hostname.is_empty() {
        return Err(CertificateError::ConfigFormat {
            record: record.to_string(),
        });
    }

    Ok(CertificateRecord {
        hostname: hostname.to_string(),
        chain_path: chain_path.to_string(),
        key_path: key_path.to_string(),
    })
}

/// Loads the chain and private key named by `record` into `ctx`.
///
/// A key path containing `.pkcs8` anywhere selects binary DER/PKCS#8
/// decoding; everything else goes through the PEM loading path. Dispatch
/// is by filename only; file contents are never inspected.
pub(crate) fn apply_identity(
    ctx: &mut SslContextBuilder,
    record: &CertificateRecord,
) -> Result<(), CertificateError> {
    ctx.set_certificate_chain_file(&record.chain_path)
        .map_err(|source| {
            error!(
                "loading certificate chain from {} failed for {}",
                record.chain_path, record.hostname
            );
            CertificateError::CertificateLoad {
                path: record.chain_path.clone(),
                source,
            }
        })?;

    if record.key_path.contains(".pkcs8") {
        let der = fs::read(&record.key_path).map_err(|source| {
            error!("opening private key {} failed", record.key_path);
            CertificateError::KeyRead {
                path: record.key_path.clone(),
                source,
            }
        })?;

        let key = PKey::private_key_from_pkcs8(&der).map_err(|source| {
            error!("decoding private key from {} failed", record.key_path);
            CertificateError::KeyDecode {
                path: record.key_path.clone(),
                source,
            }
        })?;

        ctx.set_private_key(&key).map_err(|source| {
            error!("binding private key {} failed", record.key_path);
            CertificateError::KeyDecode {
                path: record.key_path.clone(),
                source,
            }
        })?;
    } else {
        ctx.set_private_key_file(&record.key_path, SslFiletype::PEM)
            .map_err(|source| {
                error!("loading PEM private key {} failed", record.key_path);
                CertificateError::KeyLoad {
                    path: record.key_path.clone(),
                    source,
                }
            })?;
    }

    Ok(())
}

/// The record that ends up backing `hostname` once every record is loaded.
/// Duplicate hostnames follow the store's replacement rule (last write
/// wins), so the last matching record is the one in effect.
pub fn effective_record(records: &[String], hostname: &str) -> Option<CertificateRecord> {
    records
        .iter()
        .filter_map(|record| parse_record(record).ok())
        .filter(|record| record.hostname == hostname)
        .last()
}

/// Builds one TLS server context from a configuration record and binds it
/// to the record's hostname.
///
/// The context uses the version-flexible server method, so the highest
/// protocol version both sides support is negotiated.
pub fn build_certificate(record: &str) -> Result<CertificateEntry, CertificateError> {
    let record = parse_record(record)?;

    let mut ctx = SslContext::builder(SslMethod::tls_server()).map_err(|source| {
        error!(
            "TLS server context allocation failed for {}",
            record.hostname
        );
        CertificateError::CryptoContext(source)
    })?;

    apply_identity(&mut ctx, &record)?;

    Ok(CertificateEntry {
        hostname: record.hostname,
        context: ctx.build(),
    })
}
