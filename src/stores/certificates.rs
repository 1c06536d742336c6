use std::collections::{hash_map::Entry, HashMap};

use openssl::ssl::SslContext;
use tracing::warn;

/// A hostname bound to its fully configured TLS server context.
///
/// The context already carries the certificate chain and private key; a
/// half-built entry cannot exist because the builder returns an error
/// instead of a value.
#[derive(Debug)]
pub struct CertificateEntry {
    pub hostname: String,
    pub context: SslContext,
}

/// Exact-match index from SNI hostname to TLS server context.
///
/// Populated once during bootstrap and then published read-only for the
/// serving phase, so concurrent lookups need no locking. Dropping the
/// store releases every owned context.
#[derive(Debug, Default)]
pub struct CertificateStore {
    entries: HashMap<String, SslContext>,
}

impl CertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins: a record that repeats an already-loaded hostname
    /// replaces the earlier context, which is released on the spot.
    pub fn insert(&mut self, entry: CertificateEntry) {
        let CertificateEntry { hostname, context } = entry;
        match self.entries.entry(hostname) {
            Entry::Occupied(mut slot) => {
                warn!("replacing previously loaded certificate for {}", slot.key());
                slot.insert(context);
            }
            Entry::Vacant(slot) => {
                slot.insert(context);
            }
        }
    }

    /// Borrowed, allocation-free lookup by the exact hostname the client
    /// presented. No normalization happens here; `""` simply misses.
    pub fn lookup(&self, hostname: &str) -> Option<&SslContext> {
        self.entries.get(hostname)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
