use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;

pub mod certificates;

pub use certificates::{CertificateEntry, CertificateStore};

/// Static reference to the certificate store that can be shared across
/// handshake threads. Bootstrap publishes a populated store exactly once;
/// after that the store is only read.
static CERT_STORE: Lazy<ArcSwap<CertificateStore>> =
    Lazy::new(|| ArcSwap::from_pointee(CertificateStore::new()));

/// Publish a populated store for the serving phase.
pub fn activate(store: CertificateStore) {
    CERT_STORE.store(Arc::new(store));
}

/// The store currently answering SNI lookups.
pub fn active() -> arc_swap::Guard<Arc<CertificateStore>> {
    CERT_STORE.load()
}

/// Swap in an empty store, releasing every context the old one held as
/// soon as the last in-flight lookup guard is gone.
pub fn reset() {
    CERT_STORE.store(Arc::new(CertificateStore::new()));
}
