use openssl::ssl::{NameType, SniError, SslAcceptor, SslAlert, SslMethod, SslRef};
use tracing::{debug, error, info};

use super::builder::{self, CertificateError, CertificateRecord};
use crate::stores;

/// Builds the TLS acceptor that fronts every connection.
///
/// Its base identity is the default record, presented to clients that send
/// no SNI (or an unknown one, when `strict_sni` is off). The servername
/// callback runs before certificate selection and swaps in the per-hostname
/// context from the active store.
pub fn build_acceptor(
    default_record: &CertificateRecord,
    strict_sni: bool,
) -> Result<SslAcceptor, CertificateError> {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).map_err(
        |source| {
            error!("TLS acceptor allocation failed");
            CertificateError::CryptoContext(source)
        },
    )?;

    builder::apply_identity(&mut acceptor, default_record)?;

    acceptor.set_servername_callback(move |ssl: &mut SslRef, _alert: &mut SslAlert| {
        sni_callback(ssl, strict_sni)
    });

    Ok(acceptor.build())
}

// This function is called when the servername callback executes.
// A hostname with a configured certificate gets its context installed;
// anything else either continues on the default identity or aborts the
// handshake, depending on `strict_sni`.
fn sni_callback(ssl: &mut SslRef, strict_sni: bool) -> Result<(), SniError> {
    let Some(servername) = ssl.servername(NameType::HOST_NAME).map(str::to_owned) else {
        debug!("no servername in handshake, staying on the default certificate");
        return Ok(());
    };
    debug!("received SNI: {servername}");

    let store = stores::active();
    if let Some(context) = store.lookup(&servername) {
        return ssl.set_ssl_context(context).map_err(|err| {
            error!("installing TLS context for {servername} failed: {err}");
            SniError::ALERT_FATAL
        });
    }

    if strict_sni {
        info!("no certificate for {servername}, aborting handshake");
        return Err(SniError::ALERT_FATAL);
    }

    debug!("no certificate for {servername}, falling back to the default");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};

    use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
    use tempfile::TempDir;

    use super::*;
    use crate::stores::{CertificateEntry, CertificateStore};
    use crate::tls::testing;

    fn connect(addr: std::net::SocketAddr, sni: &str) -> Result<String, ()> {
        let mut connector = SslConnector::builder(SslMethod::tls_client()).unwrap();
        connector.set_verify(SslVerifyMode::NONE);
        let connector = connector.build();

        let tcp = TcpStream::connect(addr).unwrap();
        let mut config = connector.configure().unwrap();
        config.set_verify_hostname(false);
        let tls = config.connect(sni, tcp).map_err(|_| ())?;

        let peer = tls.ssl().peer_certificate().unwrap();
        Ok(testing::common_name(&peer))
    }

    // One test owns the process-wide store so parallel tests cannot race
    // on it. It walks the full boundary: store hit, miss with fallback,
    // and miss with strict SNI.
    #[test]
    fn test_handshake_selects_certificate_by_sni() {
        let dir = TempDir::new().unwrap();
        let default_record =
            builder::parse_record(&testing::write_pem_identity(dir.path(), "fallback.test"))
                .unwrap();

        let mut store = CertificateStore::new();
        for hostname in ["a.test", "b.test"] {
            store.insert(CertificateEntry {
                hostname: hostname.to_string(),
                context: testing::context_for(hostname),
            });
        }
        stores::activate(store);

        let lenient = build_acceptor(&default_record, false).unwrap();
        let strict = build_acceptor(&default_record, true).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            // lenient: known, known, unknown; strict: unknown
            for acceptor in [&lenient, &lenient, &lenient, &strict] {
                let (sock, _) = listener.accept().unwrap();
                if let Ok(mut tls) = acceptor.accept(sock) {
                    let _ = tls.shutdown();
                }
            }
        });

        assert_eq!(connect(addr, "a.test").unwrap(), "a.test");
        assert_eq!(connect(addr, "b.test").unwrap(), "b.test");
        assert_eq!(connect(addr, "missing.test").unwrap(), "fallback.test");
        assert!(connect(addr, "missing.test").is_err());

        server.join().unwrap();
        stores::reset();
    }
}
