//! Helpers that mint throwaway self-signed identities for tests.

use std::fs;
use std::path::Path;

use openssl::{
    asn1::Asn1Time,
    bn::{BigNum, MsbOption},
    hash::MessageDigest,
    pkey::{PKey, Private},
    rsa::Rsa,
    ssl::{SslContext, SslMethod},
    x509::{X509NameBuilder, X509Ref, X509},
};

pub(crate) fn identity(common_name: &str) -> (PKey<Private>, X509) {
    let rsa = Rsa::generate(2048).unwrap();
    let key = PKey::from_rsa(rsa).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let serial = {
        let mut serial = BigNum::new().unwrap();
        serial.rand(159, MsbOption::MAYBE_ZERO, false).unwrap();
        serial.to_asn1_integer().unwrap()
    };

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (key, builder.build())
}

/// Writes a PEM chain + PEM key pair for `hostname` into `dir` and returns
/// the matching configuration record.
pub(crate) fn write_pem_identity(dir: &Path, hostname: &str) -> String {
    let (key, cert) = identity(hostname);

    let chain_path = dir.join(format!("{hostname}.chain.pem"));
    let key_path = dir.join(format!("{hostname}.key.pem"));
    fs::write(&chain_path, cert.to_pem().unwrap()).unwrap();
    fs::write(&key_path, key.private_key_to_pem_pkcs8().unwrap()).unwrap();

    format!(
        "{hostname},{},{}",
        chain_path.display(),
        key_path.display()
    )
}

/// Same as [`write_pem_identity`] but the key is binary DER/PKCS#8 and the
/// file name carries the `.pkcs8` marker the builder dispatches on.
pub(crate) fn write_pkcs8_identity(dir: &Path, hostname: &str) -> String {
    let (key, cert) = identity(hostname);

    let chain_path = dir.join(format!("{hostname}.chain.pem"));
    let key_path = dir.join(format!("{hostname}.pkcs8"));
    fs::write(&chain_path, cert.to_pem().unwrap()).unwrap();
    fs::write(&key_path, key.private_key_to_pkcs8().unwrap()).unwrap();

    format!(
        "{hostname},{},{}",
        chain_path.display(),
        key_path.display()
    )
}

/// A server context that presents `common_name`, built in-memory.
pub(crate) fn context_for(common_name: &str) -> SslContext {
    let (key, cert) = identity(common_name);
    let mut builder = SslContext::builder(SslMethod::tls_server()).unwrap();
    builder.set_certificate(&cert).unwrap();
    builder.set_private_key(&key).unwrap();
    builder.build()
}

pub(crate) fn common_name(cert: &X509Ref) -> String {
    cert.subject_name()
        .entries_by_nid(openssl::nid::Nid::COMMONNAME)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap()
        .to_string()
}
