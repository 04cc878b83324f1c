use boring::pkey::PKey;
use boring::ssl::{select_next_proto, AlpnError, SslAcceptor, SslAcceptorBuilder, SslMethod};
use boring::x509::X509;

/// ALPN list the relay stubs accept.
pub const H2_ONLY: &[u8] = b"\x02h2";
pub const HTTP11_ONLY: &[u8] = b"\x08http/1.1";

/// Generate a self-signed certificate for 127.0.0.1/localhost and return an
/// acceptor builder plus the certificate PEM (its own CA, being self-signed).
pub fn generate_cert_bundle() -> (SslAcceptorBuilder, Vec<u8>) {
    let subject_alt_names = vec!["127.0.0.1".to_string(), "localhost".to_string()];

    let cert =
        rcgen::generate_simple_self_signed(subject_alt_names).expect("Failed to generate cert");
    let cert_pem = cert.cert.pem();
    let key_pem = cert.signing_key.serialize_pem();

    let pkey = PKey::private_key_from_pem(key_pem.as_bytes()).expect("Failed to parse private key");
    let x509 = X509::from_pem(cert_pem.as_bytes()).expect("Failed to parse certificate");

    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())
        .expect("Failed to create SslAcceptor builder");
    builder
        .set_private_key(&pkey)
        .expect("Failed to set private key");
    builder
        .set_certificate(&x509)
        .expect("Failed to set certificate");

    (builder, cert_pem.into_bytes())
}

/// Self-signed acceptor that only agrees to the protocols in `alpn`
/// (wire format).
pub fn acceptor_with_alpn(alpn: &'static [u8]) -> (SslAcceptor, Vec<u8>) {
    let (mut builder, ca_pem) = generate_cert_bundle();
    builder.set_alpn_select_callback(move |_ssl, client| {
        select_next_proto(alpn, client).ok_or(AlpnError::NOACK)
    });
    (builder.build(), ca_pem)
}

/// Parse the PEM returned by [`generate_cert_bundle`] as trust roots.
pub fn roots(ca_pem: &[u8]) -> Vec<X509> {
    X509::stack_from_pem(ca_pem).expect("Failed to parse CA bundle")
}
