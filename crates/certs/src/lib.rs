pub mod resolver;
pub mod tls;

pub use resolver::{CERT_CACHE_TTL, CertificateResolver, ResolvedCertificate, cache_key};
pub use tls::{CertificateSet, TlsKeyPairPem, default_tls_pem};
