use crate::resolver::ResolvedCertificate;
use anyhow::Result;
use rcgen::CertificateParams;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsKeyPairPem {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

impl From<&ResolvedCertificate> for TlsKeyPairPem {
    fn from(cert: &ResolvedCertificate) -> Self {
        Self {
            cert_pem: cert.cert_pem.as_bytes().to_vec(),
            key_pem: cert.key_pem.as_bytes().to_vec(),
        }
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// 按请求主机名索引的证书集合，供 TLS 终端按 SNI 选择
#[derive(Debug, Clone, Default)]
pub struct CertificateSet {
    by_host: HashMap<String, ResolvedCertificate>,
}

impl CertificateSet {
    pub fn new(certs: impl IntoIterator<Item = ResolvedCertificate>) -> Self {
        let by_host = certs
            .into_iter()
            .map(|cert| (normalize_host(&cert.queried_domain), cert))
            .collect();
        Self { by_host }
    }

    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }

    pub fn get(&self, sni: &str) -> Option<&ResolvedCertificate> {
        self.by_host.get(&normalize_host(sni))
    }

    pub fn for_sni(&self, sni: &str) -> Option<TlsKeyPairPem> {
        self.get(sni).map(TlsKeyPairPem::from)
    }
}

fn read_default_cert_if_present(certs_dir: &Path) -> Result<Option<TlsKeyPairPem>> {
    let cert_path = certs_dir.join("default.pem");
    let key_path = certs_dir.join("default.key");
    if !cert_path.exists() || !key_path.exists() {
        return Ok(None);
    }
    Ok(Some(TlsKeyPairPem {
        cert_pem: fs::read(cert_path)?,
        key_pem: fs::read(key_path)?,
    }))
}

pub fn self_signed_pem(hosts: Vec<String>) -> Result<TlsKeyPairPem> {
    let mut params = CertificateParams::new(hosts)?;
    params.is_ca = rcgen::IsCa::NoCa;
    let key_pair = rcgen::KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;
    Ok(TlsKeyPairPem {
        cert_pem: cert.pem().as_bytes().to_vec(),
        key_pem: key_pair.serialize_pem().as_bytes().to_vec(),
    })
}

/// 主机名没有可用证书时使用的默认证书
pub fn default_tls_pem(certs_dir: &Path) -> Result<TlsKeyPairPem> {
    if let Some(pem) = read_default_cert_if_present(certs_dir)? {
        return Ok(pem);
    }
    tracing::info!(dir = %certs_dir.display(), "no default certificate on disk, generating self-signed");
    self_signed_pem(vec!["gatekeeper.local".to_string()])
}
