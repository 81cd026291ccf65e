//! 域名到 TLS 证书的解析
//!
//! 先查缓存，未命中的域名合并为一次证书库查询；
//! 精确匹配优先于通配符匹配，通配符只覆盖一级子域名。

use chrono::{DateTime, Utc};
use gatekeeper_common::entities::certificates::{self, CertificateStatus};
use gatekeeper_common::{Cache, CacheExt, CertificateCipher, CertificateStore, Result, metrics};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 解析结果的缓存时长
pub const CERT_CACHE_TTL: Duration = Duration::from_secs(180);

/// 为单个请求域名选中的证书，含解密后的材料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCertificate {
    pub cert_id: i32,
    /// 请求的域名
    pub queried_domain: String,
    /// 证书自身的域名；匹配上级通配符证书时与 `queried_domain` 不同
    pub domain: String,
    pub wildcard: bool,
    pub cert_pem: String,
    pub key_pem: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ResolvedCertificate {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

pub fn cache_key(domain: &str) -> String {
    format!("cert:{domain}")
}

/// `foo.example.com` -> `example.com`；单标签域名没有上级域名
pub fn parent_domain(domain: &str) -> Option<&str> {
    let (_, rest) = domain.split_once('.')?;
    (!rest.is_empty()).then_some(rest)
}

struct Candidate<'a> {
    row: &'a certificates::Model,
    cert_file: &'a str,
    key_file: &'a str,
}

impl Candidate<'_> {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.row.expires_at.map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Default)]
struct CertificateIndex<'a> {
    exact: HashMap<&'a str, Candidate<'a>>,
    wildcard: HashMap<&'a str, Candidate<'a>>,
}

impl<'a> CertificateIndex<'a> {
    fn build(rows: &'a [certificates::Model]) -> Self {
        let mut index = Self::default();
        for row in rows {
            if row.status != CertificateStatus::Valid {
                continue;
            }
            let (Some(cert_file), Some(key_file)) = (row.cert_file.as_deref(), row.key_file.as_deref())
            else {
                continue;
            };
            let candidate = Candidate {
                row,
                cert_file,
                key_file,
            };
            let slot = if row.wildcard {
                &mut index.wildcard
            } else {
                &mut index.exact
            };
            // 同一域名存在多张有效证书时取过期时间最晚的
            let replace = slot
                .get(row.domain.as_str())
                .is_none_or(|existing| candidate.expires_at() > existing.expires_at());
            if replace {
                slot.insert(row.domain.as_str(), candidate);
            }
        }
        index
    }

    fn lookup(&self, domain: &str) -> Option<&Candidate<'a>> {
        if let Some(found) = self.exact.get(domain) {
            return Some(found);
        }
        let parent = parent_domain(domain)?;
        self.wildcard
            .get(domain)
            .or_else(|| self.wildcard.get(parent))
    }
}

pub struct CertificateResolver {
    store: Arc<dyn CertificateStore>,
    cache: Arc<dyn Cache>,
    cipher: Arc<CertificateCipher>,
}

impl CertificateResolver {
    pub fn new(
        store: Arc<dyn CertificateStore>,
        cache: Arc<dyn Cache>,
        cipher: Arc<CertificateCipher>,
    ) -> Self {
        Self {
            store,
            cache,
            cipher,
        }
    }

    /// 为每个域名解析最合适的证书；没有证书的域名不出现在结果中，
    /// 缓存命中的结果排在新查询结果之前
    pub async fn resolve<I, S>(&self, domains: I, use_cache: bool) -> Result<Vec<ResolvedCertificate>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domains: BTreeSet<String> = domains.into_iter().map(Into::into).collect();
        if domains.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        let mut to_query = BTreeSet::new();
        if use_cache {
            for domain in domains {
                match self
                    .cache
                    .get_as::<ResolvedCertificate>(&cache_key(&domain))
                    .await?
                {
                    Some(cached) => {
                        metrics::inc_cert_cache_hit();
                        results.push(cached);
                    }
                    None => {
                        metrics::inc_cert_cache_miss();
                        to_query.insert(domain);
                    }
                }
            }
        } else {
            to_query = domains;
        }

        if to_query.is_empty() {
            return Ok(results);
        }

        let parent_domains: BTreeSet<String> = to_query
            .iter()
            .filter_map(|domain| parent_domain(domain))
            .map(str::to_string)
            .collect();

        metrics::inc_cert_store_query();
        let rows = self
            .store
            .find_certificates(&to_query, &parent_domains)
            .await?;
        let index = CertificateIndex::build(&rows);

        for domain in &to_query {
            let Some(candidate) = index.lookup(domain) else {
                debug!(domain = %domain, "no valid certificate");
                continue;
            };

            let resolved = self.materialize(domain, candidate).await?;
            metrics::inc_cert_resolved(if resolved.wildcard { "wildcard" } else { "exact" });
            debug!(
                domain = %domain,
                cert_domain = %resolved.domain,
                cert_id = resolved.cert_id,
                wildcard = resolved.wildcard,
                "certificate resolved"
            );

            if use_cache {
                // 按查询域名缓存，而不是证书自身的域名
                self.cache
                    .set_as(&cache_key(domain), &resolved, CERT_CACHE_TTL)
                    .await?;
            }
            results.push(resolved);
        }

        Ok(results)
    }

    /// 清除缓存，下次 `resolve` 重新查询存储
    pub async fn invalidate<I, S>(&self, domains: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for domain in domains {
            self.cache.delete(&cache_key(domain.as_ref())).await?;
        }
        Ok(())
    }

    async fn materialize(
        &self,
        queried_domain: &str,
        candidate: &Candidate<'_>,
    ) -> Result<ResolvedCertificate> {
        let cert_pem = self.cipher.decrypt(candidate.cert_file).await?;
        let key_pem = self.cipher.decrypt(candidate.key_file).await?;

        Ok(ResolvedCertificate {
            cert_id: candidate.row.cert_id,
            queried_domain: queried_domain.to_string(),
            domain: candidate.row.domain.clone(),
            wildcard: candidate.row.wildcard,
            cert_pem,
            key_pem,
            expires_at: candidate.expires_at(),
        })
    }
}
