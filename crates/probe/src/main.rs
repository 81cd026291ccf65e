mod cli;
mod db;

use crate::cli::{Cli, Command};
use crate::db::init_db;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use clap::Parser;
use gatekeeper_certs::{CertificateResolver, CertificateSet, ResolvedCertificate, default_tls_pem};
use gatekeeper_common::config::AppConfig;
use gatekeeper_common::{CertificateCipher, MemoryCache, PolicyStore, SeaOrmStore, metrics};
use gatekeeper_policy::{AccessPolicyEvaluator, PolicyRequest, StaticLicense, check_session_length};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// 证书解析结果（不含私钥材料）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CertSummary {
    cert_id: i32,
    queried_domain: String,
    domain: String,
    wildcard: bool,
    expires_at: Option<DateTime<Utc>>,
}

impl From<&ResolvedCertificate> for CertSummary {
    fn from(cert: &ResolvedCertificate) -> Self {
        Self {
            cert_id: cert.cert_id,
            queried_domain: cert.queried_domain.clone(),
            domain: cert.domain.clone(),
            wildcard: cert.wildcard,
            expires_at: cert.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SniSelection {
    host: String,
    source: &'static str,
    domain: Option<String>,
    cert_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    let database_url = config
        .database_url
        .as_ref()
        .ok_or_else(|| anyhow!("DATABASE_URL is required for gatekeeper-probe"))?;

    let db = init_db(database_url, config.db_max_connections).await?;
    let store = Arc::new(SeaOrmStore::new(db));
    info!(build_mode = %config.build_mode, "probe connected");

    let output = match cli.command {
        Command::Certs { no_cache, domains } => {
            let cipher = Arc::new(CertificateCipher::from_env(&config.encryption_key_env));
            let resolver = CertificateResolver::new(store, Arc::new(MemoryCache::new()), cipher);
            let certs = resolver.resolve(domains, !no_cache).await?;
            let summaries: Vec<CertSummary> = certs.iter().map(CertSummary::from).collect();
            serde_json::to_string_pretty(&summaries)?
        }
        Command::Sni { no_cache, hosts } => {
            let cipher = Arc::new(CertificateCipher::from_env(&config.encryption_key_env));
            let resolver = CertificateResolver::new(store, Arc::new(MemoryCache::new()), cipher);
            let set = CertificateSet::new(resolver.resolve(hosts.clone(), !no_cache).await?);
            let fallback = default_tls_pem(&config.certs_dir)?;
            let selections: Vec<SniSelection> = hosts
                .into_iter()
                .map(|host| match (set.get(&host), set.for_sni(&host)) {
                    (Some(cert), Some(pem)) => SniSelection {
                        domain: Some(cert.domain.clone()),
                        source: "store",
                        cert_bytes: pem.cert_pem.len(),
                        host,
                    },
                    _ => SniSelection {
                        domain: None,
                        source: "default",
                        cert_bytes: fallback.cert_pem.len(),
                        host,
                    },
                })
                .collect();
            serde_json::to_string_pretty(&selections)?
        }
        Command::Policy {
            org_id,
            user_id,
            session_id,
        } => {
            let evaluator = AccessPolicyEvaluator::new(
                store,
                Arc::new(StaticLicense::from_config(&config)),
                config.build_mode,
            );
            let decision = evaluator
                .evaluate(PolicyRequest::new(&org_id, &user_id, &session_id))
                .await?;
            serde_json::to_string_pretty(&decision)?
        }
        Command::SessionLength {
            org_id,
            resource_session_id,
        } => {
            let org = store
                .find_org(&org_id)
                .await?
                .ok_or_else(|| anyhow!("organization {} not found", org_id))?;
            let session = store
                .find_resource_session(&resource_session_id)
                .await?
                .ok_or_else(|| anyhow!("resource session {} not found", resource_session_id))?;
            serde_json::to_string_pretty(&check_session_length(&session, &org))?
        }
    };
    println!("{}", output);

    if cli.metrics {
        eprintln!("{}", metrics::render_metrics());
    }

    Ok(())
}
