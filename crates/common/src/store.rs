//! 数据源抽象
//!
//! 证书解析和策略评估各自依赖一个只读的 store trait，
//! `SeaOrmStore` 基于关系库同时实现两者。

use crate::entities::certificates::{self, CertificateStatus};
use crate::entities::{orgs, resource_sessions, sessions, users};
use crate::error::Result;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::BTreeSet;

#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// 查询有效且证书、私钥均存在的证书：域名在 `domains` 中，
    /// 或域名在 `parent_domains` 中且为通配符证书
    async fn find_certificates(
        &self,
        domains: &BTreeSet<String>,
        parent_domains: &BTreeSet<String>,
    ) -> Result<Vec<certificates::Model>>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn find_org(&self, org_id: &str) -> Result<Option<orgs::Model>>;

    async fn find_user(&self, user_id: &str) -> Result<Option<users::Model>>;

    async fn find_session(&self, session_id: &str) -> Result<Option<sessions::Model>>;

    async fn find_resource_session(
        &self,
        session_id: &str,
    ) -> Result<Option<resource_sessions::Model>>;
}

pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn certificate_condition(
    domains: &BTreeSet<String>,
    parent_domains: &BTreeSet<String>,
) -> Condition {
    let mut matches =
        Condition::any().add(certificates::Column::Domain.is_in(domains.iter().cloned()));
    if !parent_domains.is_empty() {
        matches = matches.add(
            Condition::all()
                .add(certificates::Column::Domain.is_in(parent_domains.iter().cloned()))
                .add(certificates::Column::Wildcard.eq(true)),
        );
    }

    Condition::all()
        .add(certificates::Column::Status.eq(CertificateStatus::Valid))
        .add(certificates::Column::CertFile.is_not_null())
        .add(certificates::Column::KeyFile.is_not_null())
        .add(matches)
}

#[async_trait]
impl CertificateStore for SeaOrmStore {
    async fn find_certificates(
        &self,
        domains: &BTreeSet<String>,
        parent_domains: &BTreeSet<String>,
    ) -> Result<Vec<certificates::Model>> {
        let rows = certificates::Entity::find()
            .filter(certificate_condition(domains, parent_domains))
            .all(&self.db)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl PolicyStore for SeaOrmStore {
    async fn find_org(&self, org_id: &str) -> Result<Option<orgs::Model>> {
        Ok(orgs::Entity::find_by_id(org_id.to_string())
            .one(&self.db)
            .await?)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<users::Model>> {
        Ok(users::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?)
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<sessions::Model>> {
        Ok(sessions::Entity::find_by_id(session_id.to_string())
            .one(&self.db)
            .await?)
    }

    async fn find_resource_session(
        &self,
        session_id: &str,
    ) -> Result<Option<resource_sessions::Model>> {
        Ok(resource_sessions::Entity::find_by_id(session_id.to_string())
            .one(&self.db)
            .await?)
    }
}
