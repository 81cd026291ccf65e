use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 证书签发状态，解析器只使用 `Valid`
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "valid")]
    Valid,
    #[sea_orm(string_value = "invalid")]
    Invalid,
    #[sea_orm(string_value = "revoked")]
    Revoked,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "certificates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub cert_id: i32,
    pub domain: String,
    pub wildcard: bool,
    pub status: CertificateStatus,
    /// 加密后的 PEM 证书链
    #[sea_orm(column_type = "Text", nullable)]
    pub cert_file: Option<String>,
    /// 加密后的 PEM 私钥
    #[sea_orm(column_type = "Text", nullable)]
    pub key_file: Option<String>,
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        unreachable!("certificates has no relations")
    }
}

impl ActiveModelBehavior for ActiveModel {}
