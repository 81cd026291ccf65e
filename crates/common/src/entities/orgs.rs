use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orgs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub org_id: String,
    pub name: String,
    pub require_two_factor: Option<bool>,
    /// `None` 或 `0` 表示不限制会话时长
    pub max_session_length_hours: Option<i32>,
    /// `None` 或 `0` 表示不限制密码有效期
    pub password_expiry_days: Option<i32>,
    pub settings_log_retention_days: Option<i32>,
}

impl Model {
    pub fn requires_two_factor(&self) -> bool {
        self.require_two_factor.unwrap_or(false)
    }

    /// 生效的会话时长上限（小时）
    pub fn session_length_limit_hours(&self) -> Option<i64> {
        self.max_session_length_hours
            .filter(|hours| *hours > 0)
            .map(i64::from)
    }

    /// 生效的密码有效期上限（天）
    pub fn password_expiry_limit_days(&self) -> Option<i64> {
        self.password_expiry_days
            .filter(|days| *days > 0)
            .map(i64::from)
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        unreachable!("orgs has no relations used here")
    }
}

impl ActiveModelBehavior for ActiveModel {}
