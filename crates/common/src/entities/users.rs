use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用户来源：本地账户或外部身份提供方
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[sea_orm(string_value = "internal")]
    Internal,
    #[sea_orm(string_value = "oidc")]
    Oidc,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub email: Option<String>,
    pub user_type: UserType,
    pub two_factor_enabled: bool,
    pub last_password_change: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// 联合登录用户的双因素认证与密码轮换由其 IdP 负责
    pub fn is_internal(&self) -> bool {
        self.user_type == UserType::Internal
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Sessions,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Sessions => Entity::has_many(super::sessions::Entity).into(),
        }
    }
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
