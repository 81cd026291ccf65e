//! Gatekeeper 统一错误类型定义
//!
//! 证书解析与访问策略评估共享一个错误类型。
//! "未找到"与"不合规"属于正常结果，以数据形式返回，不走这里。

use thiserror::Error;

/// Gatekeeper 统一错误类型
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// 资源未找到
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 参数校验错误
    #[error("参数校验失败: {0}")]
    Validation(String),

    /// 配置错误（缺失或格式不正确）
    #[error("配置错误: {0}")]
    Config(String),

    /// 加解密错误
    #[error("加解密错误: {0}")]
    Crypto(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    Cache(String),

    /// 数据库错误
    #[error("数据库错误: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 其他内部错误
    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatekeeperError {
    /// 创建未找到错误
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// 创建校验错误
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// 创建加解密错误
    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    /// 创建缓存错误
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// 是否由调用方输入引起
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Validation(_))
    }

    /// 是否与证书材料完整性相关（解密失败必须显式上报）
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, Self::Crypto(_))
    }
}

/// Gatekeeper Result 类型别名
pub type Result<T> = std::result::Result<T, GatekeeperError>;
