//! 授权检查
//!
//! 企业版只有在授权解锁后才执行组织访问策略。

use async_trait::async_trait;
use gatekeeper_common::{AppConfig, Result};

#[async_trait]
pub trait LicenseGate: Send + Sync {
    async fn is_unlocked(&self) -> Result<bool>;
}

/// 启动时由配置确定的授权状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticLicense {
    unlocked: bool,
}

impl StaticLicense {
    pub fn new(unlocked: bool) -> Self {
        Self { unlocked }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.license_unlocked)
    }
}

#[async_trait]
impl LicenseGate for StaticLicense {
    async fn is_unlocked(&self) -> Result<bool> {
        Ok(self.unlocked)
    }
}
