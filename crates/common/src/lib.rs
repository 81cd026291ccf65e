pub mod cache;
pub mod config;
pub mod crypto;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod store;

// ============ 重新导出常用类型 ============

// 错误处理
pub use error::{GatekeeperError, Result};

// 配置相关
pub use config::{AppConfig, BuildMode};

// 外部协作方
pub use cache::{Cache, CacheExt, MemoryCache};
pub use crypto::{CertificateCipher, KeyProvider, KeySource};
pub use store::{CertificateStore, PolicyStore, SeaOrmStore};
