use anyhow::{Result, anyhow};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 部署的产品构建类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Oss,
    Enterprise,
    Saas,
}

impl FromStr for BuildMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "oss" => Ok(Self::Oss),
            "enterprise" => Ok(Self::Enterprise),
            "saas" => Ok(Self::Saas),
            other => Err(anyhow!("unknown BUILD_MODE {}", other)),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Oss => "oss",
            Self::Enterprise => "enterprise",
            Self::Saas => "saas",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// 存放 hex 编码证书密钥的环境变量名
    pub encryption_key_env: String,
    pub build_mode: BuildMode,
    pub license_unlocked: bool,
    pub certs_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // 先加载 .env，后续读取进程环境变量时生效
        let _ = dotenvy::dotenv();

        let database_url = env::var("DATABASE_URL").ok();
        let db_max_connections = env_u32("DB_MAX_CONNECTIONS", 10);
        let encryption_key_env =
            env::var("CERT_ENCRYPTION_KEY_ENV").unwrap_or_else(|_| "SERVER_SECRET".to_string());
        let build_mode = match env::var("BUILD_MODE") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => BuildMode::default(),
        };
        let license_unlocked = env_bool("LICENSE_UNLOCKED", false);
        let certs_dir = env::var("CERTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/certs"));

        Ok(Self {
            database_url,
            db_max_connections,
            encryption_key_env,
            build_mode,
            license_unlocked,
            certs_dir,
        })
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => parse_bool(&value),
        Err(_) => default,
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

fn env_u32(key: &str, default: u32) -> u32 {
    parse_u32(env::var(key).ok().as_deref(), default)
}

/// 超出 u32 范围或无法解析时使用默认值，不做截断
fn parse_u32(value: Option<&str>, default: u32) -> u32 {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}
