//! 证书材料的静态加密（AES-256-GCM）
//!
//! 密文格式：base64(nonce(12) + ciphertext + tag(16))。
//! 密钥为 32 字节，以 hex 编码配置，首次使用时加载且只加载一次。

use crate::error::{GatekeeperError, Result};
use base64::{Engine as _, engine::general_purpose};
use ring::aead::{self, AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use std::env;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

const KEY_LEN: usize = 32;

/// 外部密钥来源（如密钥管理服务），返回 hex 编码的密钥
pub trait KeyProvider: Send + Sync {
    fn hex_key(&self) -> Result<String>;
}

/// 密钥来源
#[derive(Clone)]
pub enum KeySource {
    Hex(String),
    /// 首次使用时从该环境变量读取
    Env(String),
    Provider(Arc<dyn KeyProvider>),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(_) => f.write_str("KeySource::Hex(<redacted>)"),
            Self::Env(name) => write!(f, "KeySource::Env({name})"),
            Self::Provider(_) => f.write_str("KeySource::Provider"),
        }
    }
}

pub struct CertificateCipher {
    source: KeySource,
    key: OnceCell<LessSafeKey>,
}

impl CertificateCipher {
    pub fn new(source: KeySource) -> Self {
        Self {
            source,
            key: OnceCell::new(),
        }
    }

    pub fn from_hex(secret: impl Into<String>) -> Self {
        Self::new(KeySource::Hex(secret.into()))
    }

    pub fn from_env(var: impl Into<String>) -> Self {
        Self::new(KeySource::Env(var.into()))
    }

    /// 首次调用时加载密钥；并发的首次调用只加载一次，加载失败不缓存，下次调用重试。
    pub async fn ensure_key_loaded(&self) -> Result<&LessSafeKey> {
        self.key
            .get_or_try_init(|| async {
                let key = load_key(&self.source)?;
                tracing::debug!(source = ?self.source, "certificate encryption key loaded");
                Ok::<_, GatekeeperError>(key)
            })
            .await
    }

    pub fn is_key_loaded(&self) -> bool {
        self.key.initialized()
    }

    pub async fn decrypt(&self, encrypted: &str) -> Result<String> {
        let key = self.ensure_key_loaded().await?;

        let data = general_purpose::STANDARD
            .decode(encrypted.trim())
            .map_err(|err| GatekeeperError::crypto(format!("invalid base64: {err}")))?;
        if data.len() < NONCE_LEN + aead::AES_256_GCM.tag_len() {
            return Err(GatekeeperError::crypto("encrypted data too short"));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| GatekeeperError::crypto("invalid nonce"))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| GatekeeperError::crypto("decryption failed"))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| GatekeeperError::crypto("plaintext is not valid UTF-8"))
    }

    pub async fn encrypt(&self, plaintext: &str) -> Result<String> {
        let key = self.ensure_key_loaded().await?;

        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes)
            .map_err(|_| GatekeeperError::crypto("failed to generate nonce"))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| GatekeeperError::crypto("encryption failed"))?;

        let mut result = nonce_bytes.to_vec();
        result.extend_from_slice(&in_out);
        Ok(general_purpose::STANDARD.encode(&result))
    }
}

impl fmt::Debug for CertificateCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateCipher")
            .field("source", &self.source)
            .field("loaded", &self.is_key_loaded())
            .finish()
    }
}

fn load_key(source: &KeySource) -> Result<LessSafeKey> {
    let secret = match source {
        KeySource::Hex(secret) => secret.clone(),
        KeySource::Env(var) => env::var(var)
            .map_err(|_| GatekeeperError::config(format!("{var} is not set")))?,
        KeySource::Provider(provider) => provider.hex_key()?,
    };

    let key_bytes = hex::decode(secret.trim())
        .map_err(|err| GatekeeperError::config(format!("encryption key is not valid hex: {err}")))?;
    if key_bytes.len() != KEY_LEN {
        return Err(GatekeeperError::config(format!(
            "invalid encryption key length: expected {} bytes, got {}",
            KEY_LEN,
            key_bytes.len()
        )));
    }

    let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes)
        .map_err(|_| GatekeeperError::crypto("invalid encryption key"))?;
    Ok(LessSafeKey::new(unbound))
}
