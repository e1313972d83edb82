//!
//! # 通用配置模块
//!
//! 包含密钥库所使用的核心配置结构。
//! 这些结构定义了 RSA 密钥尺寸边界、存储后端以及口令派生参数。
//!
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "SEAL_KEYCHAIN_";

/// 加密配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CryptoConfig {
    /// 未显式指定尺寸时使用的 RSA 位数
    pub default_rsa_bits: usize,
    /// 提供者接受的最小 RSA 位数
    pub min_rsa_bits: usize,
    /// 提供者接受的最大 RSA 位数
    pub max_rsa_bits: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            default_rsa_bits: 2048,
            min_rsa_bits: 1024,
            max_rsa_bits: 4096,
        }
    }
}

/// 存储后端
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 进程内存，重启后丢失
    #[default]
    Memory,
    /// 目录下每个密钥一个 JSON 文件
    File,
}

/// Argon2 口令派生参数
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KdfConfig {
    /// 内存成本 (KiB)
    pub memory_cost: u32,
    /// 迭代次数
    pub time_cost: u32,
    /// 并行度
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// 存储配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// 密钥存储目录（仅文件后端使用）
    pub key_storage_dir: String,
    /// 是否禁止两个密钥对共用同一标签
    pub unique_tags: bool,
    /// 持久化文件权限（Unix文件模式，如0o600）
    pub file_permissions: u32,
    pub kdf: KdfConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            key_storage_dir: "./keys".to_string(),
            unique_tags: false,
            file_permissions: 0o600, // 等同于 -rw-------
            kdf: KdfConfig::default(),
        }
    }
}

/// 完整配置文件
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct KeyStoreConfig {
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl KeyStoreConfig {
    /// 从 JSON 文件加载配置，缺失的字段使用默认值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        let config: KeyStoreConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// 默认配置叠加 `SEAL_KEYCHAIN_*` 环境变量
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// 使用给定的查找函数覆盖配置项。无法解析的值被忽略。
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));

        if let Some(value) = var("BACKEND") {
            match value.to_lowercase().as_str() {
                "memory" => self.storage.backend = StorageBackend::Memory,
                "file" => self.storage.backend = StorageBackend::File,
                _ => {}
            }
        }
        if let Some(value) = var("KEY_STORAGE_DIR") {
            self.storage.key_storage_dir = value;
        }
        if let Some(value) = var("UNIQUE_TAGS") {
            self.storage.unique_tags = value.to_lowercase() == "true";
        }
        if let Some(Ok(mode)) = var("FILE_PERMISSIONS").map(|v| v.parse::<u32>()) {
            self.storage.file_permissions = mode;
        }
        if let Some(Ok(bits)) = var("RSA_BITS").map(|v| v.parse::<usize>()) {
            self.crypto.default_rsa_bits = bits;
        }
        if let Some(Ok(bits)) = var("MIN_RSA_BITS").map(|v| v.parse::<usize>()) {
            self.crypto.min_rsa_bits = bits;
        }
        if let Some(Ok(bits)) = var("MAX_RSA_BITS").map(|v| v.parse::<usize>()) {
            self.crypto.max_rsa_bits = bits;
        }
        if let Some(Ok(mem)) = var("ARGON2_MEMORY_COST").map(|v| v.parse::<u32>()) {
            self.storage.kdf.memory_cost = mem;
        }
        if let Some(Ok(tc)) = var("ARGON2_TIME_COST").map(|v| v.parse::<u32>()) {
            self.storage.kdf.time_cost = tc;
        }
    }

    /// 检查尺寸边界是否自洽
    pub fn validate(&self) -> Result<(), Error> {
        let crypto = &self.crypto;
        if crypto.min_rsa_bits == 0 || crypto.max_rsa_bits == 0 {
            return Err(Error::Configuration(
                "RSA size bounds must be positive".to_string(),
            ));
        }
        if crypto.min_rsa_bits > crypto.max_rsa_bits {
            return Err(Error::Configuration(format!(
                "min_rsa_bits {} exceeds max_rsa_bits {}",
                crypto.min_rsa_bits, crypto.max_rsa_bits
            )));
        }
        if !(crypto.min_rsa_bits..=crypto.max_rsa_bits).contains(&crypto.default_rsa_bits) {
            return Err(Error::Configuration(format!(
                "default_rsa_bits {} is outside [{}, {}]",
                crypto.default_rsa_bits, crypto.min_rsa_bits, crypto.max_rsa_bits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults() {
        let config = KeyStoreConfig::default();
        assert_eq!(config.crypto.default_rsa_bits, 2048);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.file_permissions, 0o600);
        assert!(!config.storage.unique_tags);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("keychain.json");

        let mut config = KeyStoreConfig::default();
        config.storage.backend = StorageBackend::File;
        config.storage.key_storage_dir = "path_cfg".to_string();
        config.crypto.default_rsa_bits = 3072;
        config.save_to_file(&path).unwrap();

        let loaded = KeyStoreConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("partial.json");
        fs::write(&path, r#"{ "storage": { "backend": "file", "unique_tags": true } }"#).unwrap();

        let loaded = KeyStoreConfig::from_file(&path).unwrap();
        assert_eq!(loaded.storage.backend, StorageBackend::File);
        assert!(loaded.storage.unique_tags);
        assert_eq!(loaded.storage.key_storage_dir, "./keys");
        assert_eq!(loaded.crypto, CryptoConfig::default());
    }

    #[test]
    fn test_config_env_overrides() {
        let vars: HashMap<String, String> = [
            ("SEAL_KEYCHAIN_BACKEND", "FILE"),
            ("SEAL_KEYCHAIN_KEY_STORAGE_DIR", "env_keys"),
            ("SEAL_KEYCHAIN_UNIQUE_TAGS", "true"),
            ("SEAL_KEYCHAIN_RSA_BITS", "3072"),
            ("SEAL_KEYCHAIN_FILE_PERMISSIONS", "420"),
            ("SEAL_KEYCHAIN_ARGON2_MEMORY_COST", "not-a-number"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = KeyStoreConfig::default();
        config.apply_env(|name| vars.get(name).cloned());

        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.key_storage_dir, "env_keys");
        assert!(config.storage.unique_tags);
        assert_eq!(config.crypto.default_rsa_bits, 3072);
        assert_eq!(config.storage.file_permissions, 420);
        // 无法解析的值保持默认
        assert_eq!(config.storage.kdf.memory_cost, 19456);
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = KeyStoreConfig::default();
        config.crypto.min_rsa_bits = 4096;
        config.crypto.max_rsa_bits = 2048;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = KeyStoreConfig::default();
        config.crypto.default_rsa_bits = 512;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }
}
