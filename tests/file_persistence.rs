//!
//! 文件持久化集成测试
//!
//! 验证密钥在进程重启（重新打开目录）后仍可查找和使用，以及私钥的口令封存。
//!

#![cfg(feature = "secure-storage")]

mod common;

use seal_keychain::{
    CryptoConfig, Error, FilePersistence, KdfConfig, KeyStore, KeyStoreConfig, ProviderStatus,
    RsaProvider, SecretString, StorageBackend,
};
use std::sync::Arc;
use tempfile::tempdir;

fn fast_kdf() -> KdfConfig {
    KdfConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

fn password(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

// 辅助函数：在目录上打开一个带口令的文件密钥库
fn open_sealed(dir: &std::path::Path, pw: &str) -> KeyStore {
    let persistence = FilePersistence::open(dir)
        .unwrap()
        .with_password(password(pw), fast_kdf());
    KeyStore::new(
        Arc::new(RsaProvider::new(&CryptoConfig::default())),
        Arc::new(persistence),
    )
}

#[test]
fn test_keys_survive_reopen() {
    common::init_tracing();
    let dir = tempdir().unwrap();
    let message = b"persisted across restarts";

    let (pair, ciphertext) = {
        let store = open_sealed(dir.path(), "correct horse");
        let pair = store.generate_key_pair(1024, "disk.key").unwrap();
        assert!(pair.private_key().is_permanent());
        let ciphertext = store.encrypt(pair.public_key(), message).unwrap();
        (pair, ciphertext)
    };

    let store = open_sealed(dir.path(), "correct horse");
    let found = store.find_keys("disk.key").unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.contains(pair.private_key()));
    assert_eq!(store.decrypt(pair.private_key(), &ciphertext).unwrap(), message);
}

#[test]
fn test_wrong_password_cannot_use_private_key() {
    let dir = tempdir().unwrap();
    let pair = open_sealed(dir.path(), "right")
        .generate_key_pair(1024, "locked")
        .unwrap();

    let store = open_sealed(dir.path(), "wrong");
    // 元数据不加密，查找和改标签仍然可用
    assert_eq!(store.find_keys("locked").unwrap().len(), 2);
    store.retag_key_pair(&pair, "still.locked").unwrap();

    let err = store.sign(pair.private_key(), b"msg").unwrap_err();
    assert!(matches!(err, Error::Persistence(ProviderStatus::AUTH_FAILED)));
    // 公钥不受口令影响
    assert!(store.encrypt(pair.public_key(), b"msg").is_ok());
}

#[test]
fn test_sealed_key_without_password_is_auth_failure() {
    let dir = tempdir().unwrap();
    let message = b"sealed at rest";
    let (pair, ciphertext) = {
        let store = open_sealed(dir.path(), "secret");
        let pair = store.generate_key_pair(1024, "sealed").unwrap();
        let ciphertext = store.encrypt(pair.public_key(), message).unwrap();
        (pair, ciphertext)
    };

    // 未设置口令重新打开目录
    let store = KeyStore::new(
        Arc::new(RsaProvider::new(&CryptoConfig::default())),
        Arc::new(FilePersistence::open(dir.path()).unwrap()),
    );
    assert_eq!(store.find_keys("sealed").unwrap().len(), 2);

    assert!(matches!(
        store.decrypt(pair.private_key(), &ciphertext).unwrap_err(),
        Error::Persistence(ProviderStatus::AUTH_FAILED)
    ));
    assert!(matches!(
        store.sign(pair.private_key(), message).unwrap_err(),
        Error::Persistence(ProviderStatus::AUTH_FAILED)
    ));
    assert!(store.export_public_key_pem(pair.public_key()).is_ok());
}

#[test]
fn test_file_backend_from_config() {
    let dir = tempdir().unwrap();
    let mut config = KeyStoreConfig::default();
    config.crypto.default_rsa_bits = 1024;
    config.storage.backend = StorageBackend::File;
    config.storage.key_storage_dir = dir.path().join("keys").to_string_lossy().into_owned();
    config.storage.unique_tags = true;
    config.storage.kdf = fast_kdf();

    let store = KeyStore::from_config(&config, Some(password("pw"))).unwrap();
    let pair = store.generate_default_key_pair("configured").unwrap();
    assert_eq!(pair.public_key().size_in_bits(), 1024);
    assert_eq!(
        store.generate_default_key_pair("configured").unwrap_err().status(),
        Some(ProviderStatus::DUPLICATE_ITEM)
    );

    let reopened = KeyStore::from_config(&config, Some(password("pw"))).unwrap();
    let signature = reopened.sign(pair.private_key(), b"hello").unwrap();
    reopened.verify(pair.public_key(), b"hello", &signature).unwrap();
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = KeyStoreConfig::default();
    config.crypto.min_rsa_bits = 4096;
    config.crypto.max_rsa_bits = 1024;
    assert!(matches!(
        KeyStore::from_config(&config, None),
        Err(Error::Configuration(_))
    ));
}
