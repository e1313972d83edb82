//!
//! 集成测试
//!
//! 使用真实的 RSA 提供者验证密钥对的生成、标签查找、改标签与密钥操作的完整流程。
//!

mod common;

use seal_keychain::{Error, GenerationFailure, KeyId, KeyKind, ProviderStatus, RetagFailure};
use seal_keychain::{Algorithm, KeyHandle, KeyStore};

// === 核心流程 ===

#[test]
fn test_generate_find_retag_regenerate() {
    common::init_tracing();
    let store = KeyStore::in_memory();

    let pair = store.generate_key_pair(2048, "test.key.1").unwrap();
    assert_eq!(store.block_size(pair.public_key()), 256);
    assert_eq!(store.block_size(pair.private_key()), 256);

    let found = store.find_keys("test.key.1").unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.contains(pair.private_key()));
    assert!(found.contains(pair.public_key()));

    // 改标签后旧标签下不再有这对密钥
    store.retag_key(pair.private_key(), "test.key.2").unwrap();
    store.retag_key(pair.public_key(), "test.key.2").unwrap();
    assert!(store.find_keys("test.key.1").unwrap().is_empty());
    assert_eq!(store.find_keys("test.key.2").unwrap().len(), 2);

    // 原标签可以再次生成，得到不同的密钥对
    let second = store.generate_key_pair(2048, "test.key.1").unwrap();
    assert_ne!(second.private_key().id(), pair.private_key().id());
    assert_ne!(second.public_key().id(), pair.public_key().id());
    assert_eq!(store.find_keys("test.key.1").unwrap().len(), 2);
}

#[test]
fn test_keys_work_after_retag() {
    let store = common::fast_store(false);
    let pair = store.generate_default_key_pair("ops.before").unwrap();
    assert_eq!(pair.public_key().size_in_bits(), 1024);
    store.retag_key_pair(&pair, "ops.after").unwrap();

    let message = b"key operations survive a retag";
    let ciphertext = store.encrypt(pair.public_key(), message).unwrap();
    assert_eq!(store.decrypt(pair.private_key(), &ciphertext).unwrap(), message);

    let signature = store.sign(pair.private_key(), message).unwrap();
    store.verify(pair.public_key(), message, &signature).unwrap();
    assert!(store.verify(pair.public_key(), b"tampered", &signature).is_err());

    let pem = store.export_public_key_pem(pair.public_key()).unwrap();
    assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
}

#[test]
fn test_plaintext_limit_follows_block_size() {
    let store = common::fast_store(false);
    let pair = store.generate_key_pair(1024, "limits").unwrap();
    let limit = store.max_plaintext_len(pair.public_key());
    assert_eq!(limit, 128 - 11);

    assert!(store.encrypt(pair.public_key(), &vec![7u8; limit]).is_ok());
    assert!(store.encrypt(pair.public_key(), &vec![7u8; limit + 1]).is_err());
}

// === 失败路径 ===

#[test]
fn test_zero_size_reports_status() {
    let store = KeyStore::in_memory();
    let err = store.generate_key_pair(0, "test.key.zero").unwrap_err();
    assert!(matches!(err, Error::KeyGeneration(GenerationFailure::Provider(_))));
    assert_ne!(err.status(), Some(ProviderStatus::SUCCESS));
    assert!(err.status().is_some());
    assert!(store.find_keys("test.key.zero").unwrap().is_empty());
}

#[test]
fn test_unsupported_size_reports_status() {
    let store = KeyStore::in_memory();
    let err = store.generate_key_pair(8192, "too.big").unwrap_err();
    assert_eq!(err.status(), Some(ProviderStatus::UNSUPPORTED_KEY_SIZE));
}

#[test]
fn test_retag_untracked_key() {
    let store = KeyStore::in_memory();
    let stranger = KeyHandle::new(KeyId::new(), KeyKind::Private, Algorithm::Rsa, 2048, false);
    let err = store.retag_key(&stranger, "anything").unwrap_err();
    assert!(matches!(err, Error::Retag(RetagFailure::NotTracked)));
    assert_eq!(err.status(), None);
}

#[test]
fn test_unique_tags_reject_second_generation() {
    let store = common::fast_store(true);
    store.generate_key_pair(1024, "unique").unwrap();

    let err = store.generate_key_pair(1024, "unique").unwrap_err();
    assert_eq!(err.status(), Some(ProviderStatus::DUPLICATE_ITEM));
    assert_eq!(store.find_keys("unique").unwrap().len(), 2);
}

#[test]
fn test_deleted_keys_are_not_found() {
    let store = common::fast_store(false);
    let pair = store.generate_key_pair(1024, "short.lived").unwrap();
    assert_eq!(store.delete_keys("short.lived").unwrap(), 2);

    assert!(matches!(
        store.decrypt(pair.private_key(), b"whatever").unwrap_err(),
        Error::KeyNotFound(id) if id == *pair.private_key().id()
    ));
    assert!(matches!(
        store.retag_key(pair.public_key(), "revived").unwrap_err(),
        Error::Retag(RetagFailure::NotTracked)
    ));
}

// === 并发 ===

#[test]
fn test_parallel_generation_on_distinct_tags() {
    let store = common::fast_store(false);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || store.generate_key_pair(1024, &format!("thread.{i}")))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    for i in 0..4 {
        assert_eq!(store.find_keys(&format!("thread.{i}")).unwrap().len(), 2);
    }
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_generate_key_pair_async() {
    let store = common::fast_store(false);
    let pair = store.generate_key_pair_async(1024, "async.key").await.unwrap();
    assert_eq!(store.block_size(pair.public_key()), 128);
    assert_eq!(store.find_keys("async.key").unwrap().len(), 2);
}
