//!
//! 集成测试的通用辅助函数
//!

#![allow(dead_code)]

use seal_keychain::{CryptoConfig, KeyStore, MemoryPersistence, RsaProvider};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// 安装一次测试用的 tracing 订阅者，输出级别由 `RUST_LOG` 控制
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// 允许 1024 位密钥的内存密钥库，测试中用小密钥缩短生成时间
pub fn fast_store(unique_tags: bool) -> KeyStore {
    init_tracing();
    let crypto = CryptoConfig {
        default_rsa_bits: 1024,
        ..CryptoConfig::default()
    };
    KeyStore::new(
        Arc::new(RsaProvider::new(&crypto)),
        Arc::new(MemoryPersistence::new().with_unique_tags(unique_tags)),
    )
}
