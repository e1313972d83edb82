// 文件存储示例：私钥以口令加密落盘，重新打开后仍可使用
use seal_keychain::{KeyStore, KeyStoreConfig, SecretString, StorageBackend};
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let dir = "demo_keys";
    let _ = fs::remove_dir_all(dir);

    // 环境变量 SEAL_KEYCHAIN_* 可以覆盖这里的设置
    let mut config = KeyStoreConfig::default();
    config.storage.backend = StorageBackend::File;
    config.storage.key_storage_dir = dir.to_string();
    config.apply_env(|key| std::env::var(key).ok());

    let password = || SecretString::from("demo-password".to_string());

    let pair = {
        let store = KeyStore::from_config(&config, Some(password()))?;
        store.generate_default_key_pair("com.example.signing")?
    };

    // 模拟进程重启
    let store = KeyStore::from_config(&config, Some(password()))?;
    let found = store.find_keys("com.example.signing")?;
    println!("found {} keys after reopening", found.len());

    let signature = store.sign(pair.private_key(), b"release-1.0.tar.gz")?;
    store.verify(pair.public_key(), b"release-1.0.tar.gz", &signature)?;
    println!("signature verified ({} bytes)", signature.len());

    // 清理生成的密钥目录
    let _ = fs::remove_dir_all(dir);
    Ok(())
}
