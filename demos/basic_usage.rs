// 基本用法示例：生成、查找、改标签并使用密钥对
use seal_keychain::KeyStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = KeyStore::in_memory();

    // 生成 2048 位密钥对，两半都挂在同一个标签下
    let pair = store.generate_key_pair(2048, "com.example.session")?;
    println!("private key: {}", pair.private_key().id());
    println!("public key:  {}", pair.public_key().id());
    println!("block size:  {} bytes", store.block_size(pair.public_key()));

    // 加密与解密
    let data = b"Hello, Seal-Keychain!";
    let ciphertext = store.encrypt(pair.public_key(), data)?;
    let plaintext = store.decrypt(pair.private_key(), &ciphertext)?;
    println!("Decrypted: {}", String::from_utf8(plaintext)?);

    // 改标签后按新标签查找
    store.retag_key_pair(&pair, "com.example.archived")?;
    let archived = store.find_keys("com.example.archived")?;
    println!("keys under new tag: {}", archived.len());

    println!("{}", store.export_public_key_pem(pair.public_key())?);
    Ok(())
}
