//! `KeyStore`：密钥对生命周期的门面。
//!
//! `KeyStore` 本身不持有可变状态，所有状态都位于注入的 [`SecurePersistence`] 中，
//! 按标签寻址。生成工作委托给注入的 [`CryptoProvider`]。
//!
//! 并发语义：不同标签上的操作互不影响；同一标签上的并发操作没有顺序保证，
//! 结果由持久化后端决定（后写者胜出，无内置互斥）。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::common::config::{KeyStoreConfig, StorageBackend};
use crate::error::{Error, GenerationFailure, ProviderStatus, Result, RetagFailure};
use crate::keys::{KeyHandle, KeyId, KeyKind, KeyMaterial, KeyPair, KeyRecord};
use crate::provider::{CryptoProvider, RsaProvider};
use crate::storage::{FilePersistence, MemoryPersistence, SecurePersistence};

#[cfg(feature = "secure-storage")]
use secrecy::SecretString;

/// 密钥库门面
///
/// 克隆开销很小，克隆体共享同一组提供者与持久化后端。
#[derive(Clone)]
pub struct KeyStore {
    provider: Arc<dyn CryptoProvider>,
    persistence: Arc<dyn SecurePersistence>,
}

impl KeyStore {
    /// 以给定的提供者和持久化后端创建密钥库
    pub fn new(
        provider: Arc<dyn CryptoProvider>,
        persistence: Arc<dyn SecurePersistence>,
    ) -> Self {
        Self {
            provider,
            persistence,
        }
    }

    /// 默认 RSA 提供者加内存持久化
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(RsaProvider::default()),
            Arc::new(MemoryPersistence::new()),
        )
    }

    /// 按配置组装密钥库。`password` 仅对文件后端生效，用于加密私钥。
    #[cfg(feature = "secure-storage")]
    pub fn from_config(config: &KeyStoreConfig, password: Option<SecretString>) -> Result<Self> {
        config.validate()?;
        let persistence: Arc<dyn SecurePersistence> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(
                MemoryPersistence::new().with_unique_tags(config.storage.unique_tags),
            ),
            StorageBackend::File => {
                let mut store = FilePersistence::from_config(&config.storage)?;
                if let Some(password) = password {
                    store = store.with_password(password, config.storage.kdf.clone());
                }
                Arc::new(store)
            }
        };
        Ok(Self::from_parts(config, persistence))
    }

    /// 按配置组装密钥库
    #[cfg(not(feature = "secure-storage"))]
    pub fn from_config(config: &KeyStoreConfig) -> Result<Self> {
        config.validate()?;
        let persistence: Arc<dyn SecurePersistence> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(
                MemoryPersistence::new().with_unique_tags(config.storage.unique_tags),
            ),
            StorageBackend::File => Arc::new(FilePersistence::from_config(&config.storage)?),
        };
        Ok(Self::from_parts(config, persistence))
    }

    fn from_parts(config: &KeyStoreConfig, persistence: Arc<dyn SecurePersistence>) -> Self {
        Self::new(Arc::new(RsaProvider::new(&config.crypto)), persistence)
    }

    /// 生成一个 RSA 密钥对，并在返回前将两半都持久化到 `tag` 下。
    ///
    /// 调用是同步且阻塞的；大尺寸密钥的生成可能需要数百毫秒。
    ///
    /// # 错误
    ///
    /// * `KeyGeneration(Provider(status))` - 提供者拒绝生成（例如尺寸不受支持），
    ///   或持久化后端拒绝保存（例如标签唯一时的 `DUPLICATE_ITEM`）。空标签返回
    ///   `INVALID_PARAMETER`。
    /// * `KeyGeneration(MissingHandles)` - 提供者报告成功却没有同时交回两半。
    pub fn generate_key_pair(&self, size_in_bits: usize, tag: &str) -> Result<KeyPair> {
        if tag.is_empty() {
            return Err(GenerationFailure::Provider(ProviderStatus::INVALID_PARAMETER).into());
        }

        let generated = self.provider.generate(size_in_bits).map_err(|status| {
            warn!(tag, bits = size_in_bits, %status, "key generation rejected by provider");
            GenerationFailure::Provider(status)
        })?;
        let (Some(private), Some(public)) = (generated.private, generated.public) else {
            warn!(tag, bits = size_in_bits, "provider returned success without both key halves");
            return Err(GenerationFailure::MissingHandles.into());
        };

        let permanent = self.persistence.is_durable();
        let algorithm = self.provider.algorithm();
        let bits = generated.size_in_bits;
        let private_handle = KeyHandle::new(KeyId::new(), KeyKind::Private, algorithm, bits, permanent);
        let public_handle = KeyHandle::new(KeyId::new(), KeyKind::Public, algorithm, bits, permanent);

        let pair_id = Uuid::new_v4();
        let created_at = Utc::now();
        let private_record = KeyRecord {
            handle: private_handle.clone(),
            tag: tag.to_string(),
            pair_id,
            created_at,
            material: KeyMaterial::Private(private),
        };
        let public_record = KeyRecord {
            handle: public_handle.clone(),
            tag: tag.to_string(),
            pair_id,
            created_at,
            material: KeyMaterial::Public(public),
        };

        self.persistence
            .store_pair(private_record, public_record)
            .map_err(|status| {
                warn!(tag, bits, %status, "persisting generated key pair failed");
                GenerationFailure::Provider(status)
            })?;

        info!(
            tag,
            bits,
            private_key = %private_handle.id(),
            public_key = %public_handle.id(),
            "generated key pair"
        );
        Ok(KeyPair::new(private_handle, public_handle))
    }

    /// 以提供者的默认尺寸生成密钥对
    pub fn generate_default_key_pair(&self, tag: &str) -> Result<KeyPair> {
        self.generate_key_pair(self.provider.default_size_in_bits(), tag)
    }

    /// 在 tokio 的阻塞线程池上生成密钥对，语义与 [`generate_key_pair`](Self::generate_key_pair) 相同
    #[cfg(feature = "async")]
    pub async fn generate_key_pair_async(
        &self,
        size_in_bits: usize,
        tag: impl Into<String>,
    ) -> Result<KeyPair> {
        let store = self.clone();
        let tag = tag.into();
        tokio::task::spawn_blocking(move || store.generate_key_pair(size_in_bits, &tag)).await?
    }

    /// 将单个密钥改挂到 `new_tag` 下。
    ///
    /// 先查找密钥当前的标签；找不到则直接返回 `Retag(NotTracked)`，不会尝试更新。
    /// 只修改标签属性。
    pub fn retag_key(&self, handle: &KeyHandle, new_tag: &str) -> Result<()> {
        let Some(current) = self.persistence.tag_of(handle.id()) else {
            debug!(key = %handle.id(), "retag requested for untracked key");
            return Err(RetagFailure::NotTracked.into());
        };
        if new_tag.is_empty() {
            return Err(RetagFailure::Provider(ProviderStatus::INVALID_PARAMETER).into());
        }

        self.persistence
            .update_tag(handle.id(), new_tag)
            .map_err(|status| {
                warn!(key = %handle.id(), from = %current, to = new_tag, %status, "retag rejected");
                RetagFailure::Provider(status)
            })?;

        info!(key = %handle.id(), from = %current, to = new_tag, "retagged key");
        Ok(())
    }

    /// 将密钥对的两半一起改挂到 `new_tag` 下。
    ///
    /// 先改私钥再改公钥；若公钥更新失败，私钥会被尽力恢复到原标签。
    pub fn retag_key_pair(&self, pair: &KeyPair, new_tag: &str) -> Result<()> {
        let private = pair.private_key();
        let previous = self.persistence.tag_of(private.id());

        self.retag_key(private, new_tag)?;
        if let Err(err) = self.retag_key(pair.public_key(), new_tag) {
            if let Some(previous) = previous {
                if let Err(status) = self.persistence.update_tag(private.id(), &previous) {
                    warn!(key = %private.id(), %status, "could not restore private key tag");
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// 密钥的块大小（字节），用于为后续的密码学操作分配缓冲区
    pub fn block_size(&self, handle: &KeyHandle) -> usize {
        self.provider.block_size(handle)
    }

    /// 单块加密允许的最大明文长度
    pub fn max_plaintext_len(&self, handle: &KeyHandle) -> usize {
        self.block_size(handle)
            .saturating_sub(self.provider.padding_overhead())
    }

    /// 密钥当前的标签；未被追踪的密钥返回 `None`
    pub fn tag_of(&self, handle: &KeyHandle) -> Option<String> {
        self.persistence.tag_of(handle.id())
    }

    pub fn contains(&self, handle: &KeyHandle) -> bool {
        self.tag_of(handle).is_some()
    }

    /// 标签下所有密钥的句柄，按创建时间排序
    pub fn find_keys(&self, tag: &str) -> Result<Vec<KeyHandle>> {
        self.persistence.find_by_tag(tag).map_err(Error::Persistence)
    }

    /// 删除标签下的所有密钥，返回删除的数量
    pub fn delete_keys(&self, tag: &str) -> Result<usize> {
        let removed = self
            .persistence
            .delete_by_tag(tag)
            .map_err(Error::Persistence)?;
        info!(tag, removed, "deleted keys");
        Ok(removed)
    }

    /// 使用公钥加密单个数据块
    pub fn encrypt(&self, public_key: &KeyHandle, plaintext: &[u8]) -> Result<Vec<u8>> {
        let material = self.load_material(public_key, KeyKind::Public)?;
        self.provider.encrypt(material.as_bytes(), plaintext)
    }

    /// 使用私钥解密单个数据块
    pub fn decrypt(&self, private_key: &KeyHandle, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let material = self.load_material(private_key, KeyKind::Private)?;
        self.provider.decrypt(material.as_bytes(), ciphertext)
    }

    pub fn sign(&self, private_key: &KeyHandle, message: &[u8]) -> Result<Vec<u8>> {
        let material = self.load_material(private_key, KeyKind::Private)?;
        self.provider.sign(material.as_bytes(), message)
    }

    pub fn verify(&self, public_key: &KeyHandle, message: &[u8], signature: &[u8]) -> Result<()> {
        let material = self.load_material(public_key, KeyKind::Public)?;
        self.provider.verify(material.as_bytes(), message, signature)
    }

    /// 将公钥导出为 PEM
    pub fn export_public_key_pem(&self, public_key: &KeyHandle) -> Result<String> {
        let material = self.load_material(public_key, KeyKind::Public)?;
        self.provider.export_public_pem(material.as_bytes())
    }

    /// 为单次调用加载密钥材料；返回值离开作用域时私钥被清零
    fn load_material(&self, handle: &KeyHandle, expected: KeyKind) -> Result<KeyMaterial> {
        if handle.kind() != expected {
            return Err(Error::WrongKeyKind {
                expected,
                actual: handle.kind(),
            });
        }
        let record = self.persistence.load(handle.id()).map_err(|status| {
            if status == ProviderStatus::ITEM_NOT_FOUND {
                Error::KeyNotFound(*handle.id())
            } else {
                Error::Persistence(status)
            }
        })?;
        // 句柄可由调用方自行构造，以存储的记录为准
        if record.material.kind() != expected {
            return Err(Error::WrongKeyKind {
                expected,
                actual: record.material.kind(),
            });
        }
        Ok(record.material)
    }
}
