use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::traits::{SecurePersistence, sort_handles};
use crate::common::config::StorageConfig;
use crate::common::utils::{ZeroizingVec, from_base64, to_base64};
use crate::error::ProviderStatus;
use crate::keys::{KeyHandle, KeyId, KeyMaterial, KeyRecord};

#[cfg(feature = "secure-storage")]
use super::container::{ContainerError, EncryptedKeyContainer};
#[cfg(feature = "secure-storage")]
use crate::common::config::KdfConfig;
#[cfg(feature = "secure-storage")]
use secrecy::SecretString;

const KEY_FILE_EXTENSION: &str = "json";
#[cfg(feature = "secure-storage")]
const SEALED_ALGORITHM_ID: &str = "rsa-pkcs8";

/// 磁盘上单个密钥文件的格式
#[derive(Serialize, Deserialize)]
struct StoredKeyFile {
    handle: KeyHandle,
    tag: String,
    pair_id: Uuid,
    created_at: DateTime<Utc>,
    material: StoredMaterial,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
enum StoredMaterial {
    /// Base64 编码的 SPKI DER
    Public { der: String },
    /// Base64 编码的 PKCS#8 DER，未加密
    Private { der: String },
    /// 以口令加密的 PKCS#8 DER
    #[cfg(feature = "secure-storage")]
    Sealed { container: EncryptedKeyContainer },
}

/// 元数据缓存项，不包含任何密钥材料
#[derive(Clone)]
struct CachedEntry {
    handle: KeyHandle,
    tag: String,
    pair_id: Uuid,
    created_at: DateTime<Utc>,
}

#[cfg(feature = "secure-storage")]
struct Sealing {
    password: SecretString,
    kdf: KdfConfig,
}

/// 密钥文件存储
///
/// 每个密钥保存为目录下的一个 `<key-id>.json` 文件，写入通过临时文件加重命名完成。
/// 打开时扫描目录建立元数据缓存；密钥材料只在 `load` 时从磁盘读取。
/// 设置口令后，私钥以 [`EncryptedKeyContainer`] 形式加密保存。
pub struct FilePersistence {
    /// 密钥存储目录
    storage_dir: PathBuf,
    /// 元数据缓存
    metadata_cache: DashMap<KeyId, CachedEntry>,
    /// 串行化所有修改，使检查与写入成为一个原子步骤
    write_lock: Mutex<()>,
    unique_tags: bool,
    file_permissions: u32,
    #[cfg(feature = "secure-storage")]
    sealing: Option<Sealing>,
}

impl FilePersistence {
    /// 打开（必要时创建）密钥存储目录
    ///
    /// # 参数
    ///
    /// * `storage_dir` - 存储密钥文件的目录
    pub fn open<P: AsRef<Path>>(storage_dir: P) -> io::Result<Self> {
        let path = storage_dir.as_ref().to_path_buf();

        // 确保目录存在
        fs::create_dir_all(&path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("无法创建密钥存储目录 {}: {}", path.display(), e),
            )
        })?;

        let store = Self {
            storage_dir: path,
            metadata_cache: DashMap::new(),
            write_lock: Mutex::new(()),
            unique_tags: false,
            file_permissions: 0o600,
            #[cfg(feature = "secure-storage")]
            sealing: None,
        };
        store.rebuild_cache()?;
        Ok(store)
    }

    /// 根据存储配置打开目录，并应用标签唯一性和文件权限
    pub fn from_config(config: &StorageConfig) -> io::Result<Self> {
        Ok(Self::open(&config.key_storage_dir)?
            .with_unique_tags(config.unique_tags)
            .with_file_permissions(config.file_permissions))
    }

    pub fn with_unique_tags(mut self, unique_tags: bool) -> Self {
        self.unique_tags = unique_tags;
        self
    }

    pub fn with_file_permissions(mut self, mode: u32) -> Self {
        self.file_permissions = mode;
        self
    }

    /// 之后写入的私钥将以该口令加密保存
    #[cfg(feature = "secure-storage")]
    pub fn with_password(mut self, password: SecretString, kdf: KdfConfig) -> Self {
        self.sealing = Some(Sealing { password, kdf });
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn key_path(&self, id: &KeyId) -> PathBuf {
        self.storage_dir
            .join(format!("{}.{}", id, KEY_FILE_EXTENSION))
    }

    fn rebuild_cache(&self) -> io::Result<()> {
        self.metadata_cache.clear();
        for entry in fs::read_dir(&self.storage_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(KEY_FILE_EXTENSION) {
                continue;
            }
            match read_key_file(&path) {
                Ok(file) => {
                    self.metadata_cache.insert(
                        *file.handle.id(),
                        CachedEntry {
                            handle: file.handle,
                            tag: file.tag,
                            pair_id: file.pair_id,
                            created_at: file.created_at,
                        },
                    );
                }
                Err(status) => {
                    warn!(path = %path.display(), %status, "skipping unreadable key file");
                }
            }
        }
        debug!(
            dir = %self.storage_dir.display(),
            keys = self.metadata_cache.len(),
            "loaded key metadata"
        );
        Ok(())
    }

    fn tag_in_use(&self, tag: &str, except_pair: Option<Uuid>) -> bool {
        self.metadata_cache
            .iter()
            .any(|entry| entry.tag == tag && Some(entry.pair_id) != except_pair)
    }

    fn encode(&self, record: &KeyRecord) -> Result<StoredKeyFile, ProviderStatus> {
        let material = match &record.material {
            KeyMaterial::Public(der) => StoredMaterial::Public { der: to_base64(der) },
            KeyMaterial::Private(der) => self.encode_private(der)?,
        };
        Ok(StoredKeyFile {
            handle: record.handle.clone(),
            tag: record.tag.clone(),
            pair_id: record.pair_id,
            created_at: record.created_at,
            material,
        })
    }

    #[cfg(feature = "secure-storage")]
    fn encode_private(&self, der: &[u8]) -> Result<StoredMaterial, ProviderStatus> {
        match &self.sealing {
            Some(sealing) => {
                let container = EncryptedKeyContainer::new_with_params(
                    &sealing.password,
                    der,
                    SEALED_ALGORITHM_ID,
                    &sealing.kdf,
                )
                .map_err(|e| {
                    warn!(error = %e, "sealing private key failed");
                    ProviderStatus::INTERNAL
                })?;
                Ok(StoredMaterial::Sealed { container })
            }
            None => Ok(StoredMaterial::Private { der: to_base64(der) }),
        }
    }

    #[cfg(not(feature = "secure-storage"))]
    fn encode_private(&self, der: &[u8]) -> Result<StoredMaterial, ProviderStatus> {
        Ok(StoredMaterial::Private { der: to_base64(der) })
    }

    fn decode(&self, file: StoredKeyFile) -> Result<KeyRecord, ProviderStatus> {
        let material = match file.material {
            StoredMaterial::Public { der } => {
                KeyMaterial::Public(from_base64(&der).map_err(|_| ProviderStatus::DECODE)?)
            }
            StoredMaterial::Private { der } => KeyMaterial::Private(ZeroizingVec(
                from_base64(&der).map_err(|_| ProviderStatus::DECODE)?,
            )),
            #[cfg(feature = "secure-storage")]
            StoredMaterial::Sealed { container } => {
                let sealing = self.sealing.as_ref().ok_or(ProviderStatus::AUTH_FAILED)?;
                let der = container
                    .get_key(&sealing.password)
                    .map_err(container_status)?;
                KeyMaterial::Private(ZeroizingVec(der.to_vec()))
            }
        };
        Ok(KeyRecord {
            handle: file.handle,
            tag: file.tag,
            pair_id: file.pair_id,
            created_at: file.created_at,
            material,
        })
    }

    /// 写入临时文件并设置权限，返回临时文件路径
    fn write_temp(&self, path: &Path, file: &StoredKeyFile) -> Result<PathBuf, ProviderStatus> {
        let json = serde_json::to_vec_pretty(file).map_err(|_| ProviderStatus::INTERNAL)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json).map_err(io_status)?;
        self.apply_permissions(&temp_path).map_err(io_status)?;
        Ok(temp_path)
    }

    /// 原子写入，防止在写入中断时数据损坏
    fn write_atomic(&self, path: &Path, file: &StoredKeyFile) -> Result<(), ProviderStatus> {
        let temp_path = self.write_temp(path, file)?;
        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            io_status(e)
        })
    }

    #[cfg(unix)]
    fn apply_permissions(&self, path: &Path) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(self.file_permissions))
    }

    #[cfg(not(unix))]
    fn apply_permissions(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

impl SecurePersistence for FilePersistence {
    fn store_pair(&self, private: KeyRecord, public: KeyRecord) -> Result<(), ProviderStatus> {
        if private.tag.is_empty() || public.tag.is_empty() {
            return Err(ProviderStatus::INVALID_PARAMETER);
        }
        let _guard = self.write_lock.lock().map_err(|_| ProviderStatus::INTERNAL)?;

        if self.metadata_cache.contains_key(private.id())
            || self.metadata_cache.contains_key(public.id())
        {
            return Err(ProviderStatus::DUPLICATE_ITEM);
        }
        if self.unique_tags
            && (self.tag_in_use(&private.tag, None) || self.tag_in_use(&public.tag, None))
        {
            return Err(ProviderStatus::DUPLICATE_ITEM);
        }

        let private_path = self.key_path(private.id());
        let public_path = self.key_path(public.id());
        let private_file = self.encode(&private)?;
        let public_file = self.encode(&public)?;

        // 两个临时文件都写好之后才落盘，任何一步失败都回滚
        let private_temp = self.write_temp(&private_path, &private_file)?;
        let public_temp = match self.write_temp(&public_path, &public_file) {
            Ok(path) => path,
            Err(status) => {
                let _ = fs::remove_file(&private_temp);
                return Err(status);
            }
        };
        if let Err(e) = fs::rename(&private_temp, &private_path) {
            let _ = fs::remove_file(&private_temp);
            let _ = fs::remove_file(&public_temp);
            return Err(io_status(e));
        }
        if let Err(e) = fs::rename(&public_temp, &public_path) {
            let _ = fs::remove_file(&private_path);
            let _ = fs::remove_file(&public_temp);
            return Err(io_status(e));
        }

        for record in [&private, &public] {
            self.metadata_cache.insert(
                *record.id(),
                CachedEntry {
                    handle: record.handle.clone(),
                    tag: record.tag.clone(),
                    pair_id: record.pair_id,
                    created_at: record.created_at,
                },
            );
        }
        Ok(())
    }

    fn tag_of(&self, id: &KeyId) -> Option<String> {
        self.metadata_cache.get(id).map(|entry| entry.tag.clone())
    }

    fn update_tag(&self, id: &KeyId, new_tag: &str) -> Result<(), ProviderStatus> {
        if new_tag.is_empty() {
            return Err(ProviderStatus::INVALID_PARAMETER);
        }
        let _guard = self.write_lock.lock().map_err(|_| ProviderStatus::INTERNAL)?;

        let pair_id = self
            .metadata_cache
            .get(id)
            .map(|entry| entry.pair_id)
            .ok_or(ProviderStatus::ITEM_NOT_FOUND)?;
        if self.unique_tags && self.tag_in_use(new_tag, Some(pair_id)) {
            return Err(ProviderStatus::DUPLICATE_ITEM);
        }

        // 只改写标签字段，密钥材料原样保留（无需解密）
        let path = self.key_path(id);
        let mut file = read_key_file(&path)?;
        file.tag = new_tag.to_string();
        self.write_atomic(&path, &file)?;

        if let Some(mut entry) = self.metadata_cache.get_mut(id) {
            entry.tag = new_tag.to_string();
        }
        Ok(())
    }

    fn find_by_tag(&self, tag: &str) -> Result<Vec<KeyHandle>, ProviderStatus> {
        if tag.is_empty() {
            return Err(ProviderStatus::INVALID_PARAMETER);
        }
        let entries = self
            .metadata_cache
            .iter()
            .filter(|entry| entry.tag == tag)
            .map(|entry| (entry.created_at, entry.handle.clone()))
            .collect();
        Ok(sort_handles(entries))
    }

    fn load(&self, id: &KeyId) -> Result<KeyRecord, ProviderStatus> {
        if !self.metadata_cache.contains_key(id) {
            return Err(ProviderStatus::ITEM_NOT_FOUND);
        }
        let file = read_key_file(&self.key_path(id))?;
        self.decode(file)
    }

    fn delete_by_tag(&self, tag: &str) -> Result<usize, ProviderStatus> {
        if tag.is_empty() {
            return Err(ProviderStatus::INVALID_PARAMETER);
        }
        let _guard = self.write_lock.lock().map_err(|_| ProviderStatus::INTERNAL)?;

        let ids: Vec<KeyId> = self
            .metadata_cache
            .iter()
            .filter(|entry| entry.tag == tag)
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for id in ids {
            match fs::remove_file(self.key_path(&id)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_status(e)),
            }
            self.metadata_cache.remove(&id);
            removed += 1;
        }
        Ok(removed)
    }

    fn is_durable(&self) -> bool {
        true
    }
}

fn read_key_file(path: &Path) -> Result<StoredKeyFile, ProviderStatus> {
    let contents = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ProviderStatus::ITEM_NOT_FOUND,
        _ => io_status(e),
    })?;
    serde_json::from_slice(&contents).map_err(|_| ProviderStatus::DECODE)
}

fn io_status(err: io::Error) -> ProviderStatus {
    warn!(error = %err, "key file I/O failed");
    ProviderStatus::IO
}

#[cfg(feature = "secure-storage")]
fn container_status(err: ContainerError) -> ProviderStatus {
    match err {
        ContainerError::Decryption => ProviderStatus::AUTH_FAILED,
        ContainerError::Malformed(_) | ContainerError::Base64(_) | ContainerError::Json(_) => {
            ProviderStatus::DECODE
        }
        _ => ProviderStatus::INTERNAL,
    }
}
