use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{SecurePersistence, sort_handles};
use crate::error::ProviderStatus;
use crate::keys::{KeyHandle, KeyId, KeyRecord};

/// 进程内存中的密钥持久化，进程退出后内容丢失。
///
/// 主要用作测试替身，也可作为临时的本地密钥库。
#[derive(Default)]
pub struct MemoryPersistence {
    keys: RwLock<HashMap<KeyId, KeyRecord>>,
    unique_tags: bool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// 禁止两个密钥对共用同一标签
    pub fn with_unique_tags(mut self, unique_tags: bool) -> Self {
        self.unique_tags = unique_tags;
        self
    }

    pub fn len(&self) -> Result<usize, ProviderStatus> {
        let keys = self.keys.read().map_err(|_| ProviderStatus::INTERNAL)?;
        Ok(keys.len())
    }

    pub fn is_empty(&self) -> Result<bool, ProviderStatus> {
        Ok(self.len()? == 0)
    }
}

impl SecurePersistence for MemoryPersistence {
    fn store_pair(&self, private: KeyRecord, public: KeyRecord) -> Result<(), ProviderStatus> {
        if private.tag.is_empty() || public.tag.is_empty() {
            return Err(ProviderStatus::INVALID_PARAMETER);
        }
        let mut keys = self.keys.write().map_err(|_| ProviderStatus::INTERNAL)?;

        if keys.contains_key(private.id()) || keys.contains_key(public.id()) {
            return Err(ProviderStatus::DUPLICATE_ITEM);
        }
        if self.unique_tags
            && keys
                .values()
                .any(|r| r.tag == private.tag || r.tag == public.tag)
        {
            return Err(ProviderStatus::DUPLICATE_ITEM);
        }

        keys.insert(*private.id(), private);
        keys.insert(*public.id(), public);
        Ok(())
    }

    fn tag_of(&self, id: &KeyId) -> Option<String> {
        let keys = self.keys.read().ok()?;
        keys.get(id).map(|r| r.tag.clone())
    }

    fn update_tag(&self, id: &KeyId, new_tag: &str) -> Result<(), ProviderStatus> {
        if new_tag.is_empty() {
            return Err(ProviderStatus::INVALID_PARAMETER);
        }
        let mut keys = self.keys.write().map_err(|_| ProviderStatus::INTERNAL)?;

        let pair_id = keys
            .get(id)
            .map(|r| r.pair_id)
            .ok_or(ProviderStatus::ITEM_NOT_FOUND)?;
        if self.unique_tags
            && keys
                .values()
                .any(|r| r.tag == new_tag && r.pair_id != pair_id)
        {
            return Err(ProviderStatus::DUPLICATE_ITEM);
        }

        let record = keys.get_mut(id).ok_or(ProviderStatus::ITEM_NOT_FOUND)?;
        record.tag = new_tag.to_string();
        Ok(())
    }

    fn find_by_tag(&self, tag: &str) -> Result<Vec<KeyHandle>, ProviderStatus> {
        if tag.is_empty() {
            return Err(ProviderStatus::INVALID_PARAMETER);
        }
        let keys = self.keys.read().map_err(|_| ProviderStatus::INTERNAL)?;
        let entries = keys
            .values()
            .filter(|r| r.tag == tag)
            .map(|r| (r.created_at, r.handle.clone()))
            .collect();
        Ok(sort_handles(entries))
    }

    fn load(&self, id: &KeyId) -> Result<KeyRecord, ProviderStatus> {
        let keys = self.keys.read().map_err(|_| ProviderStatus::INTERNAL)?;
        keys.get(id).cloned().ok_or(ProviderStatus::ITEM_NOT_FOUND)
    }

    fn delete_by_tag(&self, tag: &str) -> Result<usize, ProviderStatus> {
        if tag.is_empty() {
            return Err(ProviderStatus::INVALID_PARAMETER);
        }
        let mut keys = self.keys.write().map_err(|_| ProviderStatus::INTERNAL)?;
        let before = keys.len();
        keys.retain(|_, r| r.tag != tag);
        Ok(before - keys.len())
    }

    fn is_durable(&self) -> bool {
        false
    }
}
