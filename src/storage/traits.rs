//! Traits for abstracting key persistence.
// 中文: 用于抽象密钥持久化的 Trait。

use crate::error::ProviderStatus;
use crate::keys::{KeyHandle, KeyId, KeyRecord};

/// Defines the contract every secure key persistence backend fulfills.
///
/// Records are addressed by `KeyId` and grouped by tag. Each call is atomic on its own:
/// `store_pair` persists both halves or neither, and `update_tag` either replaces the
/// tag or leaves the record untouched. No ordering is imposed across calls.
///
/// Shared rules for implementations:
/// - empty tags are rejected with `INVALID_PARAMETER`;
/// - unknown ids are reported as `ITEM_NOT_FOUND`;
/// - when tag uniqueness is enforced, a pair stored under a tag already in use, or a key
///   retagged onto a tag held by a different pair, fails with `DUPLICATE_ITEM`.
///
/// 中文: 定义了所有安全密钥持久化后端必须履行的约定。
///
/// 记录按 `KeyId` 寻址、按标签分组。每个调用自身是原子的：`store_pair` 要么持久化两半，
/// 要么都不持久化；`update_tag` 要么替换标签，要么保持记录不变。跨调用不保证顺序。
pub trait SecurePersistence: Send + Sync + 'static {
    /// Persists both halves of a freshly generated pair under their tag.
    fn store_pair(&self, private: KeyRecord, public: KeyRecord) -> Result<(), ProviderStatus>;

    /// Returns the current tag of a tracked key, or `None` if the key is not tracked.
    fn tag_of(&self, id: &KeyId) -> Option<String>;

    /// Replaces the tag of a tracked key. No other attribute changes.
    fn update_tag(&self, id: &KeyId, new_tag: &str) -> Result<(), ProviderStatus>;

    /// Handles of every key stored under `tag`, oldest first.
    fn find_by_tag(&self, tag: &str) -> Result<Vec<KeyHandle>, ProviderStatus>;

    /// Loads the full record, including key material, for a single call's use.
    fn load(&self, id: &KeyId) -> Result<KeyRecord, ProviderStatus>;

    /// Removes every key stored under `tag` and returns how many were removed.
    fn delete_by_tag(&self, tag: &str) -> Result<usize, ProviderStatus>;

    /// Returns `true` if stored keys survive a process restart.
    fn is_durable(&self) -> bool;
}

/// Orders records the way `find_by_tag` reports them.
pub(crate) fn sort_handles(mut entries: Vec<(chrono::DateTime<chrono::Utc>, KeyHandle)>) -> Vec<KeyHandle> {
    entries.sort_by(|(a_time, a), (b_time, b)| a_time.cmp(b_time).then_with(|| a.id().cmp(b.id())));
    entries.into_iter().map(|(_, handle)| handle).collect()
}
