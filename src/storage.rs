//! The storage module, defining how key records are persisted.
// 中文: 存储模块，定义密钥记录如何持久化。

pub mod file;
pub mod memory;
pub mod traits;

#[cfg(feature = "secure-storage")]
pub mod container;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;
pub use traits::SecurePersistence;

#[cfg(feature = "secure-storage")]
pub use container::EncryptedKeyContainer;
