//! 通用模块，包含配置和工具函数

pub mod config;
pub mod utils;

pub use self::config::{CryptoConfig, KdfConfig, KeyStoreConfig, StorageBackend, StorageConfig};
pub use self::utils::{ZeroizingVec, from_base64, to_base64};
