//! Defines the error types for the `seal-keychain` crate.
// 中文: 定义 `seal-keychain` 的错误类型。

use crate::keys::{KeyId, KeyKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A status code reported by a crypto provider or a persistence backend.
///
/// Numeric values follow the OSStatus convention used by platform keychains, so a
/// backend that wraps a native keystore can pass its codes through unchanged.
///
/// 中文: 由加密提供者或持久化后端返回的状态码。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderStatus(pub i32);

impl ProviderStatus {
    pub const SUCCESS: Self = Self(0);
    pub const UNIMPLEMENTED: Self = Self(-4);
    pub const IO: Self = Self(-36);
    pub const INVALID_PARAMETER: Self = Self(-50);
    pub const AUTH_FAILED: Self = Self(-25293);
    pub const DUPLICATE_ITEM: Self = Self(-25299);
    pub const ITEM_NOT_FOUND: Self = Self(-25300);
    pub const DECODE: Self = Self(-26275);
    pub const INTERNAL: Self = Self(-26276);
    pub const UNSUPPORTED_KEY_SIZE: Self = Self(-67735);

    /// The raw numeric code.
    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::SUCCESS => "success",
            Self::UNIMPLEMENTED => "unimplemented",
            Self::IO => "io",
            Self::INVALID_PARAMETER => "invalid parameter",
            Self::AUTH_FAILED => "authentication failed",
            Self::DUPLICATE_ITEM => "duplicate item",
            Self::ITEM_NOT_FOUND => "item not found",
            Self::DECODE => "decode",
            Self::INTERNAL => "internal",
            Self::UNSUPPORTED_KEY_SIZE => "unsupported key size",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

/// Why a key-pair generation did not produce a `KeyPair`.
///
/// 中文: 密钥对生成失败的原因。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    /// The provider or the persistence rejected the request with a status.
    #[error("provider returned {0}")]
    Provider(ProviderStatus),

    /// The provider reported success but did not hand back both halves.
    #[error("provider reported success without returning both key halves")]
    MissingHandles,
}

/// Why a retag did not take effect.
///
/// 中文: 重新标记失败的原因。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RetagFailure {
    /// The update call itself failed.
    #[error("update rejected with {0}")]
    Provider(ProviderStatus),

    /// The handle has no discoverable tag: it was never persisted in this store, or it was deleted.
    #[error("key is not tracked by the store")]
    NotTracked,
}

/// The main error type for the `seal-keychain` crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("key generation failed: {0}")]
    KeyGeneration(#[from] GenerationFailure),

    #[error("retag failed: {0}")]
    Retag(#[from] RetagFailure),

    #[error("persistence error: {0}")]
    Persistence(ProviderStatus),

    #[error("key not found with id: {0}")]
    KeyNotFound(KeyId),

    #[error("expected a {expected} key, got a {actual} key")]
    WrongKeyKind { expected: KeyKind, actual: KeyKind },

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("serialization error (JSON)")]
    Json(#[from] serde_json::Error),

    #[error("decoding from Base64 failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[cfg(feature = "async")]
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// The provider status carried by this error, if any.
    pub fn status(&self) -> Option<ProviderStatus> {
        match self {
            Error::KeyGeneration(GenerationFailure::Provider(status))
            | Error::Retag(RetagFailure::Provider(status))
            | Error::Persistence(status) => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_status_displays_name_and_code() {
        assert_eq!(
            ProviderStatus::DUPLICATE_ITEM.to_string(),
            "duplicate item (-25299)"
        );
        assert_eq!(ProviderStatus(42).to_string(), "status 42");
        assert!(ProviderStatus::SUCCESS.is_success());
    }

    #[test]
    fn status_is_only_present_for_provider_failures() {
        let err: Error = GenerationFailure::MissingHandles.into();
        assert_eq!(err.status(), None);

        let err: Error = RetagFailure::NotTracked.into();
        assert_eq!(err.status(), None);

        let err: Error = GenerationFailure::Provider(ProviderStatus::INVALID_PARAMETER).into();
        assert_eq!(err.status(), Some(ProviderStatus::INVALID_PARAMETER));
    }
}
