//! # Seal-Keychain: a tag-addressed RSA key store
//!
//! `seal-keychain` generates RSA key pairs, persists both halves under an
//! application-chosen tag, and lets callers find, retag, and use them later.
//!
//! The crate is organised around a thin facade and two injected collaborators:
//!
//! - **`KeyStore`**: the facade. Holds no key state of its own.
//! - **`CryptoProvider`**: performs the actual generation and key operations.
//!   `RsaProvider` is the built-in implementation.
//! - **`SecurePersistence`**: stores key records addressed by tag.
//!   `MemoryPersistence` and `FilePersistence` are provided; the file backend can
//!   seal private keys under a password.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seal_keychain::{KeyStore, Result};
//!
//! fn main() -> Result<()> {
//!     let store = KeyStore::in_memory();
//!     let pair = store.generate_key_pair(2048, "com.example.session")?;
//!
//!     assert_eq!(store.block_size(pair.public_key()), 256);
//!
//!     let ciphertext = store.encrypt(pair.public_key(), b"hello")?;
//!     let plaintext = store.decrypt(pair.private_key(), &ciphertext)?;
//!     assert_eq!(plaintext, b"hello");
//!
//!     store.retag_key_pair(&pair, "com.example.archived")?;
//!     Ok(())
//! }
//! ```

pub mod common;
pub mod error;
pub mod keys;
pub mod keystore;
pub mod provider;
pub mod storage;

pub use common::config::{CryptoConfig, KdfConfig, KeyStoreConfig, StorageBackend, StorageConfig};
pub use error::{Error, GenerationFailure, ProviderStatus, Result, RetagFailure};
pub use keys::{Algorithm, KeyHandle, KeyId, KeyKind, KeyPair};
pub use keystore::KeyStore;
pub use provider::{CryptoProvider, GeneratedKeys, RsaProvider};
pub use storage::{FilePersistence, MemoryPersistence, SecurePersistence};

#[cfg(feature = "secure-storage")]
pub use secrecy::SecretString;

/// The version of the `seal-keychain` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
