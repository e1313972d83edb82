//! An encrypted container for password-protected private key storage.
// 中文: 用于口令保护私钥存储的加密容器。

use crate::common::config::KdfConfig;
use crate::common::utils::{from_base64, to_base64};
use aes_gcm::aead::{Aead, KeyInit, OsRng as AeadOsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use argon2::{Argon2, Params, Version};
use chrono::Utc;
use rand_core::{OsRng, TryRngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const SALT_SIZE: usize = 16;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("random number generation failed: {0}")]
    Rng(#[from] rand_core::OsError),

    #[error("encryption failed")]
    Encryption,

    /// Wrong password or tampered ciphertext; AES-GCM cannot tell them apart.
    #[error("decryption failed")]
    Decryption,

    #[error("container is malformed: {0}")]
    Malformed(String),

    #[error("decoding from Base64 failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("serialization error (JSON)")]
    Json(#[from] serde_json::Error),
}

/// An encrypted container for storing a key, protected by a user-provided password.
///
/// A wrapping key is derived from the password with Argon2id, and the key data is
/// sealed with AES-256-GCM. The algorithm id is bound as associated data, so a
/// container cannot be relabelled without failing authentication.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EncryptedKeyContainer {
    /// Base64-encoded AES-GCM ciphertext (including the tag).
    encrypted_data: String,

    /// Base64-encoded 96-bit nonce.
    nonce: String,

    /// Base64-encoded salt used for Argon2 key derivation.
    salt: String,

    /// Algorithm identifier of the key being stored.
    algorithm_id: String,

    /// Creation timestamp in ISO 8601 format.
    created_at: String,

    /// Argon2 memory cost parameter (in KiB).
    #[serde(default = "default_memory_cost")]
    memory_cost: u32,

    /// Argon2 time cost parameter (number of iterations).
    #[serde(default = "default_time_cost")]
    time_cost: u32,

    /// Argon2 parallelism cost parameter.
    #[serde(default = "default_parallelism_cost")]
    parallelism_cost: u32,
}

fn default_memory_cost() -> u32 {
    KdfConfig::default().memory_cost
}
fn default_time_cost() -> u32 {
    KdfConfig::default().time_cost
}
fn default_parallelism_cost() -> u32 {
    KdfConfig::default().parallelism
}

impl EncryptedKeyContainer {
    /// Creates a new encrypted key container with default Argon2 parameters.
    pub fn new<K: AsRef<[u8]>>(
        password: &SecretString,
        key_data: K,
        algorithm_id: &str,
    ) -> Result<Self, ContainerError> {
        Self::new_with_params(password, key_data, algorithm_id, &KdfConfig::default())
    }

    /// Creates a new encrypted key container with custom Argon2 parameters.
    pub fn new_with_params<K: AsRef<[u8]>>(
        password: &SecretString,
        key_data: K,
        algorithm_id: &str,
        kdf: &KdfConfig,
    ) -> Result<Self, ContainerError> {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.try_fill_bytes(&mut salt)?;

        let wrapping_key = derive_wrapping_key(
            password,
            &salt,
            kdf.memory_cost,
            kdf.time_cost,
            kdf.parallelism,
        )?;
        let cipher = Aes256Gcm::new_from_slice(wrapping_key.as_slice())
            .map_err(|e| ContainerError::Kdf(e.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut AeadOsRng);
        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: key_data.as_ref(),
                    aad: algorithm_id.as_bytes(),
                },
            )
            .map_err(|_| ContainerError::Encryption)?;

        Ok(Self {
            encrypted_data: to_base64(&ciphertext),
            nonce: to_base64(nonce.as_slice()),
            salt: to_base64(&salt),
            algorithm_id: algorithm_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
            memory_cost: kdf.memory_cost,
            time_cost: kdf.time_cost,
            parallelism_cost: kdf.parallelism,
        })
    }

    /// Decrypts and returns the raw key bytes from the container.
    pub fn get_key(&self, password: &SecretString) -> Result<Zeroizing<Vec<u8>>, ContainerError> {
        let salt = from_base64(&self.salt)?;
        let nonce_bytes = from_base64(&self.nonce)?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(ContainerError::Malformed(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                nonce_bytes.len()
            )));
        }
        let ciphertext = from_base64(&self.encrypted_data)?;

        let wrapping_key = derive_wrapping_key(
            password,
            &salt,
            self.memory_cost,
            self.time_cost,
            self.parallelism_cost,
        )?;
        let cipher = Aes256Gcm::new_from_slice(wrapping_key.as_slice())
            .map_err(|e| ContainerError::Kdf(e.to_string()))?;
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &ciphertext,
                    aad: self.algorithm_id.as_bytes(),
                },
            )
            .map_err(|_| ContainerError::Decryption)?;

        Ok(Zeroizing::new(plaintext))
    }

    pub fn algorithm_id(&self) -> &str {
        &self.algorithm_id
    }

    /// Serializes the container to a JSON string.
    pub fn to_json(&self) -> Result<String, ContainerError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes a container from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ContainerError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn derive_wrapping_key(
    password: &SecretString,
    salt: &[u8],
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
) -> Result<Zeroizing<[u8; KEY_SIZE]>, ContainerError> {
    let params = Params::new(memory_cost, time_cost, parallelism, Some(KEY_SIZE))
        .map_err(|e| ContainerError::Kdf(e.to_string()))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, key.as_mut_slice())
        .map_err(|e| ContainerError::Kdf(e.to_string()))?;
    Ok(key)
}
