//! Defines the cryptographic provider boundary.
// 中文: 定义加密提供者的边界。

pub mod rsa;

use crate::common::utils::ZeroizingVec;
use crate::error::{ProviderStatus, Result};
use crate::keys::{Algorithm, KeyHandle};

pub use self::rsa::RsaProvider;

/// The outcome of a successful generation call.
///
/// Either half may be missing when a provider backed by an external service reports
/// success without handing back usable material; `KeyStore` treats that as a contract
/// violation.
///
/// 中文: 一次成功生成调用的结果。任一半都可能缺失，`KeyStore` 将其视为违反约定。
#[derive(Clone, Debug)]
pub struct GeneratedKeys {
    /// Actual modulus size of the generated keys.
    pub size_in_bits: usize,
    /// PKCS#8 DER.
    pub private: Option<ZeroizingVec>,
    /// SPKI DER.
    pub public: Option<Vec<u8>>,
}

/// Performs key generation and the low-level operations on generated keys.
///
/// Implementations do the actual cryptography; `KeyStore` only orchestrates.
/// Key material is passed in per call and never retained.
///
/// 中文: 负责密钥生成以及对已生成密钥的底层操作。实现方完成实际的密码学运算，
/// `KeyStore` 只负责编排。密钥材料按调用传入，不会被保留。
pub trait CryptoProvider: Send + Sync {
    /// The algorithm of every key this provider generates.
    fn algorithm(&self) -> Algorithm;

    /// Generates a fresh key pair of the requested size.
    ///
    /// Unsupported sizes are rejected with a status rather than clamped.
    fn generate(&self, size_in_bits: usize) -> Result<GeneratedKeys, ProviderStatus>;

    /// The key size used when the caller does not ask for one.
    fn default_size_in_bits(&self) -> usize;

    /// Block size of the key in bytes. Infallible for a valid handle.
    fn block_size(&self, handle: &KeyHandle) -> usize;

    /// Bytes of padding overhead the provider's encryption scheme consumes per block.
    fn padding_overhead(&self) -> usize;

    fn encrypt(&self, public_der: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, private_der: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;

    fn sign(&self, private_der: &[u8], message: &[u8]) -> Result<Vec<u8>>;

    fn verify(&self, public_der: &[u8], message: &[u8], signature: &[u8]) -> Result<()>;

    /// Exports a public key in PEM form.
    fn export_public_pem(&self, public_der: &[u8]) -> Result<String>;
}
