//! `RsaProvider` 基于 `rsa` crate 实现 [`CryptoProvider`]。
//! 加密使用 PKCS#1 v1.5，签名使用 PSS/SHA-256。

use super::{CryptoProvider, GeneratedKeys};
use crate::common::config::CryptoConfig;
use crate::common::utils::ZeroizingVec;
use crate::error::{Error, ProviderStatus, Result};
use crate::keys::{Algorithm, KeyHandle};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::pss::{Signature as PssSignature, SigningKey, VerifyingKey};
use rsa::rand_core::OsRng as RsaOsRng;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::debug;

/// PKCS#1 v1.5 加密填充的固定开销（字节）
pub const PKCS1V15_OVERHEAD: usize = 11;

/// RSA 加密提供者
///
/// 接受 `[min_bits, max_bits]` 范围内的密钥尺寸。
#[derive(Clone, Debug)]
pub struct RsaProvider {
    min_bits: usize,
    max_bits: usize,
    default_bits: usize,
}

impl RsaProvider {
    pub fn new(config: &CryptoConfig) -> Self {
        Self {
            min_bits: config.min_rsa_bits,
            max_bits: config.max_rsa_bits,
            default_bits: config.default_rsa_bits,
        }
    }

    pub fn supports(&self, size_in_bits: usize) -> bool {
        (self.min_bits..=self.max_bits).contains(&size_in_bits)
    }

    fn parse_public(public_der: &[u8]) -> Result<RsaPublicKey> {
        RsaPublicKey::from_public_key_der(public_der)
            .map_err(|e| Error::Crypto(format!("解析RSA公钥失败: {}", e)))
    }

    fn parse_private(private_der: &[u8]) -> Result<RsaPrivateKey> {
        RsaPrivateKey::from_pkcs8_der(private_der)
            .map_err(|e| Error::Crypto(format!("解析RSA私钥失败: {}", e)))
    }
}

impl Default for RsaProvider {
    fn default() -> Self {
        Self::new(&CryptoConfig::default())
    }
}

impl CryptoProvider for RsaProvider {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Rsa
    }

    fn generate(&self, size_in_bits: usize) -> Result<GeneratedKeys, ProviderStatus> {
        if size_in_bits == 0 {
            return Err(ProviderStatus::INVALID_PARAMETER);
        }
        if !self.supports(size_in_bits) {
            return Err(ProviderStatus::UNSUPPORTED_KEY_SIZE);
        }

        let mut rsa_rng = RsaOsRng;
        let private_key = RsaPrivateKey::new(&mut rsa_rng, size_in_bits).map_err(|e| {
            debug!(error = %e, bits = size_in_bits, "RSA key generation rejected");
            ProviderStatus::INVALID_PARAMETER
        })?;
        let public_key = RsaPublicKey::from(&private_key);

        // 将密钥转换为DER格式
        let public_der = public_key
            .to_public_key_der()
            .map_err(|_| ProviderStatus::INTERNAL)?;
        let private_der = private_key
            .to_pkcs8_der()
            .map_err(|_| ProviderStatus::INTERNAL)?;

        Ok(GeneratedKeys {
            size_in_bits,
            private: Some(ZeroizingVec(private_der.as_bytes().to_vec())),
            public: Some(public_der.as_bytes().to_vec()),
        })
    }

    fn default_size_in_bits(&self) -> usize {
        self.default_bits
    }

    fn block_size(&self, handle: &KeyHandle) -> usize {
        handle.size_in_bits().div_ceil(8)
    }

    fn padding_overhead(&self) -> usize {
        PKCS1V15_OVERHEAD
    }

    fn encrypt(&self, public_der: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let public_key = Self::parse_public(public_der)?;
        let mut rng = RsaOsRng;
        public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| Error::Crypto(format!("RSA加密失败: {}", e)))
    }

    fn decrypt(&self, private_der: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let private_key = Self::parse_private(private_der)?;
        private_key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| Error::Crypto(format!("RSA解密失败: {}", e)))
    }

    fn sign(&self, private_der: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let private_key = Self::parse_private(private_der)?;
        let signing_key = SigningKey::<Sha256>::new(private_key);
        let mut rng = RsaOsRng;
        let signature = signing_key.sign_with_rng(&mut rng, message);
        Ok(signature.to_vec())
    }

    fn verify(&self, public_der: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
        let public_key = Self::parse_public(public_der)?;
        let verifying_key = VerifyingKey::<Sha256>::new(public_key);
        let signature = PssSignature::try_from(signature)
            .map_err(|e| Error::Crypto(format!("无效的签名格式: {}", e)))?;
        verifying_key
            .verify(message, &signature)
            .map_err(|e| Error::Crypto(format!("签名验证失败: {}", e)))
    }

    fn export_public_pem(&self, public_der: &[u8]) -> Result<String> {
        let public_key = Self::parse_public(public_der)?;
        public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::Crypto(format!("RSA公钥导出失败: {}", e)))
    }
}
