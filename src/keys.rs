//! 密钥句柄、密钥对与持久化记录的数据模型。
//!
//! `KeyHandle` 是对单个密钥的不透明引用，不暴露任何密钥字节；
//! 密钥材料只存在于 `KeyRecord` 中，由持久化后端持有。

use crate::common::utils::ZeroizingVec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 单个密钥的全局唯一标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(Uuid);

impl KeyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for KeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for KeyId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// 密钥的种类：私钥或公钥
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    Private,
    Public,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Private => f.write_str("private"),
            KeyKind::Public => f.write_str("public"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    Rsa,
}

/// 对单个密钥的不透明引用。
///
/// 句柄只携带不可变属性。标签是可变的，始终通过存储查询
/// （见 [`KeyStore::tag_of`](crate::KeyStore::tag_of)）。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyHandle {
    id: KeyId,
    kind: KeyKind,
    algorithm: Algorithm,
    size_in_bits: usize,
    permanent: bool,
}

impl KeyHandle {
    pub fn new(
        id: KeyId,
        kind: KeyKind,
        algorithm: Algorithm,
        size_in_bits: usize,
        permanent: bool,
    ) -> Self {
        Self {
            id,
            kind,
            algorithm,
            size_in_bits,
            permanent,
        }
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn size_in_bits(&self) -> usize {
        self.size_in_bits
    }

    /// 密钥是否在进程重启后仍然存在
    pub fn is_permanent(&self) -> bool {
        self.permanent
    }
}

/// 一次生成调用产生的 (私钥, 公钥) 句柄对。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    private: KeyHandle,
    public: KeyHandle,
}

impl KeyPair {
    pub(crate) fn new(private: KeyHandle, public: KeyHandle) -> Self {
        debug_assert_eq!(private.size_in_bits, public.size_in_bits);
        Self { private, public }
    }

    pub fn private_key(&self) -> &KeyHandle {
        &self.private
    }

    pub fn public_key(&self) -> &KeyHandle {
        &self.public
    }

    pub fn into_parts(self) -> (KeyHandle, KeyHandle) {
        (self.private, self.public)
    }
}

/// 密钥材料。私钥为 PKCS#8 DER，公钥为 SPKI DER。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum KeyMaterial {
    Private(ZeroizingVec),
    Public(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl KeyMaterial {
    pub fn kind(&self) -> KeyKind {
        match self {
            KeyMaterial::Private(_) => KeyKind::Private,
            KeyMaterial::Public(_) => KeyKind::Public,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            KeyMaterial::Private(der) => der,
            KeyMaterial::Public(der) => der,
        }
    }
}

/// 持久化后端为每个密钥保存的记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub handle: KeyHandle,
    pub tag: String,
    /// 将同一次生成的两半关联起来
    pub pair_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub material: KeyMaterial,
}

impl KeyRecord {
    pub fn id(&self) -> &KeyId {
        self.handle.id()
    }
}
