//! The wire data model (spec.md §3, §6): `CipherProperties`, `CipherMetadata`,
//! `SignedMessageList`, and the outer `ClientCommunication`. All four are
//! plain `serde`-derived structs serialized with `ciborium` — a
//! length-delimited, self-describing binary encoding, in the same style
//! `nl_wallet_mdoc::iso::engagement` uses for its own wire structures.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::error::{CommunicatorError, DecodingError, Result};

/// Compression scheme tag for `SignedMessageList.compression` (spec.md §3,
/// §6). `repr(u8)` so it round-trips through CBOR as a small integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Compression {
    Uncompressed = 0,
    Zcompression = 1,
}

impl TryFrom<u8> for Compression {
    type Error = DecodingError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Compression::Uncompressed),
            1 => Ok(Compression::Zcompression),
            other => Err(DecodingError::UnknownCompression(other)),
        }
    }
}

/// `CipherProperties` (spec.md §3): the freshly generated symmetric keying
/// bundle, wrapped under the peer's RSA public key before it goes on the
/// wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherProperties {
    pub name: String,
    pub key: ByteBuf,
    pub iv: ByteBuf,
    pub hmac_key: ByteBuf,
}

/// `CipherMetadata` (spec.md §3): attribution for a `CipherProperties`
/// bundle, symmetrically encrypted under the bundle it attests to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherMetadata {
    pub source: String,
    pub signature: ByteBuf,
}

/// `SignedMessageList` (spec.md §3): the inner, application-message-bearing
/// structure. `source`/`signature` are populated only on wire version 2
/// (spec.md §3, §4.6 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedMessageList {
    pub timestamp: u64,
    pub compression: u8,
    pub message_list: ByteBuf,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<ByteBuf>,
}

/// `ClientCommunication` (spec.md §3, §6): the outer wire object. Version 2
/// omits `encrypted_cipher_metadata`, `iv`, and `hmac`; version 3 requires
/// all four alongside `encrypted_cipher` and `encrypted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCommunication {
    pub api_version: u32,
    pub encrypted_cipher: ByteBuf,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encrypted_cipher_metadata: Option<ByteBuf>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub iv: Option<ByteBuf>,
    pub encrypted: ByteBuf,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hmac: Option<ByteBuf>,
}

pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out)
        .map_err(|e| CommunicatorError::from(DecodingError::Cbor(e.to_string())))?;
    Ok(out)
}

pub fn deserialize<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| CommunicatorError::from(DecodingError::Cbor(e.to_string())))
}
