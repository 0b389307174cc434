//! ImmutableId encoding.
//!
//! Federated users are correlated with their on-premises identity through an
//! `immutableId`: a base64 rendering of the source UUID. Three renderings are
//! in use depending on which federation server issued the identity.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Office365Error, Office365Result};

/// Permutation applied by the Microsoft (`objectGUID`) byte layout: the first
/// three UUID fields are stored little-endian.
const MS_BYTE_ORDER: [usize; 16] = [3, 2, 1, 0, 5, 4, 7, 6, 8, 9, 10, 11, 12, 13, 14, 15];

/// How a UUID is turned into an `immutableId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImmutableIdEncoding {
    /// Base64 of the UUID text itself.
    StraightBase64,
    /// Base64 of the 16 UUID bytes in Microsoft GUID byte order.
    MsBase64,
    /// Base64 of the 16 UUID bytes in canonical order.
    AdfsBase64,
}

/// Encode `uuid` (hyphenated or 32 bare hex digits) with `mode`.
///
/// # Errors
///
/// Returns [`Office365Error::Format`] unless the input holds exactly 32 hex
/// digits once hyphens are removed.
pub fn encode(uuid: &str, mode: ImmutableIdEncoding) -> Office365Result<String> {
    let bytes = uuid_bytes(uuid)?;
    let encoded = match mode {
        ImmutableIdEncoding::StraightBase64 => STANDARD.encode(latin1_bytes(uuid)?),
        ImmutableIdEncoding::MsBase64 => STANDARD.encode(MS_BYTE_ORDER.map(|i| bytes[i])),
        ImmutableIdEncoding::AdfsBase64 => STANDARD.encode(bytes),
    };
    Ok(encoded)
}

/// Reverse [`encode`].
///
/// Byte-based modes yield 32 lowercase hex digits without hyphens. Straight
/// base64 yields the text that was originally encoded.
pub fn decode(encoded: &str, mode: ImmutableIdEncoding) -> Office365Result<String> {
    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| Office365Error::Format(format!("immutableId is not base64: {e}")))?;

    match mode {
        ImmutableIdEncoding::StraightBase64 => {
            let text: String = raw.iter().map(|&b| char::from(b)).collect();
            uuid_bytes(&text)?;
            Ok(text)
        }
        ImmutableIdEncoding::MsBase64 | ImmutableIdEncoding::AdfsBase64 => {
            let bytes: [u8; 16] = raw.as_slice().try_into().map_err(|_| {
                Office365Error::Format(format!(
                    "immutableId decodes to {} bytes, expected 16",
                    raw.len()
                ))
            })?;
            let ordered = if mode == ImmutableIdEncoding::MsBase64 {
                // The permutation is its own inverse.
                MS_BYTE_ORDER.map(|i| bytes[i])
            } else {
                bytes
            };
            Ok(hex::encode(ordered))
        }
    }
}

/// Parse the 16 bytes of a UUID string, ignoring hyphens.
fn uuid_bytes(uuid: &str) -> Office365Result<[u8; 16]> {
    let digits: String = uuid.chars().filter(|&c| c != '-').collect();
    if digits.len() != 32 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Office365Error::Format(format!(
            "'{uuid}' is not a 32 hex digit UUID"
        )));
    }

    let mut bytes = [0u8; 16];
    hex::decode_to_slice(&digits, &mut bytes)
        .map_err(|e| Office365Error::Format(format!("'{uuid}': {e}")))?;
    Ok(bytes)
}

/// ISO-8859-1 bytes of `text`. Valid UUID text is ASCII, so this only fails
/// on inputs already rejected by [`uuid_bytes`].
fn latin1_bytes(text: &str) -> Office365Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c))
                .map_err(|_| Office365Error::Format(format!("'{c}' is not ISO-8859-1")))
        })
        .collect()
}
