//! Lossless binary-to-text transcoding for tile imagery.
//!
//! The persistent store is text-oriented, so fetched image bytes are stored
//! base64-encoded. `encode` and `decode` are exact inverses for arbitrary
//! byte sequences, including embedded 0x00 and bytes outside the printable
//! range.
//!
//! Some transports deliver binary payloads as a byte-per-character string
//! (one logical byte per char, 8-bit-clean charset). `bytes_from_binary_text`
//! reinterprets such a string back into raw bytes before encoding; the
//! reinterpretation is lossless and rejects characters above U+00FF.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Errors that can occur while transcoding tile imagery.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Stored text is not valid base64.
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// A transport string contained a character that does not fit one byte.
    #[error("non-byte character {ch:?} at index {index} in transport text")]
    NonByteChar { ch: char, index: usize },
}

/// Encodes raw image bytes into storage-safe text.
pub fn encode(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

/// Decodes storage text back into raw image bytes.
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(STANDARD.decode(text)?)
}

/// Reinterprets a byte-per-character transport string as raw bytes.
///
/// Each char must be in U+0000..=U+00FF; its code point is the byte value.
pub fn bytes_from_binary_text(text: &str) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::with_capacity(text.len());
    for (index, ch) in text.chars().enumerate() {
        let code = ch as u32;
        if code > 0xFF {
            return Err(CodecError::NonByteChar { ch, index });
        }
        bytes.push(code as u8);
    }
    Ok(bytes)
}
