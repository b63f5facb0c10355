use std::borrow::Cow;

use thiserror::Error;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Byte content that is not valid in the requested encoding.
///
/// `position` is the byte offset in the file of the first offending byte.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{encoding}' codec can't decode byte 0x{byte:02x} in position {position}: {reason}")]
pub struct DecodeError {
    pub encoding: &'static str,
    pub byte: u8,
    pub position: usize,
    pub reason: &'static str,
}

/// Text encodings the reader can decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// Strict UTF-8; a leading byte-order mark is skipped.
    #[default]
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value, so decoding never fails.
    ///
    /// Note this is not Windows-1252: bytes `0x80..=0x9F` decode to C1 controls.
    Latin1,
}

impl TextEncoding {
    pub const UTF8_LABEL: &'static str = "utf-8";
    pub const LATIN1_LABEL: &'static str = "latin1";

    /// Resolve a user-facing encoding name (case-insensitive, `_` and `-` interchangeable).
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" | "u8" | "utf" | "cp65001" | "utf-8-sig" | "unicode-1-1-utf-8" => {
                Some(TextEncoding::Utf8)
            }
            "latin1" | "latin-1" | "latin" | "l1" | "iso-8859-1" | "iso8859-1" | "iso-8859-1:1987"
            | "8859" | "cp819" | "iso-ir-100" | "csisolatin1" => Some(TextEncoding::Latin1),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<Cow<'_, str>, DecodeError> {
        match self {
            TextEncoding::Utf8 => decode_utf8(bytes),
            TextEncoding::Latin1 => Ok(encoding_rs::mem::decode_latin1(bytes)),
        }
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<Cow<'_, str>, DecodeError> {
    // Skip a leading BOM.
    let (offset, body) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (UTF8_BOM.len(), rest),
        None => (0, bytes),
    };

    match std::str::from_utf8(body) {
        Ok(text) => Ok(Cow::Borrowed(text)),
        Err(err) => {
            let at = err.valid_up_to();
            let byte = body[at];
            let reason = match err.error_len() {
                None => "unexpected end of data",
                Some(_) if is_utf8_lead_byte(byte) => "invalid continuation byte",
                Some(_) => "invalid start byte",
            };
            Err(DecodeError {
                encoding: TextEncoding::Utf8.name(),
                byte,
                position: offset + at,
                reason,
            })
        }
    }
}

fn is_utf8_lead_byte(byte: u8) -> bool {
    matches!(byte, 0xC2..=0xF4)
}
