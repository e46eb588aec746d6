//! Tag identifiers and the permissive decoding of raw serial lines.

use std::fmt;

use encoding_rs::Encoding;
use serde::Serialize;

/// A tag UID as submitted to the API: trimmed, uppercased and never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Normalize decoded text into an identifier.
    ///
    /// Returns `None` for empty or whitespace-only input.
    pub fn normalize(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decode a raw line, dropping any byte sequence the encoding rejects.
///
/// Line noise on the serial link must never abort the relay, so malformed
/// input degrades to whatever text survives.
pub fn decode_line(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        text.chars()
            .filter(|&c| c != char::REPLACEMENT_CHARACTER)
            .collect()
    } else {
        text.into_owned()
    }
}

/// Decode and normalize in one step.
pub fn identifier_from_line(bytes: &[u8], encoding: &'static Encoding) -> Option<Identifier> {
    Identifier::normalize(&decode_line(bytes, encoding))
}
