use super::Extractor;
use crate::error::Result;

/// Verbatim passthrough for plain-text payloads
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        matches!(extension, "txt" | "log")
    }

    fn extract(&self, payload: &[u8], _extension: &str) -> Result<String> {
        // Lossy decode: stray non-UTF-8 bytes become replacement chars,
        // which the cleaning pass collapses away
        Ok(String::from_utf8_lossy(payload).into_owned())
    }
}
