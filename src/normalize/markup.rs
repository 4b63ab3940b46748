use super::Extractor;
use crate::error::Result;

/// Structured-markup passthrough for HTML and XML payloads. Tags are left
/// in place; the cleaning pass collapses the angle brackets, so tag names
/// survive as plain tokens. Best-effort by design.
pub struct MarkupExtractor;

impl Extractor for MarkupExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        matches!(extension, "html" | "htm" | "xml")
    }

    fn extract(&self, payload: &[u8], _extension: &str) -> Result<String> {
        Ok(String::from_utf8_lossy(payload).into_owned())
    }
}
