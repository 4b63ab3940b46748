pub mod data;
pub mod markdown;
pub mod markup;
pub mod plaintext;
pub mod richtext;
pub mod spreadsheet;
pub mod tabular;

use crate::error::{AdvisorError, Result};

/// Punctuation that survives the cleaning pass. Everything else outside
/// alphanumerics and whitespace collapses to a single space.
const KEPT_PUNCTUATION: &str = ".,;:!?'\"()-=%/$";

/// Format family of a source payload, derived from the file extension.
///
/// The family doubles as the document category tag and decides the
/// analysis modality (image families skip text extraction).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFamily {
    Text,
    Tabular,
    Spreadsheet,
    Data,
    Markup,
    RichText,
    Image,
}

impl SourceFamily {
    /// Map a lowercase file extension to its family, or None when the
    /// extension is not supported.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "txt" | "log" => Some(Self::Text),
            "csv" | "tsv" => Some(Self::Tabular),
            "xlsx" => Some(Self::Spreadsheet),
            "json" | "yaml" | "yml" => Some(Self::Data),
            "md" | "markdown" | "html" | "htm" | "xml" => Some(Self::Markup),
            "rtf" => Some(Self::RichText),
            "png" | "jpg" | "jpeg" | "gif" | "webp" => Some(Self::Image),
            _ => None,
        }
    }

    /// Category tag stored on documents of this family
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Tabular => "tabular",
            Self::Spreadsheet => "spreadsheet",
            Self::Data => "data",
            Self::Markup => "markup",
            Self::RichText => "richtext",
            Self::Image => "image",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image)
    }
}

/// Canonical plain-text form of a payload
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub content: String,
    pub word_count: usize,
}

/// Trait for format-specific text extractors
pub trait Extractor: Send + Sync {
    /// Check if this extractor can handle the given file extension
    fn can_extract(&self, extension: &str) -> bool;

    /// Extract raw text from the payload; the cleaning pass runs afterwards.
    /// The extension is passed through for extractors that cover several
    /// related formats (delimiter choice, data notation).
    fn extract(&self, payload: &[u8], extension: &str) -> Result<String>;
}

/// Normalizer that selects the appropriate extractor by extension and
/// applies the text-cleaning pass to whatever it produces.
pub struct FormatNormalizer {
    extractors: Vec<Box<dyn Extractor>>,
}

impl FormatNormalizer {
    /// Create a normalizer with all built-in extractors
    pub fn new() -> Self {
        let mut normalizer = Self {
            extractors: Vec::new(),
        };

        normalizer.register(Box::new(plaintext::PlainTextExtractor));
        normalizer.register(Box::new(markdown::MarkdownExtractor));
        normalizer.register(Box::new(tabular::TabularExtractor));
        normalizer.register(Box::new(spreadsheet::SpreadsheetExtractor));
        normalizer.register(Box::new(data::DataExtractor));
        normalizer.register(Box::new(markup::MarkupExtractor));
        normalizer.register(Box::new(richtext::RichTextExtractor));

        normalizer
    }

    /// Register an extractor
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    /// Find an extractor that can handle the given extension
    pub fn find_extractor(&self, extension: &str) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.can_extract(extension))
            .map(|e| e.as_ref())
    }

    /// Normalize a raw payload into canonical plain text plus a word count.
    ///
    /// Image extensions skip extraction entirely (empty content, zero
    /// words); the payload bytes travel with the document instead. Unknown
    /// extensions are rejected with `UnsupportedFormat`, irrecoverable
    /// decode failures with `CorruptInput`.
    pub fn normalize(&self, payload: &[u8], extension: &str) -> Result<NormalizedText> {
        let family = SourceFamily::from_extension(extension)
            .ok_or_else(|| AdvisorError::UnsupportedFormat(extension.to_string()))?;

        if family.is_image() {
            return Ok(NormalizedText {
                content: String::new(),
                word_count: 0,
            });
        }

        let extractor = self
            .find_extractor(extension)
            .ok_or_else(|| AdvisorError::UnsupportedFormat(extension.to_string()))?;

        let raw = extractor.extract(payload, extension)?;
        let content = clean_text(&raw);
        let word_count = content.split_whitespace().count();

        log::debug!(
            "Normalized .{} payload: {} bytes -> {} chars, {} words",
            extension,
            payload.len(),
            content.len(),
            word_count
        );

        Ok(NormalizedText {
            content,
            word_count,
        })
    }
}

impl Default for FormatNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase extension of a declared filename
pub fn extension_of(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Text-cleaning pass applied after every format-specific extraction.
///
/// Alphanumerics, whitespace and basic punctuation pass through; any run
/// of other characters collapses to a single space. The result is trimmed.
/// This is what guarantees document content is plain text no matter what
/// the source format was.
pub fn clean_text(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut pending_gap = false;

    for ch in raw.chars() {
        if ch.is_alphanumeric() || ch.is_whitespace() || KEPT_PUNCTUATION.contains(ch) {
            if pending_gap {
                cleaned.push(' ');
                pending_gap = false;
            }
            cleaned.push(ch);
        } else {
            pending_gap = true;
        }
    }

    cleaned.trim().to_string()
}
