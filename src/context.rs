use crate::model::Document;

/// Minimum content length (chars) for a document to count as substantive.
/// Near-empty documents add noise to the context without adding signal.
pub const SUBSTANTIVE_MIN_CHARS: usize = 40;

/// Returned when no stored document qualifies for the context block
pub const NO_REFERENCES_SENTINEL: &str = "No reference documents available.";

/// Render a bounded reference-context block from stored documents.
///
/// Documents below the substantiveness threshold are filtered out; the
/// first `max_entries` survivors (in the order given, which the catalog
/// supplies as storage order) render as indexed preview blocks:
///
/// ```text
/// [1] Erosion Control Plan (text)
/// Install silt fencing along the northern perimeter before gradi...
/// ```
///
/// The bound holds no matter how large the corpus grows; that is what
/// keeps the outbound request inside the generation service's input
/// budget.
pub fn build_reference_context(
    documents: &[Document],
    max_entries: usize,
    preview_chars: usize,
) -> String {
    let substantive: Vec<&Document> = documents
        .iter()
        .filter(|doc| doc.content.chars().count() >= SUBSTANTIVE_MIN_CHARS)
        .take(max_entries)
        .collect();

    if substantive.is_empty() {
        return NO_REFERENCES_SENTINEL.to_string();
    }

    let mut block = String::new();
    for (idx, doc) in substantive.iter().enumerate() {
        block.push_str(&format!(
            "[{}] {} ({})\n{}\n\n",
            idx + 1,
            doc.name,
            doc.category,
            truncate_chars(&doc.content, preview_chars)
        ));
    }

    block.trim_end().to_string()
}

/// Char-boundary-safe prefix with an ellipsis marker when truncated
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let prefix: String = text.chars().take(limit).collect();
    format!("{}...", prefix)
}
