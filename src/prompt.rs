use crate::context::truncate_chars;
use crate::model::Document;
use crate::normalize;
use sha2::{Digest, Sha256};

/// Role instructions sent as the system message on every request
const SYSTEM_PROMPT: &str = "You are a senior construction compliance consultant. \
You review site documents against safety, permitting and environmental requirements \
and answer with practical, actionable guidance.";

/// Fixed output-format directive; the reply parser anchors on these labels
const OUTPUT_DIRECTIVE: &str = "Structure your reply as exactly three sections \
introduced by these literal labels:\n\n\
ANALYSIS\n\
Narrative assessment of the target document against the reference corpus.\n\n\
KEY INSIGHTS\n\
One insight per line, most important first.\n\n\
RECOMMENDATIONS\n\
One item per line in the form \"<Topic> Recommendation: <action>\". \
Use the topic words Safety, Compliance or Maintenance where they apply.";

/// Binary attachment for image-modality requests
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub media_type: &'static str,
    pub data: Vec<u8>,
}

/// One composed outbound request. Composition is pure: no I/O, never
/// fails, missing optional fields are simply omitted.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub user_text: String,
    pub image: Option<ImageAttachment>,
    /// Document name, used by the fallback reply to stay on subject
    pub subject: String,
}

impl GenerationRequest {
    /// Stable digest of the request contents, used as the reply-cache key
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.system.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.user_text.as_bytes());
        if let Some(ref image) = self.image {
            hasher.update([0u8]);
            hasher.update(&image.data);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Compose a text-modality request for the target document.
///
/// `content_budget` caps how much of the target's content travels in the
/// prompt; it is distinct from the per-reference preview budget applied
/// inside the context block.
pub fn compose_text_request(
    doc: &Document,
    context_block: &str,
    query: Option<&str>,
    content_budget: usize,
) -> GenerationRequest {
    let mut user_text = String::new();

    user_text.push_str("REFERENCE DOCUMENTS:\n");
    user_text.push_str(context_block);
    user_text.push_str("\n\nTARGET DOCUMENT:\n");
    push_metadata(&mut user_text, doc);
    user_text.push_str("Content:\n");
    user_text.push_str(&truncate_chars(&doc.content, content_budget));
    user_text.push('\n');
    push_query(&mut user_text, query);
    user_text.push('\n');
    user_text.push_str(OUTPUT_DIRECTIVE);

    GenerationRequest {
        system: SYSTEM_PROMPT.to_string(),
        user_text,
        image: None,
        subject: doc.name.clone(),
    }
}

/// Compose an image-modality request for the target document.
///
/// When the document carries no preview bytes this degrades to a
/// text-modality request over its metadata alone; degraded context is
/// explicitly non-fatal.
pub fn compose_image_request(
    doc: &Document,
    context_block: &str,
    query: Option<&str>,
) -> GenerationRequest {
    let media_type = doc
        .preview
        .as_ref()
        .and_then(|_| normalize::extension_of(&doc.name))
        .and_then(|ext| media_type_for(&ext));

    let (attachment, content_note) = match (doc.preview.as_ref(), media_type) {
        (Some(bytes), Some(media_type)) => (
            Some(ImageAttachment {
                media_type,
                data: bytes.clone(),
            }),
            "The target document is attached as an image.\n",
        ),
        _ => {
            log::warn!(
                "No image payload for {}; composing degraded text request from metadata",
                doc.name
            );
            (
                None,
                "No image payload is available; assess from the metadata above.\n",
            )
        }
    };

    let mut user_text = String::new();
    user_text.push_str("REFERENCE DOCUMENTS:\n");
    user_text.push_str(context_block);
    user_text.push_str("\n\nTARGET DOCUMENT:\n");
    push_metadata(&mut user_text, doc);
    user_text.push_str(content_note);
    push_query(&mut user_text, query);
    user_text.push('\n');
    user_text.push_str(OUTPUT_DIRECTIVE);

    GenerationRequest {
        system: SYSTEM_PROMPT.to_string(),
        user_text,
        image: attachment,
        subject: doc.name.clone(),
    }
}

fn push_metadata(user_text: &mut String, doc: &Document) {
    user_text.push_str(&format!("Name: {}\n", doc.name));
    user_text.push_str(&format!("Category: {}\n", doc.category));
    if let Some(ref description) = doc.description {
        user_text.push_str(&format!("Description: {}\n", description));
    }
}

fn push_query(user_text: &mut String, query: Option<&str>) {
    if let Some(query) = query {
        user_text.push_str(&format!("\nQUESTION: {}\n", query));
    }
}

/// Media type for a raster-image extension
pub fn media_type_for(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
