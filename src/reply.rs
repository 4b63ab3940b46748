//! Tolerant parsing of generation replies into typed records.
//!
//! The reply is free-form text that should contain three labeled sections
//! but often arrives decorated, reordered or incomplete. The scanner walks
//! it line by line (seeking a label, capturing a body, seeking the next
//! label) and every section has an explicit default, so parsing never
//! fails and never returns an empty result.

use crate::model::{Document, RecommendationRecord};
use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;

/// Cap on recommendations extracted from one reply; a bound against
/// runaway or repetitive generative output
pub const MAX_RECOMMENDATIONS: usize = 10;

/// Cap on insight lines kept from one reply
pub const MAX_INSIGHTS: usize = 8;

/// Title of the default record emitted when no recommendation survives
pub const DEFAULT_RECOMMENDATION_TITLE: &str = "Document Review Required";

/// Structured result of one reply parse. All three fields are guaranteed
/// non-empty.
#[derive(Debug, Clone)]
pub struct ParsedReply {
    pub analysis: String,
    pub insights: Vec<String>,
    pub recommendations: Vec<RecommendationRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Analysis,
    Insights,
    Recommendations,
}

/// Label table, longest-prefix first so "KEY INSIGHTS" wins over "INSIGHTS"
const LABELS: [(&str, Section); 4] = [
    ("RECOMMENDATIONS", Section::Recommendations),
    ("KEY INSIGHTS", Section::Insights),
    ("ANALYSIS", Section::Analysis),
    ("INSIGHTS", Section::Insights),
];

/// Parse a raw reply against its target document.
pub fn parse_reply(raw: &str, doc: &Document) -> ParsedReply {
    let bodies = scan_sections(raw);

    let analysis = {
        let joined = bodies.analysis.join("\n").trim().to_string();
        if joined.is_empty() {
            log::warn!(
                "Reply for {} has no analysis section; synthesizing default",
                doc.name
            );
            default_analysis(doc)
        } else {
            joined
        }
    };

    let mut insights = parse_insights(&bodies.insights);
    if insights.is_empty() {
        log::warn!("Reply for {} has no insights; using defaults", doc.name);
        insights = default_insights();
    }

    let mut recommendations = parse_recommendations(&bodies.recommendations, doc);
    if recommendations.is_empty() {
        log::warn!(
            "Reply for {} yielded no recommendations; using default record",
            doc.name
        );
        recommendations = vec![default_recommendation(doc)];
    }

    ParsedReply {
        analysis,
        insights,
        recommendations,
    }
}

struct SectionBodies {
    analysis: Vec<String>,
    insights: Vec<String>,
    recommendations: Vec<String>,
}

impl SectionBodies {
    fn body_mut(&mut self, section: Section) -> &mut Vec<String> {
        match section {
            Section::Analysis => &mut self.analysis,
            Section::Insights => &mut self.insights,
            Section::Recommendations => &mut self.recommendations,
        }
    }
}

/// Line scanner: text before the first label is preamble and dropped;
/// every other line belongs to the most recent label.
fn scan_sections(raw: &str) -> SectionBodies {
    let mut bodies = SectionBodies {
        analysis: Vec::new(),
        insights: Vec::new(),
        recommendations: Vec::new(),
    };
    let mut current: Option<Section> = None;

    for line in raw.lines() {
        if let Some((section, remainder)) = split_label(line) {
            current = Some(section);
            if !remainder.is_empty() {
                bodies.body_mut(section).push(remainder);
            }
            continue;
        }
        if let Some(section) = current {
            bodies.body_mut(section).push(line.to_string());
        }
    }

    bodies
}

/// Match a section label at the start of a line, tolerating markdown
/// decoration, any casing and an optional trailing colon. To avoid
/// swallowing prose that merely begins with a label word ("Analysis shows
/// gaps"), the label must be followed by nothing or by a colon.
fn split_label(line: &str) -> Option<(Section, String)> {
    let stripped = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '#' | '*' | '-') || c.is_whitespace())
        .trim_end_matches(|c: char| matches!(c, '#' | '*') || c.is_whitespace());

    for (label, section) in LABELS {
        if stripped.len() < label.len() || !stripped.is_char_boundary(label.len()) {
            continue;
        }
        if !stripped[..label.len()].eq_ignore_ascii_case(label) {
            continue;
        }
        let rest = &stripped[label.len()..];
        if !rest.is_empty() && !rest.starts_with(':') {
            continue;
        }
        let remainder = rest.trim_start_matches(':').trim().to_string();
        return Some((section, remainder));
    }

    None
}

fn parse_insights(lines: &[String]) -> Vec<String> {
    let mut insights = Vec::new();
    for line in lines {
        if insights.len() >= MAX_INSIGHTS {
            log::debug!("Insight cap of {} reached; ignoring remaining lines", MAX_INSIGHTS);
            break;
        }
        let cleaned = strip_bullet(line);
        if !cleaned.is_empty() {
            insights.push(cleaned.to_string());
        }
    }
    insights
}

fn parse_recommendations(lines: &[String], doc: &Document) -> Vec<RecommendationRecord> {
    let mut records = Vec::new();

    for line in lines {
        if records.len() >= MAX_RECOMMENDATIONS {
            log::warn!(
                "Recommendation cap of {} reached for {}; ignoring remaining reply lines",
                MAX_RECOMMENDATIONS,
                doc.name
            );
            break;
        }

        let candidate = strip_bullet(line);
        if candidate.is_empty() {
            continue;
        }

        let subcategory = match detect_subcategory(candidate) {
            Some(subcategory) => subcategory,
            None => {
                log::debug!("No category marker in line, skipping: {}", candidate);
                continue;
            }
        };

        let (title, content) = match candidate.split_once(':') {
            Some((title, content)) => (title.trim(), content.trim()),
            None => {
                log::debug!("No separator in marked line, skipping: {}", candidate);
                continue;
            }
        };
        if title.is_empty() || content.is_empty() {
            continue;
        }

        let ordinal = records.len() + 1;
        records.push(RecommendationRecord {
            id: 0,
            title: title.to_string(),
            content: content.to_string(),
            category: category_of(doc),
            subcategory: Some(subcategory),
            citation: Some(citation_for(doc, ordinal)),
            bookmarked: false,
            document_id: persisted_id(doc),
            created_at: Utc::now(),
        });
    }

    records
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"(?i)\b(safety|compliance|maintenance|recommendation)s?\b")
            .expect("Invalid regex pattern")
    })
}

/// Which subcategory a line's marker assigns. Domain markers win over the
/// generic one regardless of position; matching is case-insensitive so a
/// differently-cased marker never silently drops the line.
fn detect_subcategory(text: &str) -> Option<String> {
    let mut generic = false;
    for cap in marker_regex().captures_iter(text) {
        match cap.get(1).map(|m| m.as_str().to_lowercase()).as_deref() {
            Some("recommendation") => generic = true,
            Some(domain) => return Some(domain.to_string()),
            None => {}
        }
    }
    if generic {
        Some("general".to_string())
    } else {
        None
    }
}

/// Strip leading bullet or numbering decoration from a line
fn strip_bullet(line: &str) -> &str {
    let rest = line
        .trim()
        .trim_start_matches(['-', '*', '\u{2022}'])
        .trim_start();

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let after = &rest[digits..];
        if let Some(stripped) = after.strip_prefix('.').or_else(|| after.strip_prefix(')')) {
            return stripped.trim_start();
        }
    }

    rest
}

fn category_of(doc: &Document) -> String {
    if doc.category.is_empty() {
        "general".to_string()
    } else {
        doc.category.clone()
    }
}

fn persisted_id(doc: &Document) -> Option<u64> {
    if doc.is_persisted() {
        Some(doc.id)
    } else {
        None
    }
}

/// Provenance string for the record at 1-based position `ordinal`
fn citation_for(doc: &Document, ordinal: usize) -> String {
    if doc.name.trim().is_empty() {
        "Full Document".to_string()
    } else {
        format!("{}, Section {}", doc.name, ordinal)
    }
}

fn default_analysis(doc: &Document) -> String {
    format!(
        "Document {} ({} category, {} characters of extracted content) was \
        reviewed, but the reply did not include a narrative analysis.",
        doc.name,
        doc.category,
        doc.content.chars().count()
    )
}

fn default_insights() -> Vec<String> {
    vec![
        "Document processed successfully.".to_string(),
        "Content extracted and available for search.".to_string(),
    ]
}

fn default_recommendation(doc: &Document) -> RecommendationRecord {
    RecommendationRecord {
        id: 0,
        title: DEFAULT_RECOMMENDATION_TITLE.to_string(),
        content: "No structured recommendations were extracted from the analysis \
                  reply. Review the document manually to confirm site requirements \
                  are met."
            .to_string(),
        category: category_of(doc),
        subcategory: Some("general".to_string()),
        citation: Some("Full Document".to_string()),
        bookmarked: false,
        document_id: persisted_id(doc),
        created_at: Utc::now(),
    }
}
