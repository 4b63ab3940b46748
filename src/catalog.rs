//! In-memory catalog of documents, analyses and recommendations.
//!
//! Each entity lives in its own arena keyed by a u64 id. Ids start at 1
//! and are assigned from per-entity counters that only move forward, so an
//! id is never reused even after a delete. Id 0 is reserved for records
//! that were never persisted.

use crate::error::{AdvisorError, Result};
use crate::model::{AnalysisRecord, Document, RecommendationRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Matches from one search pass over all three arenas.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub documents: Vec<Document>,
    pub recommendations: Vec<RecommendationRecord>,
    pub analyses: Vec<AnalysisRecord>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.recommendations.is_empty() && self.analyses.is_empty()
    }

    pub fn total(&self) -> usize {
        self.documents.len() + self.recommendations.len() + self.analyses.len()
    }
}

/// Counts describing the catalog contents.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub document_count: usize,
    pub analysis_count: usize,
    pub recommendation_count: usize,
    pub bookmarked_count: usize,
    pub recommendations_by_category: BTreeMap<String, usize>,
}

pub struct Catalog {
    documents: BTreeMap<u64, Document>,
    analyses: BTreeMap<u64, AnalysisRecord>,
    recommendations: BTreeMap<u64, RecommendationRecord>,
    next_document_id: u64,
    next_analysis_id: u64,
    next_recommendation_id: u64,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            documents: BTreeMap::new(),
            analyses: BTreeMap::new(),
            recommendations: BTreeMap::new(),
            next_document_id: 1,
            next_analysis_id: 1,
            next_recommendation_id: 1,
        }
    }

    /// Store a document, assigning the next id. Returns the assigned id.
    pub fn insert_document(&mut self, mut document: Document) -> u64 {
        let id = self.next_document_id;
        self.next_document_id += 1;
        document.id = id;
        log::debug!("Stored document {} as id {}", document.name, id);
        self.documents.insert(id, document);
        id
    }

    pub fn document(&self, id: u64) -> Option<Document> {
        self.documents.get(&id).cloned()
    }

    /// Remove a document. Analyses and recommendations that reference it
    /// keep their `document_id` and survive the delete.
    pub fn delete_document(&mut self, id: u64) -> Result<Document> {
        match self.documents.remove(&id) {
            Some(document) => {
                log::info!("Deleted document {} ({})", id, document.name);
                Ok(document)
            }
            None => Err(AdvisorError::DocumentNotFound(id)),
        }
    }

    pub fn list_documents(&self, category: Option<&str>) -> Vec<Document> {
        let documents = self
            .documents
            .values()
            .filter(|d| match category {
                Some(wanted) => d.category.eq_ignore_ascii_case(wanted),
                None => true,
            })
            .cloned()
            .collect();
        newest_first(documents, |d| (d.created_at, d.id))
    }

    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Option<Document> {
        self.documents
            .values()
            .find(|d| d.fingerprint == fingerprint)
            .cloned()
    }

    pub fn insert_analysis(&mut self, mut record: AnalysisRecord) -> u64 {
        let id = self.next_analysis_id;
        self.next_analysis_id += 1;
        record.id = id;
        self.analyses.insert(id, record);
        id
    }

    pub fn analyses_for_document(&self, document_id: u64) -> Vec<AnalysisRecord> {
        let analyses = self
            .analyses
            .values()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect();
        newest_first(analyses, |a| (a.created_at, a.id))
    }

    pub fn insert_recommendation(&mut self, mut record: RecommendationRecord) -> u64 {
        let id = self.next_recommendation_id;
        self.next_recommendation_id += 1;
        record.id = id;
        self.recommendations.insert(id, record);
        id
    }

    pub fn list_recommendations(&self, category: Option<&str>) -> Vec<RecommendationRecord> {
        let recommendations = self
            .recommendations
            .values()
            .filter(|r| match category {
                Some(wanted) => r.category.eq_ignore_ascii_case(wanted),
                None => true,
            })
            .cloned()
            .collect();
        newest_first(recommendations, |r| (r.created_at, r.id))
    }

    pub fn recent_recommendations(&self, limit: usize) -> Vec<RecommendationRecord> {
        let mut recommendations = self.list_recommendations(None);
        recommendations.truncate(limit);
        recommendations
    }

    pub fn recommendations_for_document(&self, document_id: u64) -> Vec<RecommendationRecord> {
        let recommendations = self
            .recommendations
            .values()
            .filter(|r| r.document_id == Some(document_id))
            .cloned()
            .collect();
        newest_first(recommendations, |r| (r.created_at, r.id))
    }

    /// Flip the bookmark on a recommendation. Returns the new state, or
    /// None when the id is unknown; an unknown id is a no-op, not an error.
    pub fn toggle_bookmark(&mut self, id: u64) -> Option<bool> {
        match self.recommendations.get_mut(&id) {
            Some(record) => {
                record.bookmarked = !record.bookmarked;
                log::debug!("Recommendation {} bookmarked={}", id, record.bookmarked);
                Some(record.bookmarked)
            }
            None => {
                log::debug!("Bookmark toggle ignored for unknown recommendation {}", id);
                None
            }
        }
    }

    /// Case-insensitive substring search across all three arenas. The
    /// scans are independent; a match in one entity does not pull in
    /// related records from the others.
    pub fn search(&self, term: &str) -> SearchResults {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return SearchResults::default();
        }

        let documents = self
            .documents
            .values()
            .filter(|d| {
                contains(&d.name, &needle)
                    || contains(&d.content, &needle)
                    || d.description.as_deref().is_some_and(|s| contains(s, &needle))
            })
            .cloned()
            .collect();

        let recommendations = self
            .recommendations
            .values()
            .filter(|r| {
                contains(&r.title, &needle)
                    || contains(&r.content, &needle)
                    || r.citation.as_deref().is_some_and(|s| contains(s, &needle))
            })
            .cloned()
            .collect();

        let analyses = self
            .analyses
            .values()
            .filter(|a| contains(&a.query, &needle) || contains(&a.analysis, &needle))
            .cloned()
            .collect();

        SearchResults {
            documents: newest_first(documents, |d: &Document| (d.created_at, d.id)),
            recommendations: newest_first(recommendations, |r: &RecommendationRecord| {
                (r.created_at, r.id)
            }),
            analyses: newest_first(analyses, |a: &AnalysisRecord| (a.created_at, a.id)),
        }
    }

    pub fn stats(&self) -> CatalogStats {
        let mut recommendations_by_category = BTreeMap::new();
        let mut bookmarked_count = 0;
        for record in self.recommendations.values() {
            *recommendations_by_category
                .entry(record.category.clone())
                .or_insert(0) += 1;
            if record.bookmarked {
                bookmarked_count += 1;
            }
        }

        CatalogStats {
            document_count: self.documents.len(),
            analysis_count: self.analyses.len(),
            recommendation_count: self.recommendations.len(),
            bookmarked_count,
            recommendations_by_category,
        }
    }
}

/// `needle` must already be lowercase.
fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn newest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> (DateTime<Utc>, u64),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items
}
