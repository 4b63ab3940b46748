//! Pipeline orchestration: upload, analysis lifecycles and catalog access.
//!
//! Two lifecycles share one pipeline. An ephemeral upload is normalized,
//! analyzed inline and returned without touching the catalog. A persisted
//! upload stores the document first (it is searchable immediately) and runs
//! the analysis in a background task that commits its results when done, so
//! analysis records and recommendations trail the document's appearance.

use crate::catalog::{Catalog, CatalogStats, SearchResults};
use crate::config::{Config, ServiceConfig};
use crate::context::build_reference_context;
use crate::error::{AdvisorError, Result};
use crate::generate::GenerationGateway;
use crate::model::{AnalysisRecord, Document, RecommendationRecord};
use crate::normalize::{extension_of, FormatNormalizer, SourceFamily};
use crate::prompt::{compose_image_request, compose_text_request};
use crate::reply::parse_reply;
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Query label recorded when the caller asks for a general review
pub const DEFAULT_QUERY: &str = "General document review";

/// One upload to run through the pipeline. The optional query rides along
/// into the analysis this upload triggers.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub description: Option<String>,
    pub query: Option<String>,
    pub persist: bool,
}

/// A completed analysis pass over one document.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub document: Document,
    pub analysis: AnalysisRecord,
    pub recommendations: Vec<RecommendationRecord>,
}

/// Background analysis spawned for a persisted upload.
#[derive(Debug)]
pub struct AnalysisTask {
    pub id: Uuid,
    pub handle: JoinHandle<()>,
}

/// What an upload produced. Ephemeral uploads resolve inline; persisted
/// uploads return the stored document and a running task whose results
/// land in the catalog when it completes.
#[derive(Debug)]
pub enum UploadOutcome {
    Ephemeral(AnalysisOutcome),
    Persisted {
        document: Document,
        task: AnalysisTask,
    },
}

impl UploadOutcome {
    pub fn document(&self) -> &Document {
        match self {
            UploadOutcome::Ephemeral(outcome) => &outcome.document,
            UploadOutcome::Persisted { document, .. } => document,
        }
    }
}

pub struct AdvisorService {
    catalog: Arc<RwLock<Catalog>>,
    gateway: Arc<GenerationGateway>,
    normalizer: FormatNormalizer,
    config: ServiceConfig,
}

impl AdvisorService {
    pub fn new(config: &Config) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(Catalog::new())),
            gateway: Arc::new(GenerationGateway::new(&config.generation)),
            normalizer: FormatNormalizer::new(),
            config: config.service.clone(),
        }
    }

    pub fn is_generation_configured(&self) -> bool {
        self.gateway.is_configured()
    }

    /// Validate, normalize and analyze one upload.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome> {
        if request.bytes.len() > self.config.max_upload_bytes {
            return Err(AdvisorError::Oversize {
                size: request.bytes.len(),
                limit: self.config.max_upload_bytes,
            });
        }

        let extension = extension_of(&request.filename)
            .ok_or_else(|| AdvisorError::UnsupportedFormat(request.filename.clone()))?;
        let family = SourceFamily::from_extension(&extension)
            .ok_or_else(|| AdvisorError::UnsupportedFormat(extension.clone()))?;

        let normalized = self.normalizer.normalize(&request.bytes, &extension)?;
        let fingerprint = fingerprint_of(&request.bytes);

        {
            let catalog = self.catalog.read().unwrap();
            if let Some(existing) = catalog.find_by_fingerprint(&fingerprint) {
                log::info!(
                    "Upload {} duplicates stored document {} ({})",
                    request.filename,
                    existing.id,
                    existing.name
                );
            }
        }

        // Images keep their raw bytes so later analysis can attach them
        let preview = if family.is_image() {
            Some(request.bytes.clone())
        } else {
            None
        };

        let document = Document {
            id: 0,
            name: request.filename,
            category: family.as_tag().to_string(),
            description: request.description,
            content: normalized.content,
            size_bytes: request.bytes.len(),
            fingerprint,
            preview,
            created_at: Utc::now(),
        };

        if request.persist {
            let id = self.catalog.write().unwrap().insert_document(document);
            let stored = self
                .catalog
                .read()
                .unwrap()
                .document(id)
                .ok_or(AdvisorError::DocumentNotFound(id))?;
            let task = self.spawn_analysis(id, request.query);
            Ok(UploadOutcome::Persisted {
                document: stored,
                task,
            })
        } else {
            let outcome = run_analysis(
                &self.catalog,
                &self.gateway,
                &self.config,
                document,
                request.query,
            )
            .await;
            Ok(UploadOutcome::Ephemeral(outcome))
        }
    }

    /// Re-analyze a stored document, optionally against a focused query.
    /// Results are committed before this returns.
    pub async fn analyze(&self, document_id: u64, query: Option<String>) -> Result<AnalysisOutcome> {
        let document = { self.catalog.read().unwrap().document(document_id) }
            .ok_or(AdvisorError::DocumentNotFound(document_id))?;

        let mut outcome =
            run_analysis(&self.catalog, &self.gateway, &self.config, document, query).await;
        commit_outcome(&self.catalog, &mut outcome);
        Ok(outcome)
    }

    fn spawn_analysis(&self, document_id: u64, query: Option<String>) -> AnalysisTask {
        let task_id = Uuid::new_v4();
        let catalog = Arc::clone(&self.catalog);
        let gateway = Arc::clone(&self.gateway);
        let config = self.config.clone();

        log::info!(
            "Spawned analysis task {} for document {}",
            task_id,
            document_id
        );

        let handle = tokio::spawn(async move {
            let document = { catalog.read().unwrap().document(document_id) };
            let document = match document {
                Some(document) => document,
                None => {
                    log::warn!(
                        "Analysis task {} skipped; document {} no longer exists",
                        task_id,
                        document_id
                    );
                    return;
                }
            };

            let mut outcome = run_analysis(&catalog, &gateway, &config, document, query).await;
            commit_outcome(&catalog, &mut outcome);
            log::info!(
                "Analysis task {} committed analysis {} with {} recommendations",
                task_id,
                outcome.analysis.id,
                outcome.recommendations.len()
            );
        });

        AnalysisTask {
            id: task_id,
            handle,
        }
    }

    pub fn document(&self, id: u64) -> Result<Document> {
        self.catalog
            .read()
            .unwrap()
            .document(id)
            .ok_or(AdvisorError::DocumentNotFound(id))
    }

    pub fn list_documents(&self, category: Option<&str>) -> Vec<Document> {
        self.catalog.read().unwrap().list_documents(category)
    }

    pub fn delete_document(&self, id: u64) -> Result<Document> {
        self.catalog.write().unwrap().delete_document(id)
    }

    pub fn list_recommendations(&self, category: Option<&str>) -> Vec<RecommendationRecord> {
        self.catalog.read().unwrap().list_recommendations(category)
    }

    pub fn recent_recommendations(&self, limit: usize) -> Vec<RecommendationRecord> {
        self.catalog.read().unwrap().recent_recommendations(limit)
    }

    pub fn recommendations_for_document(&self, document_id: u64) -> Vec<RecommendationRecord> {
        self.catalog
            .read()
            .unwrap()
            .recommendations_for_document(document_id)
    }

    pub fn analyses_for_document(&self, document_id: u64) -> Vec<AnalysisRecord> {
        self.catalog.read().unwrap().analyses_for_document(document_id)
    }

    pub fn toggle_bookmark(&self, id: u64) -> Option<bool> {
        self.catalog.write().unwrap().toggle_bookmark(id)
    }

    pub fn search(&self, term: &str) -> SearchResults {
        self.catalog.read().unwrap().search(term)
    }

    pub fn stats(&self) -> CatalogStats {
        self.catalog.read().unwrap().stats()
    }
}

/// One analysis pass: build the reference context, compose the request for
/// the document's modality, invoke generation and parse the reply. Lock
/// guards are confined to the context-gathering block and never held across
/// the generation await.
async fn run_analysis(
    catalog: &Arc<RwLock<Catalog>>,
    gateway: &GenerationGateway,
    config: &ServiceConfig,
    document: Document,
    query: Option<String>,
) -> AnalysisOutcome {
    let references = {
        let catalog = catalog.read().unwrap();
        reference_documents(&catalog, document.id)
    };
    let context_block = build_reference_context(
        &references,
        config.reference_max_entries,
        config.reference_preview_chars,
    );

    let request = if document.category == SourceFamily::Image.as_tag() {
        compose_image_request(&document, &context_block, query.as_deref())
    } else {
        compose_text_request(
            &document,
            &context_block,
            query.as_deref(),
            config.content_budget_chars,
        )
    };

    let raw = gateway.invoke(&request).await;
    let parsed = parse_reply(&raw, &document);

    let analysis = AnalysisRecord {
        id: 0,
        document_id: document.id,
        query: query.unwrap_or_else(|| DEFAULT_QUERY.to_string()),
        analysis: parsed.analysis,
        insights: parsed.insights,
        created_at: Utc::now(),
    };

    AnalysisOutcome {
        document,
        analysis,
        recommendations: parsed.recommendations,
    }
}

/// Reference pool for a target document: every other stored document, in
/// ascending id order so context numbering is stable between passes.
fn reference_documents(catalog: &Catalog, exclude_id: u64) -> Vec<Document> {
    let mut documents = catalog.list_documents(None);
    documents.retain(|d| d.id != exclude_id);
    documents.sort_by_key(|d| d.id);
    documents
}

/// Store analysis results under one write lock so the analysis record and
/// its recommendations become visible together.
fn commit_outcome(catalog: &Arc<RwLock<Catalog>>, outcome: &mut AnalysisOutcome) {
    let mut catalog = catalog.write().unwrap();
    outcome.analysis.id = catalog.insert_analysis(outcome.analysis.clone());
    for record in &mut outcome.recommendations {
        record.id = catalog.insert_recommendation(record.clone());
    }
}

fn fingerprint_of(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> AdvisorService {
        AdvisorService::new(&test_config())
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        // Env var that is never set, so the gateway runs fallback-only
        config.generation.api_key_env = "DOCADVISOR_TEST_SERVICE_NO_KEY".to_string();
        config
    }

    fn text_upload(name: &str, body: &str, persist: bool) -> UploadRequest {
        UploadRequest {
            filename: name.to_string(),
            bytes: body.as_bytes().to_vec(),
            description: None,
            query: None,
            persist,
        }
    }

    #[tokio::test]
    async fn test_ephemeral_upload_resolves_inline_and_leaves_no_trace() {
        let service = test_service();
        let outcome = service
            .upload(text_upload(
                "walkthrough.txt",
                "Site walkthrough complete. No open issues found.",
                false,
            ))
            .await
            .unwrap();

        let outcome = match outcome {
            UploadOutcome::Ephemeral(outcome) => outcome,
            UploadOutcome::Persisted { .. } => panic!("Expected ephemeral outcome"),
        };

        assert_eq!(outcome.document.id, 0);
        assert!(!outcome.document.is_persisted());
        assert_eq!(outcome.analysis.id, 0);
        assert_eq!(outcome.analysis.document_id, 0);
        assert!(!outcome.analysis.analysis.is_empty());
        assert!(!outcome.recommendations.is_empty());
        assert!(outcome.recommendations.iter().all(|r| r.document_id.is_none()));

        let stats = service.stats();
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.analysis_count, 0);
        assert_eq!(stats.recommendation_count, 0);
    }

    #[tokio::test]
    async fn test_persisted_upload_visible_immediately_results_eventually() {
        let service = test_service();
        let outcome = service
            .upload(text_upload(
                "safety-plan.txt",
                "Harness inspection scheduled weekly. Anchor points certified.",
                true,
            ))
            .await
            .unwrap();

        let (document, task) = match outcome {
            UploadOutcome::Persisted { document, task } => (document, task),
            UploadOutcome::Ephemeral(_) => panic!("Expected persisted outcome"),
        };

        assert_eq!(document.id, 1);
        assert_eq!(service.list_documents(None).len(), 1);
        // Analysis runs in the background; nothing committed yet on the
        // current-thread test runtime until we yield to the task
        assert!(service.analyses_for_document(1).is_empty());
        assert!(service.recommendations_for_document(1).is_empty());

        task.handle.await.unwrap();

        let analyses = service.analyses_for_document(1);
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].query, DEFAULT_QUERY);
        assert!(analyses[0].id >= 1);

        let recommendations = service.recommendations_for_document(1);
        assert!(!recommendations.is_empty());
        assert!(recommendations.iter().all(|r| r.document_id == Some(1)));
        assert!(recommendations.iter().all(|r| r.id >= 1));
    }

    #[tokio::test]
    async fn test_upload_query_recorded_on_analysis() {
        let service = test_service();
        let outcome = service
            .upload(UploadRequest {
                query: Some("is fall protection addressed?".to_string()),
                ..text_upload("plan.txt", "Guardrails at all openings.", false)
            })
            .await
            .unwrap();

        match outcome {
            UploadOutcome::Ephemeral(outcome) => {
                assert_eq!(outcome.analysis.query, "is fall protection addressed?");
            }
            UploadOutcome::Persisted { .. } => panic!("Expected ephemeral outcome"),
        }
    }

    #[tokio::test]
    async fn test_reanalysis_commits_additional_records() {
        let service = test_service();
        let outcome = service
            .upload(text_upload("plan.txt", "Pour schedule and curing notes.", true))
            .await
            .unwrap();
        match outcome {
            UploadOutcome::Persisted { task, .. } => task.handle.await.unwrap(),
            UploadOutcome::Ephemeral(_) => panic!("Expected persisted outcome"),
        }

        let focused = service
            .analyze(1, Some("check anchor bolt torque".to_string()))
            .await
            .unwrap();
        assert!(focused.analysis.id >= 1);
        assert_eq!(focused.analysis.query, "check anchor bolt torque");

        let analyses = service.analyses_for_document(1);
        assert_eq!(analyses.len(), 2);
        assert_eq!(analyses[0].query, "check anchor bolt torque");
        assert_eq!(analyses[1].query, DEFAULT_QUERY);
    }

    #[tokio::test]
    async fn test_fallback_analysis_is_deterministic() {
        let service = test_service();
        let first = service
            .upload(text_upload("notes.txt", "Scaffold tags current.", false))
            .await
            .unwrap();
        let second = service
            .upload(text_upload("notes.txt", "Scaffold tags current.", false))
            .await
            .unwrap();

        let (first, second) = match (first, second) {
            (UploadOutcome::Ephemeral(a), UploadOutcome::Ephemeral(b)) => (a, b),
            _ => panic!("Expected ephemeral outcomes"),
        };

        assert_eq!(first.analysis.analysis, second.analysis.analysis);
        assert_eq!(first.analysis.insights, second.analysis.insights);
        let titles = |o: &AnalysisOutcome| {
            o.recommendations
                .iter()
                .map(|r| r.title.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(titles(&first), titles(&second));
    }

    #[tokio::test]
    async fn test_oversize_upload_rejected() {
        let mut config = test_config();
        config.service.max_upload_bytes = 8;
        let service = AdvisorService::new(&config);

        let result = service
            .upload(text_upload("big.txt", "far larger than eight bytes", false))
            .await;
        match result {
            Err(AdvisorError::Oversize { size, limit }) => {
                assert_eq!(size, 27);
                assert_eq!(limit, 8);
            }
            other => panic!("Expected Oversize, got {:?}", other.map(|o| o.document().id)),
        }
    }

    #[tokio::test]
    async fn test_unsupported_and_missing_extensions_rejected() {
        let service = test_service();

        let exe = service.upload(text_upload("tool.exe", "binary", false)).await;
        assert!(matches!(exe, Err(AdvisorError::UnsupportedFormat(_))));

        let bare = service.upload(text_upload("README", "no extension", false)).await;
        assert!(matches!(bare, Err(AdvisorError::UnsupportedFormat(_))));

        assert!(service.list_documents(None).is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_payload_rejected() {
        let service = test_service();
        let result = service
            .upload(text_upload("data.json", "{not valid json", true))
            .await;
        assert!(matches!(result, Err(AdvisorError::CorruptInput(_))));
        assert!(service.list_documents(None).is_empty());
    }

    #[tokio::test]
    async fn test_delete_keeps_results_but_blocks_reanalysis() {
        let service = test_service();
        let outcome = service
            .upload(text_upload("old-plan.txt", "Obsolete revision.", true))
            .await
            .unwrap();
        match outcome {
            UploadOutcome::Persisted { task, .. } => task.handle.await.unwrap(),
            UploadOutcome::Ephemeral(_) => panic!("Expected persisted outcome"),
        }

        let deleted = service.delete_document(1).unwrap();
        assert_eq!(deleted.name, "old-plan.txt");

        assert!(!service.recommendations_for_document(1).is_empty());
        let result = service.analyze(1, None).await;
        assert!(matches!(result, Err(AdvisorError::DocumentNotFound(1))));
    }

    #[tokio::test]
    async fn test_duplicate_upload_stored_separately() {
        let service = test_service();
        for _ in 0..2 {
            let outcome = service
                .upload(text_upload("dupe.txt", "Identical content.", true))
                .await
                .unwrap();
            match outcome {
                UploadOutcome::Persisted { task, .. } => task.handle.await.unwrap(),
                UploadOutcome::Ephemeral(_) => panic!("Expected persisted outcome"),
            }
        }

        let documents = service.list_documents(None);
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].fingerprint, documents[1].fingerprint);
        assert_ne!(documents[0].id, documents[1].id);
    }

    #[tokio::test]
    async fn test_image_upload_keeps_preview_and_empty_content() {
        let service = test_service();
        let outcome = service
            .upload(UploadRequest {
                filename: "site-photo.png".to_string(),
                bytes: vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a],
                description: Some("North elevation".to_string()),
                query: None,
                persist: true,
            })
            .await
            .unwrap();

        let document = outcome.document();
        assert_eq!(document.category, "image");
        assert!(document.content.is_empty());
        assert_eq!(document.word_count(), 0);
        assert_eq!(document.preview.as_deref(), Some(&[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a][..]));
    }

    #[tokio::test]
    async fn test_bookmark_passthrough() {
        let service = test_service();
        let outcome = service
            .upload(text_upload("plan.txt", "Content body.", true))
            .await
            .unwrap();
        match outcome {
            UploadOutcome::Persisted { task, .. } => task.handle.await.unwrap(),
            UploadOutcome::Ephemeral(_) => panic!("Expected persisted outcome"),
        }

        let first = service.recommendations_for_document(1).remove(0);
        assert_eq!(service.toggle_bookmark(first.id), Some(true));
        assert_eq!(service.stats().bookmarked_count, 1);
        assert_eq!(service.toggle_bookmark(9999), None);
    }

    #[test]
    fn test_reference_pool_excludes_target_in_ascending_order() {
        let mut catalog = Catalog::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            catalog.insert_document(Document {
                id: 0,
                name: name.to_string(),
                category: "text".to_string(),
                description: None,
                content: "body".to_string(),
                size_bytes: 4,
                fingerprint: name.to_string(),
                preview: None,
                created_at: Utc::now(),
            });
        }

        let pool = reference_documents(&catalog, 2);
        let ids: Vec<u64> = pool.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = fingerprint_of(b"payload");
        let b = fingerprint_of(b"payload");
        let c = fingerprint_of(b"other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
