use anyhow::{Context, Result};
use clap::Parser;
use docadvisor::model::RecommendationRecord;
use docadvisor::normalize::{extension_of, SourceFamily};
use docadvisor::service::AnalysisOutcome;
use docadvisor::{AdvisorService, Config, UploadOutcome, UploadRequest};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "docadvisor")]
#[command(about = "Analyze construction-site documents and collect recommendations")]
struct Args {
    /// Files or directories to analyze (directories are walked recursively)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Free-form question to ask about each document
    #[arg(short, long)]
    query: Option<String>,

    /// Persist documents so each analysis can draw on the growing library
    #[arg(short, long)]
    library: bool,

    /// One-line description attached to every uploaded document
    #[arg(short, long)]
    description: Option<String>,

    /// How many recent recommendations to print in library mode
    #[arg(long, default_value_t = 10)]
    recent: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();

    log::info!("Starting docadvisor v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let service = AdvisorService::new(&config);
    if service.is_generation_configured() {
        log::info!("Generation model: {}", config.generation.model);
    }

    let files = discover_files(&args.paths)?;
    if files.is_empty() {
        log::warn!("No supported documents found under the given paths");
        return Ok(());
    }
    log::info!("Found {} document(s) to analyze", files.len());

    let mut tasks = Vec::new();
    for path in &files {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let request = UploadRequest {
            filename: filename.clone(),
            bytes,
            description: args.description.clone(),
            query: args.query.clone(),
            persist: args.library,
        };

        match service.upload(request).await {
            Ok(UploadOutcome::Ephemeral(outcome)) => print_outcome(&outcome),
            Ok(UploadOutcome::Persisted { document, task }) => {
                log::info!(
                    "Stored {} as document {} (task {})",
                    document.name,
                    document.id,
                    task.id
                );
                tasks.push(task);
            }
            Err(err) => log::error!("Rejected {}: {}", filename, err),
        }
    }

    if args.library {
        log::info!("Waiting for {} background analyses to complete", tasks.len());
        let handles: Vec<_> = tasks.into_iter().map(|t| t.handle).collect();
        for result in futures_util::future::join_all(handles).await {
            if let Err(err) = result {
                log::error!("Analysis task panicked: {}", err);
            }
        }
        print_library_report(&service, args.recent);
    }

    Ok(())
}

/// Expand CLI paths into concrete files. Directories are walked and
/// unsupported extensions inside them are skipped; an explicitly named file
/// is kept as-is so an unsupported upload is rejected visibly instead.
fn discover_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            anyhow::bail!("Path does not exist: {}", path.display());
        }
    }

    files.sort();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    extension_of(&path.to_string_lossy())
        .and_then(|ext| SourceFamily::from_extension(&ext))
        .is_some()
}

fn print_outcome(outcome: &AnalysisOutcome) {
    println!("\n=== {} ===", outcome.document.name);
    println!(
        "Category: {} | {} words | {} bytes",
        outcome.document.category,
        outcome.document.word_count(),
        outcome.document.size_bytes
    );
    println!("\n{}", outcome.analysis.analysis);
    println!("\nKey insights:");
    for insight in &outcome.analysis.insights {
        println!("  - {}", insight);
    }
    println!("\nRecommendations:");
    for record in &outcome.recommendations {
        print_recommendation(record);
    }
}

fn print_recommendation(record: &RecommendationRecord) {
    println!(
        "  - [{}] {}: {}",
        record.subcategory.as_deref().unwrap_or("general"),
        record.title,
        record.content
    );
    if let Some(citation) = &record.citation {
        println!("    ({})", citation);
    }
}

fn print_library_report(service: &AdvisorService, recent: usize) {
    // Oldest first so the report reads in upload order
    for document in service.list_documents(None).into_iter().rev() {
        println!("\n=== {} (document {}) ===", document.name, document.id);
        for analysis in service.analyses_for_document(document.id) {
            println!("Query: {}", analysis.query);
            println!("{}", analysis.analysis);
            println!("Key insights:");
            for insight in &analysis.insights {
                println!("  - {}", insight);
            }
        }
    }

    let recommendations = service.recent_recommendations(recent);
    if !recommendations.is_empty() {
        println!("\n=== Recent recommendations ===");
        for record in &recommendations {
            print_recommendation(record);
        }
    }

    let stats = service.stats();
    println!(
        "\nLibrary: {} document(s), {} analysis record(s), {} recommendation(s), {} bookmarked",
        stats.document_count,
        stats.analysis_count,
        stats.recommendation_count,
        stats.bookmarked_count
    );
    for (category, count) in &stats.recommendations_by_category {
        println!("  {}: {}", category, count);
    }
}
