use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::assistant::{PolicyAssistant, QueryResponse};
use crate::config::Config;
use crate::documents::{MetadataCatalog, MetadataDefaults, MetadataField, PdfExtractor};
use crate::embeddings::{Chunker, OllamaClient};
use crate::generation::AnthropicClient;
use crate::index::{MetadataFilter, PassageIndex, PolicyIndex};
use crate::indexer::{FileStatus, Indexer};
use crate::retrieval::Retriever;
use crate::session::ConversationSession;

fn open_index(config: &Config) -> Result<Arc<PolicyIndex>> {
    let embedder = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    Ok(Arc::new(PolicyIndex::from_config(config, Arc::new(embedder))))
}

fn build_assistant(config: &Config) -> Result<PolicyAssistant> {
    let generator =
        AnthropicClient::new(&config.generation).context("Failed to create answer generator")?;
    let retriever = Retriever::new(open_index(config)?, config.retrieval.top_k);

    Ok(PolicyAssistant::new(retriever, Arc::new(generator))
        .with_consult_without_context(config.generation.consult_model_without_context))
}

/// Ingest every PDF in a directory, attaching metadata from an optional CSV
#[inline]
pub async fn ingest_documents(
    config_dir: &Path,
    dir: &Path,
    metadata_csv: Option<&Path>,
    defaults: &MetadataDefaults,
) -> Result<()> {
    let config = Config::load(config_dir)?;

    let catalog = match metadata_csv {
        Some(csv) => MetadataCatalog::from_csv_path(csv, defaults)?,
        None => MetadataCatalog::new(defaults),
    };
    info!("Loaded {} metadata rows", catalog.len());

    let index = open_index(&config)?;
    let chunker = Chunker::new(config.chunking.clone())?;
    let shared = Arc::clone(&index) as Arc<dyn PassageIndex>;
    let indexer = Indexer::new(shared, chunker, Arc::new(PdfExtractor::new())).with_progress(true);

    println!("📥 Ingesting policy documents from {}", dir.display());
    println!("{}", "=".repeat(50));

    let report = indexer.ingest_directory(dir, &catalog).await?;

    for outcome in &report.files {
        match &outcome.status {
            FileStatus::Indexed {
                chunks,
                pruned,
                warning,
            } => {
                if *pruned > 0 {
                    println!(
                        "   ✅ {}: {} chunks ({} stale chunks removed)",
                        outcome.filename, chunks, pruned
                    );
                } else {
                    println!("   ✅ {}: {} chunks", outcome.filename, chunks);
                }
                if let Some(warning) = warning {
                    println!("      ⚠️  {}", warning);
                }
            }
            FileStatus::Failed { error } => {
                println!("   ❌ {}: {}", outcome.filename, error);
            }
        }
    }

    if !report.unmatched_metadata.is_empty() {
        println!();
        println!("⚠️  Metadata rows without a matching PDF:");
        for filename in &report.unmatched_metadata {
            println!("   - {}", filename);
        }
    }

    println!();
    println!(
        "Indexed {} of {} files, {} chunks total",
        report.indexed_count(),
        report.files.len(),
        report.total_chunks()
    );
    println!("Index location: {}", index.path().display());

    if !report.is_success() {
        anyhow::bail!("No documents were indexed from {}", dir.display());
    }

    Ok(())
}

/// Answer a single question and print the cited sources
#[inline]
pub async fn ask_question(
    config_dir: &Path,
    question: &str,
    filter: &MetadataFilter,
    k: Option<usize>,
) -> Result<()> {
    let config = Config::load(config_dir)?;
    let assistant = build_assistant(&config)?;

    let response = assistant.ask(question, filter, k).await?;
    print_response(&response);

    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!();
    println!("{}", response.answer);

    if response.sources.is_empty() {
        return;
    }

    println!();
    println!("{}", style("Sources:").bold());
    for source in &response.sources {
        println!(
            "  [{}] {} ({} | {} | {})",
            source.marker, source.filename, source.department, source.region, source.policy_type
        );
        println!("      {}", style(&source.excerpt).dim());
    }

    if response.generation_attempts > 1 {
        println!();
        println!(
            "{}",
            style(format!(
                "Answer generated after {} attempts (rate limited)",
                response.generation_attempts
            ))
            .yellow()
        );
    }
}

/// Interactive question loop with session history and filters
#[inline]
pub async fn run_chat(config_dir: &Path, initial_filter: MetadataFilter) -> Result<()> {
    let config = Config::load(config_dir)?;
    let assistant = build_assistant(&config)?;
    let mut session = ConversationSession::new();
    let mut filter = initial_filter;

    println!("{}", style("💬 Policy assistant").bold().cyan());
    println!("Ask a question about company policy. Commands:");
    println!("  :filter key=value   restrict answers to matching documents");
    println!("  :filters            show (or with 'clear', drop) active filters");
    println!("  :history            list questions asked in this session");
    println!("  :clear              forget the session history");
    println!("  :quit               leave");
    println!();

    loop {
        let line: String = Input::new()
            .with_prompt("❓")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        match line {
            ":quit" | ":exit" | ":q" => break,
            ":clear" => {
                session.clear();
                println!("Session history cleared");
            }
            ":history" => {
                if session.is_empty() {
                    println!("No questions asked yet");
                }
                for (i, turn) in session.turns().iter().enumerate() {
                    println!(
                        "{}. [{}] {}",
                        i + 1,
                        turn.asked_at.format("%H:%M:%S"),
                        turn.question
                    );
                }
            }
            ":filters" => println!("Active filters: {}", filter),
            ":filters clear" => {
                filter.clear();
                println!("Filters cleared");
            }
            command if command.starts_with(":filter ") => {
                let assignment = command.trim_start_matches(":filter ");
                match MetadataFilter::parse_assignment(assignment)
                    .and_then(|(field, value)| filter.insert(field, value))
                {
                    Ok(()) => println!("Active filters: {}", filter),
                    Err(e) => println!("{}", style(e).red()),
                }
            }
            command if command.starts_with(':') => {
                println!("Unknown command: {}", command);
            }
            question => match assistant.ask(question, &filter, None).await {
                Ok(response) => {
                    print_response(&response);
                    session.record(question, &response);
                    println!();
                }
                Err(e) => {
                    warn!("Query failed: {}", e);
                    println!("{}", style(format!("Query failed: {}", e)).red());
                }
            },
        }
    }

    println!("Goodbye ({} questions answered)", session.len());
    Ok(())
}

/// Chunk counts per indexed document
#[inline]
pub async fn show_stats(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;
    let index = open_index(&config)?;

    let counts = index.document_counts().await?;
    if counts.is_empty() {
        println!("The index is empty.");
        println!("Use 'policy-rag ingest <DIR>' to add policy documents.");
        return Ok(());
    }

    println!("📚 Indexed policy documents ({} total):", counts.len());
    println!();
    for (filename, chunks) in &counts {
        println!("   {:<40} {:>6} chunks", filename, chunks);
    }
    println!();
    println!("Total chunks: {}", counts.values().sum::<usize>());

    Ok(())
}

/// Distinct values of one metadata field
#[inline]
pub async fn list_values(config_dir: &Path, field: &str) -> Result<()> {
    let field: MetadataField = field.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let config = Config::load(config_dir)?;
    let index = open_index(&config)?;

    let values = index.distinct_values(field).await?;
    if values.is_empty() {
        println!("No values recorded for {}", field);
        return Ok(());
    }

    println!("Values of {} ({}):", field, values.len());
    for value in values {
        println!("   {}", value);
    }

    Ok(())
}

/// Delete every chunk of one document
#[inline]
pub async fn remove_document(config_dir: &Path, filename: &str) -> Result<()> {
    let config = Config::load(config_dir)?;
    let index = open_index(&config)?;

    let removed = index.remove_document(filename).await?;
    if removed == 0 {
        println!("No indexed document named '{}'", filename);
    } else {
        println!("Removed {} chunks of {}", removed, filename);
    }

    Ok(())
}

/// Drop the whole index after confirmation
#[inline]
pub async fn reset_index(config_dir: &Path, skip_confirmation: bool) -> Result<()> {
    let config = Config::load(config_dir)?;
    let index = open_index(&config)?;

    if !skip_confirmation {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete all indexed content at {}?",
                index.path().display()
            ))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !confirmed {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    index.reset().await?;
    println!("Index reset");

    Ok(())
}

/// Report the health of every component of the pipeline
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).unwrap_or_else(|e| {
        println!("⚠️  Configuration unreadable, showing defaults: {:#}", e);
        Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        }
    });

    println!("📊 Policy-RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let health = tokio::task::spawn_blocking(move || client.health_check())
                .await
                .context("Health check task failed")?;
            match health {
                Ok(()) => {
                    println!(
                        "   ✅ Ollama: Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                    println!("   📋 Model: {}", config.ollama.model);
                    println!("   🔢 Batch Size: {}", config.ollama.batch_size);
                }
                Err(e) => {
                    println!("   ⚠️  Ollama: Unhealthy - {:#}", e);
                }
            }
        }
        Err(e) => {
            println!("   ❌ Ollama: Invalid configuration - {}", e);
        }
    }

    println!("🔍 Index Status:");
    let index = open_index(&config)?;
    println!("   📁 Location: {}", index.path().display());
    match index.document_counts().await {
        Ok(counts) => {
            println!(
                "   ✅ LanceDB: {} documents, {} chunks",
                counts.len(),
                counts.values().sum::<usize>()
            );
        }
        Err(e) => {
            println!("   ❌ LanceDB: Failed to open - {}", e);
        }
    }

    println!("✍️  Generation Status:");
    println!("   📋 Model: {}", config.generation.model);
    match config.generation.api_key() {
        Ok(_) => println!("   ✅ API key: {} is set", config.generation.api_key_env),
        Err(e) => println!("   ❌ API key: {}", e),
    }

    Ok(())
}
