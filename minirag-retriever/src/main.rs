use anyhow::Context;
use clap::{Parser, Subcommand};
use minirag_embed::ProviderKind;
use minirag_retriever::{
    config::RetrieverConfig,
    retrieval::{
        checkpoint::CheckpointStore,
        chunking_strategy::{ChunkingConfig, ChunkingStrategy},
        embedding_pipeline::{EmbeddingPipeline, PipelineOutcome},
        search::{SearchResult, try_search},
        vector_index::VectorIndex,
    },
    storage::IndexFileStore,
};
use std::path::PathBuf;
use std::process;
use tokio::sync::watch;
use tracing::Level;

/// Exit code after a shutdown signal, following the shell convention for SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

/// Semantic search over a markdown documentation tree.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to ./minirag.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk the docs directory and embed every chunk into the index
    Generate {
        /// Root of the markdown tree (overrides the config file)
        #[arg(long)]
        docs: Option<PathBuf>,
        /// Directory for the index and checkpoint files
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Embedding provider: openai or hash
        #[arg(long)]
        provider: Option<ProviderKind>,
    },
    /// Search the index with a free-text query
    Search {
        /// Maximum number of results (0 for all)
        #[arg(short = 'n', long, default_value_t = 5)]
        top: usize,
        /// Minimum similarity score
        #[arg(short, long, default_value_t = 0.0, allow_hyphen_values = true)]
        threshold: f32,
        /// Show the content of each result
        #[arg(long)]
        full: bool,
        /// Show this many surrounding chunks from the same document
        #[arg(long, default_value_t = 0)]
        context: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
        /// Embedding provider: openai or hash
        #[arg(long)]
        provider: Option<ProviderKind>,
        /// The query text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Show information about the index
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    let args = Args::parse();

    let default_level = match args.command {
        Commands::Generate { .. } => Level::INFO,
        Commands::Search { .. } | Commands::Stats => Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            default_level
        })
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = RetrieverConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Generate {
            docs,
            output_dir,
            provider,
        } => {
            if let Some(docs) = docs {
                config.docs_dir = docs;
            }
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            if let Some(provider) = provider {
                config.embedding.provider = provider;
            }
            generate(&config).await
        }
        Commands::Search {
            top,
            threshold,
            full,
            context,
            format,
            provider,
            query,
        } => {
            if let Some(provider) = provider {
                config.embedding.provider = provider;
            }
            let format = if full && format == OutputFormat::Summary {
                OutputFormat::Full
            } else {
                format
            };
            let query = query.join(" ");
            search(&config, query.trim(), top, threshold, context, format).await
        }
        Commands::Stats => stats(&config).await,
    }
}

async fn generate(config: &RetrieverConfig) -> anyhow::Result<i32> {
    let strategy = ChunkingStrategy::new(ChunkingConfig::new(&config.docs_dir));
    let chunks = strategy.load_chunks()?;
    if chunks.is_empty() {
        anyhow::bail!(
            "no markdown documents found in {}",
            config.docs_dir.display()
        );
    }

    let provider = config
        .embedding
        .build_provider()
        .context("failed to initialize embedding provider")?;
    let pipeline = EmbeddingPipeline::new(
        provider,
        config.pipeline_config(),
        CheckpointStore::new(config.checkpoint_path()),
        IndexFileStore::new(config.index_path()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = pipeline.run(chunks, shutdown_rx);
    tokio::pin!(run);

    let outcome = tokio::select! {
        outcome = &mut run => outcome?,
        _ = wait_for_signal() => {
            eprintln!("Interrupt received, saving checkpoint...");
            let _ = shutdown_tx.send(true);
            let grace = config.shutdown_grace();
            tokio::time::timeout(grace, &mut run)
                .await
                .with_context(|| format!("checkpoint was not saved within {grace:?}"))??
        }
    };

    match outcome {
        PipelineOutcome::Completed {
            index,
            embedded,
            reused,
        } => {
            println!(
                "Indexed {} chunks from {} documents ({} embedded, {} from checkpoint)",
                index.chunks.len(),
                index.document_count(),
                embedded,
                reused
            );
            println!("Index written to {}", config.index_path().display());
            Ok(0)
        }
        PipelineOutcome::Failed {
            failures,
            completed,
            total,
        } => {
            eprintln!("{} of {} chunks failed to embed:", failures.len(), total);
            for failure in &failures {
                let note = if failure.is_retryable() {
                    ""
                } else {
                    " (will not succeed on retry)"
                };
                eprintln!("  {failure}{note}");
            }
            eprintln!(
                "Progress ({completed}/{total}) saved to {}.",
                config.checkpoint_path().display()
            );
            if failures.iter().all(|f| f.is_retryable()) {
                eprintln!("Run again to retry the failed chunks.");
            } else {
                eprintln!("Fix the chunks marked above before running again.");
            }
            Ok(1)
        }
        PipelineOutcome::Interrupted { completed, total } => {
            eprintln!(
                "Checkpoint saved ({completed}/{total}). Run again to resume."
            );
            Ok(EXIT_INTERRUPTED)
        }
    }
}

async fn search(
    config: &RetrieverConfig,
    query: &str,
    top: usize,
    threshold: f32,
    context: usize,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    if query.is_empty() {
        anyhow::bail!("query is empty");
    }

    let file = IndexFileStore::new(config.index_path())
        .load()
        .await
        .context("failed to load index")?;
    let (index, model_info) = file.into_index()?;

    let provider = config
        .embedding
        .build_provider()
        .context("failed to initialize embedding provider")?;
    if provider.model_info() != model_info {
        tracing::warn!(
            "Index was built with {model_info} but queries use {}; scores may be meaningless",
            provider.model_info()
        );
    }

    tracing::debug!("Embedding query: {query:?}");
    let query_vector = provider
        .embed_text(query)
        .await
        .context("failed to embed query")?;
    tracing::debug!("Searching with top={top}, threshold={threshold:.2}");
    let results = try_search(&index, &query_vector, top, threshold)?;
    tracing::debug!("Found {} results", results.len());

    print_results(&index, &results, context, format)?;
    Ok(0)
}

fn print_results(
    index: &VectorIndex,
    results: &[SearchResult],
    context: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results found");
        return Ok(());
    }

    println!("Found {} results:\n", results.len());
    let separator = "-".repeat(80);
    for (i, result) in results.iter().enumerate() {
        print!("Score: {:.2} | {}", result.score, result.chunk.path);
        if result.chunk.has_heading() {
            print!(" [{}]", result.chunk.heading);
        }
        println!();

        if format == OutputFormat::Summary && context == 0 {
            continue;
        }
        println!();

        if context > 0 {
            let around = index.surrounding_chunks(&result.chunk, context);
            for (j, chunk) in around.iter().enumerate() {
                if chunk.same_position(&result.chunk) {
                    println!(">>> MATCHED CHUNK <<<");
                }
                if chunk.has_heading() {
                    println!("[{}]", chunk.heading);
                }
                println!("{}", chunk.content);
                if j + 1 < around.len() {
                    println!();
                }
            }
        } else {
            println!("{}", result.chunk.content);
        }

        if i + 1 < results.len() {
            println!("\n{separator}\n");
        }
    }
    Ok(())
}

async fn stats(config: &RetrieverConfig) -> anyhow::Result<i32> {
    let store = IndexFileStore::new(config.index_path());
    let file = store.load().await.context("failed to load index")?;
    let size = tokio::fs::metadata(store.path()).await?.len();

    println!("Index: {}", store.path().display());
    println!("  Model: {}", file.model_info);
    println!("  Dimension: {}", file.dimension);
    println!("  Documents: {}", file.document_count());
    println!("  Chunks: {}", file.chunks.len());
    println!("  Size: {size} bytes");

    let checkpoint = CheckpointStore::new(config.checkpoint_path());
    if let Ok(Some(pending)) = checkpoint.load().await {
        println!(
            "Unfinished run: {}/{} chunks embedded ({})",
            pending.completed_count(),
            pending.total(),
            checkpoint.path().display()
        );
    }
    Ok(0)
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C elsewhere). Never resolves if the handlers cannot
/// be installed.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let handlers = signal(SignalKind::terminate())
            .and_then(|term| Ok((term, signal(SignalKind::interrupt())?)));
        let (mut sigterm, mut sigint) = match handlers {
            Ok(handlers) => handlers,
            Err(e) => {
                tracing::warn!("Could not install signal handlers: {e}");
                return std::future::pending().await;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Could not listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    }
}
