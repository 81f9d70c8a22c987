//! Resumable batch embedding of a chunk corpus.
//!
//! The [`EmbeddingPipeline`] turns an ordered chunk sequence into the finished [`IndexFile`].
//! Work is spread over a bounded number of concurrent provider calls and progress is kept in a
//! [`Checkpoint`] so an interrupted or partially failed run can pick up where it stopped.
//!
//! ## Key Components
//!
//! - **PipelineConfig**: concurrency cap, checkpoint cadence, per-call timeout
//! - **EmbeddingPipeline**: drives one run from checkpoint load to index write
//! - **PipelineOutcome**: how the run ended (completed, failed or interrupted)
//!
//! ## Run lifecycle
//!
//! ```text
//! Initializing ──> Running ──┬─> Finalizing ──> Completed   (index written, checkpoint removed)
//!                            ├─> Aborted                   (failures reported, checkpoint saved)
//!                            └─> Checkpointed              (shutdown signal, checkpoint saved)
//! ```
//!
//! Each pending chunk is one task. A task holds a semaphore permit only for its provider
//! call; recording the vector and periodic checkpoint saves happen under the single mutex that
//! guards the shared [`Checkpoint`]. A failed chunk does not stop the run: the remaining tasks
//! finish, all failures are reported together and the checkpoint keeps everything that
//! succeeded. Failed chunks are not retried within a run.

use super::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{Result, RetrieverError};
use crate::storage::{IndexFile, IndexFileStore};
use minirag_context::Chunk;
use minirag_embed::{EmbedError, EmbeddingProvider};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Configuration for an [`EmbeddingPipeline`] run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Maximum number of provider calls in flight at once
    pub concurrency: usize,
    /// Persist the checkpoint after this many newly completed chunks
    pub save_every: usize,
    /// Time budget of a single provider call; exceeding it fails the chunk
    pub call_timeout: Duration,
    /// Log progress every this many completed chunks
    pub progress_every: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            save_every: 50,
            call_timeout: Duration::from_secs(30),
            progress_every: 10,
        }
    }
}

impl PipelineConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_save_every(mut self, save_every: usize) -> Self {
        self.save_every = save_every;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_progress_every(mut self, progress_every: usize) -> Self {
        self.progress_every = progress_every;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(RetrieverError::input("concurrency must be at least 1"));
        }
        if self.save_every == 0 {
            return Err(RetrieverError::input("save_every must be at least 1"));
        }
        if self.progress_every == 0 {
            return Err(RetrieverError::input("progress_every must be at least 1"));
        }
        if self.call_timeout.is_zero() {
            return Err(RetrieverError::input("call_timeout must be positive"));
        }
        Ok(())
    }
}

/// Global state of a pipeline run, used in log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    Running,
    Finalizing,
    Completed,
    Aborted,
    Checkpointed,
}

/// A chunk whose embedding failed in this run.
#[derive(Debug)]
pub struct ChunkFailure {
    pub index: usize,
    pub path: String,
    pub heading: String,
    pub error: RetrieverError,
}

impl ChunkFailure {
    fn new(index: usize, chunk: &Chunk, error: RetrieverError) -> Self {
        Self {
            index,
            path: chunk.path.clone(),
            heading: chunk.heading.clone(),
            error,
        }
    }

    /// Whether a later run may embed this chunk.
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.heading.is_empty() {
            write!(f, "chunk {} ({}): {}", self.index, self.path, self.error)
        } else {
            write!(
                f,
                "chunk {} ({} [{}]): {}",
                self.index, self.path, self.heading, self.error
            )
        }
    }
}

/// How a pipeline run ended
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every chunk has a vector; the index was written and the checkpoint removed
    Completed {
        index: IndexFile,
        /// Chunks embedded during this run
        embedded: usize,
        /// Chunks taken over from the checkpoint
        reused: usize,
    },
    /// Some chunks failed; the checkpoint holds everything that succeeded
    Failed {
        failures: Vec<ChunkFailure>,
        completed: usize,
        total: usize,
    },
    /// The shutdown signal fired; the checkpoint holds everything recorded so far
    Interrupted { completed: usize, total: usize },
}

impl PipelineOutcome {
    pub fn state(&self) -> PipelineState {
        match self {
            Self::Completed { .. } => PipelineState::Completed,
            Self::Failed { .. } => PipelineState::Aborted,
            Self::Interrupted { .. } => PipelineState::Checkpointed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Shared mutable state of a run
struct Progress {
    checkpoint: Checkpoint,
    unsaved: usize,
}

/// Everything a chunk task needs, cloned into each task
#[derive(Clone)]
struct TaskContext {
    provider: Arc<dyn EmbeddingProvider>,
    progress: Arc<Mutex<Progress>>,
    checkpoints: CheckpointStore,
    config: PipelineConfig,
    dimension: usize,
    total: usize,
}

impl TaskContext {
    async fn embed_chunk(
        self,
        index: usize,
        chunk: Chunk,
        permit: OwnedSemaphorePermit,
    ) -> std::result::Result<(), ChunkFailure> {
        debug!("Embedding chunk {index} ({})", chunk.path);
        let call = tokio::time::timeout(
            self.config.call_timeout,
            self.provider.embed_text(&chunk.content),
        )
        .await;
        drop(permit);

        let vector = match call {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => return Err(ChunkFailure::new(index, &chunk, e.into())),
            Err(_) => {
                let timeout = EmbedError::Timeout {
                    after: self.config.call_timeout,
                };
                return Err(ChunkFailure::new(index, &chunk, timeout.into()));
            }
        };
        if vector.len() != self.dimension {
            let mismatch = EmbedError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            };
            return Err(ChunkFailure::new(index, &chunk, mismatch.into()));
        }

        let mut progress = self.progress.lock().await;
        progress
            .checkpoint
            .record(index, vector)
            .map_err(|e| ChunkFailure::new(index, &chunk, e))?;
        progress.unsaved += 1;

        let completed = progress.checkpoint.completed_count();
        if completed % self.config.progress_every == 0 || completed == self.total {
            info!(
                "Progress: {}/{} ({:.1}%)",
                completed,
                self.total,
                completed as f64 * 100.0 / self.total as f64
            );
        }

        if progress.unsaved >= self.config.save_every {
            match self.checkpoints.save(&progress.checkpoint).await {
                Ok(()) => progress.unsaved = 0,
                Err(e) => warn!("Failed to save checkpoint: {e}"),
            }
        }
        Ok(())
    }
}

/// Resolves once `shutdown` carries `true`; never resolves if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let sender_gone = shutdown.wait_for(|stop| *stop).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

fn collect_task(
    joined: std::result::Result<std::result::Result<(), ChunkFailure>, JoinError>,
    failures: &mut Vec<ChunkFailure>,
) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(failure)) => {
            error!("Failed to embed {failure}");
            failures.push(failure);
        }
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => {}
    }
}

/// Embeds a chunk corpus into an index file, resumably.
pub struct EmbeddingPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    config: PipelineConfig,
    checkpoints: CheckpointStore,
    index_store: IndexFileStore,
}

impl EmbeddingPipeline {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        config: PipelineConfig,
        checkpoints: CheckpointStore,
        index_store: IndexFileStore,
    ) -> Self {
        Self {
            provider,
            config,
            checkpoints,
            index_store,
        }
    }

    /// Embed `chunks`, resuming from a matching checkpoint.
    ///
    /// Returns `Err` only for problems outside individual chunks: invalid configuration or a
    /// checkpoint/index file that cannot be written. Chunk failures and interruption are
    /// reported through [`PipelineOutcome`].
    pub async fn run(
        &self,
        chunks: Vec<Chunk>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PipelineOutcome> {
        self.config.validate()?;
        info!(
            state = ?PipelineState::Initializing,
            "Preparing {} chunks for {}",
            chunks.len(),
            self.provider.model_info()
        );

        let checkpoint = self.resume_or_start(chunks).await;
        let total = checkpoint.total();
        let pending = checkpoint.pending();
        let reused = total - pending.len();

        if pending.is_empty() {
            info!("All {total} embeddings already generated");
            return self.finalize(checkpoint, 0, reused).await;
        }

        info!(
            state = ?PipelineState::Running,
            "Embedding {} of {} chunks with up to {} concurrent calls",
            pending.len(),
            total,
            self.config.concurrency
        );

        let work: Vec<(usize, Chunk)> = pending
            .into_iter()
            .map(|i| (i, checkpoint.chunks()[i].clone()))
            .collect();
        let progress = Arc::new(Mutex::new(Progress {
            checkpoint,
            unsaved: 0,
        }));
        let context = TaskContext {
            provider: Arc::clone(&self.provider),
            progress: Arc::clone(&progress),
            checkpoints: self.checkpoints.clone(),
            config: self.config.clone(),
            dimension: self.provider.embedding_dimension(),
            total,
        };

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();
        let mut failures = Vec::new();
        let mut interrupted = false;

        for (index, chunk) in work {
            let permit = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    interrupted = true;
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => permit
                    .map_err(|_| RetrieverError::invariant("embedding semaphore closed"))?,
            };
            while let Some(joined) = tasks.try_join_next() {
                collect_task(joined, &mut failures);
            }
            tasks.spawn(context.clone().embed_chunk(index, chunk, permit));
        }

        if !interrupted {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown) => {
                        interrupted = true;
                        break;
                    }
                    joined = tasks.join_next() => match joined {
                        Some(joined) => collect_task(joined, &mut failures),
                        None => break,
                    },
                }
            }
        }

        if interrupted {
            // in-flight calls are abandoned, recorded results stay in the checkpoint
            tasks.abort_all();
            let progress = progress.lock().await;
            let completed = progress.checkpoint.completed_count();
            warn!("Shutdown requested, saving checkpoint with {completed}/{total} embeddings");
            self.checkpoints.save(&progress.checkpoint).await?;
            info!(
                state = ?PipelineState::Checkpointed,
                "Checkpoint saved to {}",
                self.checkpoints.path().display()
            );
            return Ok(PipelineOutcome::Interrupted { completed, total });
        }

        drop(context);
        let progress = Arc::try_unwrap(progress)
            .map_err(|_| RetrieverError::invariant("embedding tasks outlived the run"))?
            .into_inner();
        let completed = progress.checkpoint.completed_count();

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.index);
            self.checkpoints.save(&progress.checkpoint).await?;
            error!(
                state = ?PipelineState::Aborted,
                "{} of {} chunks failed; progress saved to {}",
                failures.len(),
                total,
                self.checkpoints.path().display()
            );
            return Ok(PipelineOutcome::Failed {
                failures,
                completed,
                total,
            });
        }

        if progress.unsaved > 0 {
            if let Err(e) = self.checkpoints.save(&progress.checkpoint).await {
                warn!("Failed to save final checkpoint: {e}");
            }
        }
        self.finalize(progress.checkpoint, completed - reused, reused)
            .await
    }

    async fn resume_or_start(&self, chunks: Vec<Chunk>) -> Checkpoint {
        let model_info = self.provider.model_info();
        let dimension = self.provider.embedding_dimension();

        match self.checkpoints.load().await {
            Ok(Some(checkpoint)) if checkpoint.matches(&chunks, &model_info, dimension) => {
                info!(
                    "Resuming from checkpoint: {}/{} embeddings already generated",
                    checkpoint.completed_count(),
                    checkpoint.total()
                );
                checkpoint
            }
            Ok(Some(checkpoint)) => {
                warn!(
                    "Checkpoint was made for {} chunks with {} (dimension {}), current run has {} chunks with {} (dimension {}); discarding it",
                    checkpoint.total(),
                    checkpoint.model_info(),
                    checkpoint.dimension(),
                    chunks.len(),
                    model_info,
                    dimension
                );
                Checkpoint::fresh(chunks, model_info, dimension)
            }
            Ok(None) => Checkpoint::fresh(chunks, model_info, dimension),
            Err(e) => {
                warn!("Could not load checkpoint, discarding it: {e}");
                Checkpoint::fresh(chunks, model_info, dimension)
            }
        }
    }

    async fn finalize(
        &self,
        checkpoint: Checkpoint,
        embedded: usize,
        reused: usize,
    ) -> Result<PipelineOutcome> {
        info!(
            state = ?PipelineState::Finalizing,
            "Writing index with {} embeddings",
            checkpoint.total()
        );
        let index = checkpoint.into_index_file()?;
        self.index_store.save(&index).await?;

        match self.checkpoints.clear().await {
            Ok(true) => debug!("Removed checkpoint {}", self.checkpoints.path().display()),
            Ok(false) => {}
            Err(e) => warn!("Could not remove checkpoint file: {e}"),
        }

        info!(
            state = ?PipelineState::Completed,
            "Generated {embedded} new embeddings, reused {reused} from checkpoint"
        );
        Ok(PipelineOutcome::Completed {
            index,
            embedded,
            reused,
        })
    }
}
