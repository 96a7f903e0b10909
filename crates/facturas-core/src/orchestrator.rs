//! Concurrency-limited, resumable batch runs.
//!
//! Documents already processed successfully are skipped. The rest are
//! resolved under a semaphore, each holding its permit through a fixed
//! completion delay to stay under the remote service's rate limit. Records
//! flow over a channel to a single checkpoint consumer that owns the sink
//! and appends them in batches.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::config::RunConfig;
use crate::models::{Document, InvoiceRecord};
use crate::resolver::ExtractionResolver;

/// Basenames of documents that do not need processing again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    archivos: HashSet<String>,
}

impl SkipSet {
    /// Collect the `archivo` of every successful record.
    pub fn from_records(records: &[InvoiceRecord]) -> Self {
        let archivos = records
            .iter()
            .filter(|r| r.estado.is_success())
            .map(|r| r.archivo.clone())
            .collect();
        Self { archivos }
    }

    pub fn contains(&self, archivo: &str) -> bool {
        self.archivos.contains(archivo)
    }

    pub fn len(&self) -> usize {
        self.archivos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archivos.is_empty()
    }
}

/// Destination of checkpointed records.
pub trait RecordSink: Send + 'static {
    fn append(&mut self, records: &[InvoiceRecord]) -> Result<(), StoreError>;
}

/// Progress report, emitted once per completed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Outcome counts of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Documents handed to the run.
    pub total: usize,
    /// Documents skipped because they already succeeded.
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

pub struct Orchestrator {
    resolver: Arc<ExtractionResolver>,
    concurrency: usize,
    completion_delay: Duration,
    checkpoint_every: usize,
}

impl Orchestrator {
    pub fn new(resolver: Arc<ExtractionResolver>) -> Self {
        Self::from_config(resolver, &RunConfig::default())
    }

    pub fn from_config(resolver: Arc<ExtractionResolver>, config: &RunConfig) -> Self {
        Self {
            resolver,
            concurrency: config.concurrency.max(1),
            completion_delay: config.completion_delay(),
            checkpoint_every: config.checkpoint_every.max(1),
        }
    }

    /// Maximum number of documents in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Pause after each document before admitting the next one.
    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    /// Number of completions buffered before each append.
    pub fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint_every = every.max(1);
        self
    }

    /// Process every document not in `skip`, checkpointing into `sink`.
    ///
    /// Per-document failures are recorded as `FALLIDO` rows and never abort
    /// the run. The only error returned is a failure of the final flush.
    pub async fn run<S, P>(
        &self,
        documents: Vec<Document>,
        skip: &SkipSet,
        sink: S,
        progress: P,
    ) -> Result<RunSummary, StoreError>
    where
        S: RecordSink,
        P: Fn(Progress) + Send + 'static,
    {
        let start = Instant::now();
        let found = documents.len();
        let pending: Vec<Document> = documents
            .into_iter()
            .filter(|d| !skip.contains(&d.archivo))
            .collect();
        let skipped = found - pending.len();
        let total = pending.len();
        info!(
            "{} documents found, {} already processed, {} pending",
            found, skipped, total
        );

        let (tx, rx) = mpsc::channel::<InvoiceRecord>(total.max(1));
        let every = self.checkpoint_every;
        let consumer = tokio::spawn(checkpoint(rx, sink, every, total, progress));

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(total);
        for document in pending {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let resolver = self.resolver.clone();
            let tx = tx.clone();
            let delay = self.completion_delay;
            tasks.push(tokio::spawn(async move {
                let record = resolver.resolve(&document).await;
                if tx.send(record).await.is_err() {
                    warn!("Checkpoint consumer gone, {} not recorded", document.archivo);
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                drop(permit);
            }));
        }
        drop(tx);

        for result in join_all(tasks).await {
            if let Err(err) = result {
                warn!("Document task failed: {}", err);
            }
        }

        let outcome = consumer
            .await
            .map_err(|e| StoreError::Checkpoint(e.to_string()))?;
        outcome.result?;

        let summary = RunSummary {
            total: found,
            skipped,
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            elapsed: start.elapsed(),
        };
        info!(
            "Run finished: {} succeeded, {} failed, {} skipped in {:.1}s",
            summary.succeeded,
            summary.failed,
            summary.skipped,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }
}

struct CheckpointOutcome {
    succeeded: usize,
    failed: usize,
    result: Result<(), StoreError>,
}

/// Drain the completion channel, flushing every `every` records and once at
/// the end.
async fn checkpoint<S, P>(
    mut rx: mpsc::Receiver<InvoiceRecord>,
    sink: S,
    every: usize,
    total: usize,
    progress: P,
) -> CheckpointOutcome
where
    S: RecordSink,
    P: Fn(Progress),
{
    let sink = Arc::new(Mutex::new(sink));
    let mut buffer = Vec::with_capacity(every);
    let mut completed = 0;
    let mut succeeded = 0;
    let mut failed = 0;

    while let Some(record) = rx.recv().await {
        completed += 1;
        if record.estado.is_success() {
            succeeded += 1;
        } else {
            failed += 1;
        }
        info!("[{}/{}] {}: {}", completed, total, record.archivo, record.estado);
        progress(Progress { completed, total });

        buffer.push(record);
        if buffer.len() >= every {
            let _ = flush(&sink, &mut buffer).await;
        }
    }

    let result = if buffer.is_empty() {
        Ok(())
    } else {
        flush(&sink, &mut buffer).await
    };
    CheckpointOutcome {
        succeeded,
        failed,
        result,
    }
}

/// Append the buffer on a blocking thread. On failure the records stay
/// buffered for the next flush.
async fn flush<S: RecordSink>(
    sink: &Arc<Mutex<S>>,
    buffer: &mut Vec<InvoiceRecord>,
) -> Result<(), StoreError> {
    let batch = std::mem::take(buffer);
    let sink = sink.clone();
    let (batch, result) = tokio::task::spawn_blocking(move || {
        let result = match sink.lock() {
            Ok(mut sink) => sink.append(&batch),
            Err(_) => Err(StoreError::Checkpoint("sink lock poisoned".into())),
        };
        (batch, result)
    })
    .await
    .map_err(|e| StoreError::Checkpoint(e.to_string()))?;

    match result {
        Ok(()) => {
            debug!("Checkpoint: {} records saved", batch.len());
            Ok(())
        }
        Err(err) => {
            warn!("Checkpoint failed, keeping {} records: {}", batch.len(), err);
            *buffer = batch;
            Err(err)
        }
    }
}
