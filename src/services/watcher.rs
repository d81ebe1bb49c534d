//! Input directory watcher and dispatch loop
//!
//! The debouncer thread filters events, reports `Queued` and pushes documents
//! into an unbounded channel. A single dispatch task turns them into worker
//! tasks, at most `max_workers` of which run at once.

use crate::ai::NamingClassifier;
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::execution::Placer;
use crate::services::status::{Stage, StatusSink, StatusUpdate};
use crate::services::worker::{IncomingDocument, IngestionWorker, WorkerOutcome};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

const STOPPED_MESSAGE: &str = "Service stopped before processing";

/// Counts collected by the dispatch loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub dispatched: usize,
    pub succeeded: usize,
    pub fallback: usize,
    pub failed: usize,
    pub not_started: usize,
    pub abandoned: usize,
}

/// Entry point for running the pipeline against a watched directory
pub struct IngestionService;

impl IngestionService {
    /// Validate the configuration, start watching and return a handle
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: ServiceConfig,
        classifier: Arc<dyn NamingClassifier>,
        sink: Arc<dyn StatusSink>,
    ) -> Result<ServiceHandle, ServiceError> {
        config.validate()?;

        let shutdown = CancellationToken::new();
        let abandon = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel::<IncomingDocument>();

        let watch_sink = Arc::clone(&sink);
        let watch_shutdown = shutdown.clone();
        let extension = config.extension.clone();

        // Create debounced watcher (waits for file writes to complete)
        let mut debouncer = new_debouncer(
            config.debounce,
            None,
            move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                Ok(events) => {
                    for event in events {
                        for path in qualifying_paths(&event, &extension) {
                            enqueue(path, &tx, watch_sink.as_ref(), &watch_shutdown);
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        tracing::error!("[Watcher] Watcher error: {:?}", error);
                    }
                }
            },
        )?;

        debouncer.watch(&config.input_dir, RecursiveMode::NonRecursive)?;
        tracing::info!(
            "[Watcher] Watching {} for .{} files (output: {}, workers: {})",
            config.input_dir.display(),
            config.extension,
            config.output_dir.display(),
            config.max_workers
        );

        let worker = Arc::new(IngestionWorker::new(
            classifier,
            Placer::new(&config.output_dir, &config.extension),
            Arc::clone(&sink),
        ));

        let dispatcher = tokio::spawn(dispatch_loop(DispatchContext {
            rx,
            worker,
            permits: Arc::new(Semaphore::new(config.max_workers)),
            sink,
            shutdown: shutdown.clone(),
            abandon: abandon.clone(),
            grace: config.shutdown_grace,
        }));

        Ok(ServiceHandle {
            shutdown,
            abandon,
            dispatcher,
            debouncer,
        })
    }
}

/// Running service; dropping it without `stop` abandons in-flight work
pub struct ServiceHandle {
    shutdown: CancellationToken,
    abandon: CancellationToken,
    dispatcher: JoinHandle<DispatchSummary>,
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl ServiceHandle {
    /// Stop accepting documents, wait for in-flight work up to the grace
    /// period, then release the watcher
    pub async fn stop(self) -> DispatchSummary {
        tracing::info!("[Watcher] Stopping service");
        self.shutdown.cancel();

        let summary = match self.dispatcher.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("[Watcher] Dispatch task failed: {}", e);
                self.abandon.cancel();
                DispatchSummary::default()
            }
        };

        drop(self.debouncer);
        tracing::info!("[Watcher] Service stopped: {:?}", summary);
        summary
    }
}

/// Paths in `event` that should be processed
pub fn qualifying_paths(event: &Event, extension: &str) -> Vec<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_)) {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter(|path| is_candidate(path, extension))
        .filter(|path| path.is_file())
        .cloned()
        .collect()
}

/// Name-based check: the file name ends in `.<extension>`, compared
/// case-insensitively on the raw name so hidden and non-UTF-8 names qualify too
pub fn is_candidate(path: &Path, extension: &str) -> bool {
    let file_name = match path.file_name() {
        Some(name) => name.to_string_lossy().to_lowercase(),
        None => return false,
    };
    let suffix = format!(".{}", extension.trim_start_matches('.').to_lowercase());

    file_name.ends_with(&suffix)
}

fn enqueue(
    path: PathBuf,
    tx: &mpsc::UnboundedSender<IncomingDocument>,
    sink: &dyn StatusSink,
    shutdown: &CancellationToken,
) {
    if shutdown.is_cancelled() {
        tracing::debug!("[Watcher] Ignoring {} during shutdown", path.display());
        return;
    }

    let doc = IncomingDocument::new(path);
    tracing::info!("[Watcher] New PDF detected: {}", doc.path.display());
    sink.report(StatusUpdate::new(&doc.file_name, Stage::Queued, "Queued for processing"));

    if let Err(mpsc::error::SendError(doc)) = tx.send(doc) {
        sink.report(StatusUpdate::new(&doc.file_name, Stage::Failed, STOPPED_MESSAGE));
    }
}

struct DispatchContext {
    rx: mpsc::UnboundedReceiver<IncomingDocument>,
    worker: Arc<IngestionWorker>,
    permits: Arc<Semaphore>,
    sink: Arc<dyn StatusSink>,
    shutdown: CancellationToken,
    abandon: CancellationToken,
    grace: Duration,
}

/// What a dispatched task ended with
enum TaskResult {
    Finished(WorkerOutcome),
    NotStarted,
    Panicked,
}

async fn dispatch_loop(mut ctx: DispatchContext) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    let mut tasks: JoinSet<(PathBuf, TaskResult)> = JoinSet::new();
    let mut in_flight: HashSet<PathBuf> = HashSet::new();

    loop {
        tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => break,
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                record(&mut summary, &mut in_flight, joined);
            }
            received = ctx.rx.recv() => match received {
                Some(doc) => {
                    if !in_flight.insert(doc.path.clone()) {
                        tracing::debug!("[Watcher] {} already in flight", doc.file_name);
                        continue;
                    }
                    summary.dispatched += 1;
                    spawn_document(&mut tasks, &ctx, doc);
                }
                None => break,
            },
        }
    }

    // Nothing new starts after this point
    ctx.rx.close();
    while let Ok(doc) = ctx.rx.try_recv() {
        tracing::warn!("[Watcher] {} not processed, service stopping", doc.file_name);
        ctx.sink
            .report(StatusUpdate::new(&doc.file_name, Stage::Failed, STOPPED_MESSAGE));
        summary.not_started += 1;
    }

    if !tasks.is_empty() {
        tracing::info!(
            "[Watcher] Waiting up to {:?} for {} in-flight documents",
            ctx.grace,
            tasks.len()
        );
        let deadline = tokio::time::sleep(ctx.grace);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    summary.abandoned = tasks.len();
                    tracing::warn!(
                        "[Watcher] Grace period elapsed, abandoning {} documents",
                        summary.abandoned
                    );
                    ctx.abandon.cancel();
                    tasks.detach_all();
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(joined) => record(&mut summary, &mut in_flight, joined),
                    None => break,
                },
            }
        }
    }

    summary
}

fn spawn_document(
    tasks: &mut JoinSet<(PathBuf, TaskResult)>,
    ctx: &DispatchContext,
    doc: IncomingDocument,
) {
    let worker = Arc::clone(&ctx.worker);
    let permits = Arc::clone(&ctx.permits);
    let sink = Arc::clone(&ctx.sink);
    let shutdown = ctx.shutdown.clone();
    let abandon = ctx.abandon.clone();

    tasks.spawn(async move {
        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            permit = permits.acquire_owned() => permit.ok(),
        };
        let _permit = match permit {
            Some(permit) => permit,
            None => {
                sink.report(StatusUpdate::new(&doc.file_name, Stage::Failed, STOPPED_MESSAGE));
                return (doc.path, TaskResult::NotStarted);
            }
        };

        // Inner task so a panic is contained and still gets a terminal status
        let path = doc.path.clone();
        let file_name = doc.file_name.clone();
        let run = tokio::spawn(async move { worker.process(&doc, &abandon).await });
        match run.await {
            Ok(outcome) => (path, TaskResult::Finished(outcome)),
            Err(e) => {
                tracing::error!("[Worker] Task for {} failed: {}", file_name, e);
                sink.report(StatusUpdate::new(
                    &file_name,
                    Stage::Failed,
                    "Error: processing task panicked",
                ));
                (path, TaskResult::Panicked)
            }
        }
    });
}

fn record(
    summary: &mut DispatchSummary,
    in_flight: &mut HashSet<PathBuf>,
    joined: Result<(PathBuf, TaskResult), tokio::task::JoinError>,
) {
    match joined {
        Ok((path, result)) => {
            in_flight.remove(&path);
            match result {
                TaskResult::Finished(WorkerOutcome::Placed { .. }) => summary.succeeded += 1,
                TaskResult::Finished(WorkerOutcome::FallbackPlaced { .. }) => summary.fallback += 1,
                TaskResult::Finished(WorkerOutcome::Failed { .. }) | TaskResult::Panicked => {
                    summary.failed += 1
                }
                TaskResult::NotStarted => summary.not_started += 1,
            }
        }
        Err(e) => {
            tracing::error!("[Watcher] Task join error: {}", e);
            summary.failed += 1;
        }
    }
}
