//! Background parsing and main-thread finalization.
//!
//! A [`ParserTask`] runs a whole parse session on a worker thread. The worker
//! only accumulates plain data; the host applies the result to its own layer
//! tree with [`finalize`] on the thread that owns it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::IngestOptions;
use crate::error::{JvfError, Result};
use crate::model::{GroupPath, LayerDescriptor};
use crate::parser::{Catalogs, IngestOutcome, IngestStatus, StreamingIngestor};
use crate::zip_handler::ZipHandler;

/// Shared cancellation flag, polled by the worker between data blocks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

#[derive(Debug)]
pub enum TaskResult {
    Completed(IngestOutcome),
    /// Partial results are discarded.
    Cancelled,
    Failed(String),
}

impl TaskResult {
    /// Human-readable summary for the host's status bar.
    pub fn message(&self) -> String {
        match self {
            TaskResult::Completed(outcome) => format!(
                "Loaded {} layers from {} records",
                outcome.layers.len(),
                outcome.stats.processed_records
            ),
            TaskResult::Cancelled => "Parsing was cancelled".to_string(),
            TaskResult::Failed(message) => format!("Parsing failed: {}", message),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Completed(_))
    }
}

/// Feeds one input file into a session: `.zip` archives entry by entry,
/// anything else as a single XML document.
pub fn ingest_input(
    ingestor: &mut StreamingIngestor,
    path: &Path,
    cancel: &AtomicBool,
) -> Result<IngestStatus> {
    let is_zip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        ZipHandler::new(path).ingest_into(ingestor, cancel)
    } else {
        ingestor.ingest_path(path, cancel)
    }
}

/// Clears the busy flag once the worker is gone, however it ends.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A parse session running on its own thread.
pub struct ParserTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    receiver: Receiver<TaskResult>,
    result: Option<TaskResult>,
}

impl ParserTask {
    pub fn spawn(catalogs: Catalogs, options: IngestOptions, inputs: Vec<PathBuf>) -> Result<Self> {
        Self::spawn_guarded(catalogs, options, inputs, None)
    }

    fn spawn_guarded(
        catalogs: Catalogs,
        options: IngestOptions,
        inputs: Vec<PathBuf>,
        guard: Option<BusyGuard>,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let (sender, receiver) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("jvf-dtm-parser".to_string())
            .spawn(move || {
                let _guard = guard;
                let result = run(catalogs, options, &inputs, &worker_cancel);
                debug!("Parser worker finished: {}", result.message());
                // the receiver may already be gone if the host dropped the task
                let _ = sender.send(result);
            })?;

        Ok(Self {
            cancel,
            handle,
            receiver,
            result: None,
        })
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some() || self.handle.is_finished()
    }

    /// Waits at most `timeout` for the worker. Returns `true` once a result is
    /// available; the host pumps its event loop between calls.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        if self.result.is_some() {
            return true;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => {
                self.result = Some(result);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                self.result = Some(worker_lost());
                true
            }
        }
    }

    /// Blocks until the worker is done.
    pub fn wait(mut self) -> TaskResult {
        let result = match self.result.take() {
            Some(result) => result,
            None => self.receiver.recv().unwrap_or_else(|_| worker_lost()),
        };
        if self.handle.join().is_err() {
            error!("Parser worker panicked");
        }
        result
    }
}

fn worker_lost() -> TaskResult {
    TaskResult::Failed("parser worker terminated unexpectedly".to_string())
}

fn run(
    catalogs: Catalogs,
    options: IngestOptions,
    inputs: &[PathBuf],
    cancel: &CancellationToken,
) -> TaskResult {
    let mut ingestor = StreamingIngestor::new(catalogs, options);
    for input in inputs {
        match ingest_input(&mut ingestor, input, cancel.flag()) {
            Ok(IngestStatus::Completed) => {}
            Ok(IngestStatus::Cancelled) => return TaskResult::Cancelled,
            Err(e) => {
                error!("Error parsing {:?}: {}", input, e);
                return TaskResult::Failed(e.to_string());
            }
        }
    }
    TaskResult::Completed(ingestor.finish())
}

/// Front end that allows one parse in flight at a time.
#[derive(Debug, Clone)]
pub struct Parser {
    catalogs: Catalogs,
    options: IngestOptions,
    busy: Arc<AtomicBool>,
}

impl Parser {
    pub fn new(catalogs: Catalogs, options: IngestOptions) -> Self {
        Self {
            catalogs,
            options,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Starts a parse, or fails with [`JvfError::Busy`] while one is running.
    pub fn parse(&self, inputs: Vec<PathBuf>) -> Result<ParserTask> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(JvfError::Busy);
        }
        let guard = BusyGuard(Arc::clone(&self.busy));
        info!("Starting parse of {} input(s)", inputs.len());
        ParserTask::spawn_guarded(
            self.catalogs.clone(),
            self.options.clone(),
            inputs,
            Some(guard),
        )
    }
}

/// The host side that materialises groups and layers.
pub trait LayerSink {
    fn add_group(&mut self, path: &GroupPath) -> Result<()>;

    fn add_layer(&mut self, layer: &LayerDescriptor) -> Result<()>;
}

/// Applies a finished session to `sink`: every group, then every layer, in the
/// order they were produced. `pump` runs after each `yield_interval` items so
/// the host can process its events. Returns the number of items applied.
pub fn finalize<S, F>(
    outcome: &IngestOutcome,
    sink: &mut S,
    yield_interval: usize,
    mut pump: F,
) -> Result<usize>
where
    S: LayerSink + ?Sized,
    F: FnMut(usize, usize),
{
    let interval = yield_interval.max(1);
    let total = outcome.groups.len() + outcome.layers.len();
    let mut done = 0;

    for group in &outcome.groups {
        sink.add_group(group)?;
        done += 1;
        if done % interval == 0 {
            pump(done, total);
        }
    }
    for layer in &outcome.layers {
        sink.add_layer(layer)?;
        done += 1;
        if done % interval == 0 {
            pump(done, total);
        }
    }

    info!("Finalized {} groups and {} layers", outcome.groups.len(), outcome.layers.len());
    Ok(done)
}
