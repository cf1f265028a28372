//! Background thread for cloud storage calls.
//!
//! Cloud I/O never runs on the tick. Jobs go to a dedicated worker over a
//! channel; results come back as [`CloudCompletion`]s that the owner drains
//! on its own tick. Every job carries the owner's generation number, echoed
//! in the completion, so results issued before a reset can be recognised and
//! dropped.
//!
//! Consecutive writes to the same key are coalesced: only the newest blob is
//! uploaded and the skipped ones complete as [`CloudOutcome::Superseded`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::cloud_storage::{StorageBackend, StorageError};

/// Operation requested from the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudOp {
    /// Fetch a blob.
    Read {
        /// Key
        key: String,
    },
    /// Upload a blob.
    Write {
        /// Key
        key: String,
        /// Blob
        data: Vec<u8>,
    },
    /// Remove a blob.
    Delete {
        /// Key
        key: String,
    },
}

impl CloudOp {
    /// Key the operation targets.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Read { key } | Self::Write { key, .. } | Self::Delete { key } => key,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Delete { .. } => "delete",
        }
    }
}

/// How a job ended.
#[derive(Debug)]
pub enum CloudOutcome {
    /// Read finished with the blob.
    Data(Vec<u8>),
    /// Write or delete finished.
    Done,
    /// A newer write to the same key replaced this one before it ran.
    Superseded,
    /// The backend reported an error.
    Failed(StorageError),
}

/// Result of one job.
#[derive(Debug)]
pub struct CloudCompletion {
    /// Owner generation the job was issued under.
    pub generation: u64,
    /// Job sequence number.
    pub seq: u64,
    /// Operation kind and key, without the payload.
    pub op: CloudOpKind,
    /// Outcome.
    pub outcome: CloudOutcome,
}

/// Payload-free description of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudOpKind {
    /// Read.
    Read,
    /// Write.
    Write,
    /// Delete.
    Delete,
}

impl From<&CloudOp> for CloudOpKind {
    fn from(op: &CloudOp) -> Self {
        match op {
            CloudOp::Read { .. } => Self::Read,
            CloudOp::Write { .. } => Self::Write,
            CloudOp::Delete { .. } => Self::Delete,
        }
    }
}

/// How long dropping a worker waits for an in-flight call before detaching.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug)]
struct Job {
    generation: u64,
    seq: u64,
    op: CloudOp,
}

/// Handle to the worker thread.
///
/// Dropping it closes the job channel and waits at most [`SHUTDOWN_GRACE`]
/// for the thread to exit. A thread stuck in a slow cloud call is detached;
/// its results go nowhere.
pub struct CloudWorker {
    backend: Arc<dyn StorageBackend>,
    jobs: Option<Sender<Job>>,
    completions: Receiver<CloudCompletion>,
    handle: Option<JoinHandle<()>>,
    next_seq: u64,
}

impl std::fmt::Debug for CloudWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudWorker")
            .field("backend", &self.backend.name())
            .field("running", &self.handle.is_some())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl CloudWorker {
    /// Starts a worker for `backend`.
    pub fn spawn(backend: Arc<dyn StorageBackend>) -> std::io::Result<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (done_tx, done_rx) = unbounded::<CloudCompletion>();

        let worker_backend = Arc::clone(&backend);
        let handle = thread::Builder::new()
            .name("ballrush-cloud".to_string())
            .spawn(move || run(worker_backend.as_ref(), &job_rx, &done_tx))?;

        debug!(backend = backend.name(), "Cloud worker started");
        Ok(Self {
            backend,
            jobs: Some(job_tx),
            completions: done_rx,
            handle: Some(handle),
            next_seq: 1,
        })
    }

    /// Backend the worker talks to.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Queues a job. Returns its sequence number, or `None` if the worker is gone.
    pub fn submit(&mut self, generation: u64, op: CloudOp) -> Option<u64> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let jobs = self.jobs.as_ref()?;
        match jobs.send(Job {
            generation,
            seq,
            op,
        }) {
            Ok(()) => Some(seq),
            Err(e) => {
                warn!("Cloud worker stopped, dropping {} job", e.into_inner().op.label());
                None
            },
        }
    }

    /// Completions that are ready, without blocking.
    pub fn try_completions(&self) -> Vec<CloudCompletion> {
        self.completions.try_iter().collect()
    }

    /// Waits up to `timeout` for the next completion.
    pub fn wait_completion(&self, timeout: Duration) -> Option<CloudCompletion> {
        match self.completions.recv_timeout(timeout) {
            Ok(done) => Some(done),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for CloudWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        let Some(handle) = self.handle.take() else {
            return;
        };

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if handle.is_finished() {
            if handle.join().is_err() {
                warn!("Cloud worker panicked");
            }
        } else {
            warn!(
                backend = self.backend.name(),
                "Cloud call still running at shutdown, detaching worker"
            );
        }
    }
}

fn run(backend: &dyn StorageBackend, jobs: &Receiver<Job>, done: &Sender<CloudCompletion>) {
    let mut carried: Option<Job> = None;
    loop {
        let mut job = match carried.take() {
            Some(job) => job,
            None => match jobs.recv() {
                Ok(job) => job,
                Err(_) => break,
            },
        };

        if matches!(job.op, CloudOp::Write { .. }) {
            while let Ok(next) = jobs.try_recv() {
                let same_key_write =
                    matches!(next.op, CloudOp::Write { .. }) && next.op.key() == job.op.key();
                if !same_key_write {
                    carried = Some(next);
                    break;
                }
                let skipped = std::mem::replace(&mut job, next);
                debug!(seq = skipped.seq, "Cloud write superseded");
                let _ = done.send(CloudCompletion {
                    generation: skipped.generation,
                    seq: skipped.seq,
                    op: CloudOpKind::Write,
                    outcome: CloudOutcome::Superseded,
                });
            }
        }

        let outcome = execute(backend, &job.op);
        let completion = CloudCompletion {
            generation: job.generation,
            seq: job.seq,
            op: CloudOpKind::from(&job.op),
            outcome,
        };
        if done.send(completion).is_err() {
            break;
        }
    }
    debug!("Cloud worker stopped");
}

fn execute(backend: &dyn StorageBackend, op: &CloudOp) -> CloudOutcome {
    if !backend.is_available() {
        return CloudOutcome::Failed(StorageError::Unavailable(backend.name().to_string()));
    }
    let result = match op {
        CloudOp::Read { key } => backend.read(key).map(CloudOutcome::Data),
        CloudOp::Write { key, data } => backend.write(key, data).map(|()| CloudOutcome::Done),
        CloudOp::Delete { key } => backend.delete(key).map(|()| CloudOutcome::Done),
    };
    result.unwrap_or_else(CloudOutcome::Failed)
}
