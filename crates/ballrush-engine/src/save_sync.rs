//! Local-first save persistence with best-effort cloud sync.
//!
//! The local store is the durability guarantee: [`SaveSyncService::save`]
//! writes it synchronously and only then queues an upload. Cloud work runs on
//! a [`CloudWorker`] and its results are applied in [`SaveSyncService::poll`],
//! so no cloud call ever blocks the tick. The one exception is
//! [`SaveSyncService::load`], which waits for the cloud copy at most
//! `timeout` before falling back to local data.
//!
//! Cloud errors never leave this module; they are logged and reflected in
//! [`SyncStatus`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use ballrush_common::BallrushResult;
use tracing::{debug, info, warn};

use crate::cloud_storage::{StorageBackend, StorageError, SyncStatus};
use crate::cloud_worker::{CloudCompletion, CloudOp, CloudOpKind, CloudOutcome, CloudWorker};
use crate::save_record::{ConflictPolicy, SaveRecord};

/// Default cloud read timeout.
pub const DEFAULT_CLOUD_TIMEOUT: Duration = Duration::from_secs(3);

/// Tunables for [`SaveSyncService`].
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Key the record is stored under in both stores.
    pub key: String,
    /// Reconciliation rule for local vs. cloud.
    pub policy: ConflictPolicy,
    /// Longest wait for a blocking cloud read.
    pub timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            key: "save.dat".to_string(),
            policy: ConflictPolicy::default(),
            timeout: DEFAULT_CLOUD_TIMEOUT,
        }
    }
}

/// Account-level outcomes of background cloud work.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A cloud record existed and was merged into the local one.
    AccountLoaded(SaveRecord),
    /// No cloud record existed; the local one is being uploaded.
    AccountCreated,
}

/// Owns both copies of the save record.
#[derive(Debug)]
pub struct SaveSyncService {
    local: Arc<dyn StorageBackend>,
    cloud: Option<CloudWorker>,
    options: SyncOptions,
    authenticated: bool,
    record: SaveRecord,
    status: SyncStatus,
    /// Bumped by `clear_all`; completions from older generations are stale.
    generation: u64,
    pending_upload: Option<u64>,
    account_check: Option<u64>,
    /// Completions received while blocked in `load`.
    deferred: Vec<CloudCompletion>,
}

impl SaveSyncService {
    /// Creates the service. A cloud backend gets its own worker thread.
    #[must_use]
    pub fn new(
        local: Arc<dyn StorageBackend>,
        cloud: Option<Arc<dyn StorageBackend>>,
        options: SyncOptions,
    ) -> Self {
        let cloud = cloud.and_then(|backend| match CloudWorker::spawn(backend) {
            Ok(worker) => Some(worker),
            Err(e) => {
                warn!("Could not start cloud worker, continuing local-only: {e}");
                None
            },
        });

        Self {
            local,
            cloud,
            options,
            authenticated: false,
            record: SaveRecord::default(),
            status: SyncStatus::LocalOnly,
            generation: 0,
            pending_upload: None,
            account_check: None,
            deferred: Vec::new(),
        }
    }

    /// Last record saved or loaded.
    #[must_use]
    pub fn record(&self) -> &SaveRecord {
        &self.record
    }

    /// Cloud sync state.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Whether a cloud backend was configured.
    #[must_use]
    pub fn has_cloud(&self) -> bool {
        self.cloud.is_some()
    }

    /// Whether the player is signed in to the cloud.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Conflict policy in effect.
    #[must_use]
    pub fn policy(&self) -> ConflictPolicy {
        self.options.policy
    }

    /// Marks the cloud as signed in or out.
    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
        if !authenticated {
            self.status = SyncStatus::LocalOnly;
            self.account_check = None;
        }
    }

    fn usable_cloud(&mut self) -> Option<&mut CloudWorker> {
        if !self.authenticated {
            return None;
        }
        self.cloud
            .as_mut()
            .filter(|worker| worker.backend().is_available())
    }

    // ========================================================================
    // Save / Load / Clear
    // ========================================================================

    /// Writes the record locally, then queues a cloud upload.
    ///
    /// Only a local write failure is reported.
    pub fn save(&mut self, record: &SaveRecord) -> BallrushResult<()> {
        let bytes = record.encode()?;
        self.local.write(&self.options.key, &bytes)?;
        self.record = record.clone();
        debug!(bytes = bytes.len(), "Saved record locally");
        self.queue_upload(bytes);
        Ok(())
    }

    fn queue_upload(&mut self, bytes: Vec<u8>) {
        let generation = self.generation;
        let key = self.options.key.clone();
        let Some(worker) = self.usable_cloud() else {
            return;
        };
        match worker.submit(generation, CloudOp::Write { key, data: bytes }) {
            Some(seq) => {
                self.pending_upload = Some(seq);
                self.status = SyncStatus::PendingUpload;
            },
            None => self.status = SyncStatus::Failed,
        }
    }

    /// Loads the record: cloud first when signed in, then local, then defaults.
    ///
    /// When both copies exist they are reconciled with the conflict policy and
    /// the result is written back locally.
    pub fn load(&mut self) -> SaveRecord {
        let local = self.read_local();
        let cloud = self.read_cloud_blocking();

        let record = match (local, cloud) {
            (Some(local), Some(cloud)) => {
                let resolved = self.options.policy.resolve(&local, &cloud);
                if resolved != local {
                    self.write_local_quietly(&resolved);
                }
                resolved
            },
            (None, Some(cloud)) => {
                self.write_local_quietly(&cloud);
                cloud
            },
            (Some(local), None) => local,
            (None, None) => {
                info!("No save found, starting fresh");
                SaveRecord::default()
            },
        };

        self.record = record.clone();
        record
    }

    /// Deletes both copies and resets the in-memory record.
    ///
    /// Cloud results still in flight are discarded.
    pub fn clear_all(&mut self) -> BallrushResult<()> {
        self.generation += 1;
        self.pending_upload = None;
        self.account_check = None;
        self.deferred.clear();
        self.record = SaveRecord::default();
        self.status = SyncStatus::LocalOnly;

        let generation = self.generation;
        let key = self.options.key.clone();
        if let Some(worker) = self.usable_cloud() {
            worker.submit(generation, CloudOp::Delete { key });
        }

        match self.local.delete(&self.options.key) {
            Ok(()) => {
                info!("Cleared saved data");
                Ok(())
            },
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_local(&self) -> Option<SaveRecord> {
        match self.local.read(&self.options.key) {
            Ok(bytes) => match SaveRecord::decode(&bytes) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Local save unreadable, ignoring it: {e}");
                    None
                },
            },
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!("Failed to read local save: {e}");
                None
            },
        }
    }

    fn write_local_quietly(&self, record: &SaveRecord) {
        let result = record
            .encode()
            .and_then(|bytes| self.local.write(&self.options.key, &bytes).map_err(Into::into));
        if let Err(e) = result {
            warn!("Failed to write reconciled save locally: {e}");
        }
    }

    fn read_cloud_blocking(&mut self) -> Option<SaveRecord> {
        let generation = self.generation;
        let key = self.options.key.clone();
        let timeout = self.options.timeout;
        let worker = self.usable_cloud()?;
        let seq = worker.submit(generation, CloudOp::Read { key })?;

        let deadline = Instant::now() + timeout;
        let mut found = None;
        let mut deferred = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match worker.wait_completion(remaining) {
                Some(done) if done.seq == seq => {
                    found = Some(done);
                    break;
                },
                Some(other) => deferred.push(other),
                None => break,
            }
        }
        self.deferred.extend(deferred);

        let Some(done) = found else {
            warn!(
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "Cloud load timed out, using local data"
            );
            self.status = SyncStatus::Failed;
            return None;
        };

        match done.outcome {
            CloudOutcome::Data(bytes) => match SaveRecord::decode(&bytes) {
                Ok(record) => {
                    info!("Loaded save from cloud");
                    self.status = SyncStatus::Synced;
                    Some(record)
                },
                Err(e) => {
                    warn!("Cloud save unreadable, using local data: {e}");
                    self.status = SyncStatus::Failed;
                    None
                },
            },
            CloudOutcome::Failed(e) if e.is_not_found() => {
                debug!("No cloud save yet");
                None
            },
            CloudOutcome::Failed(e) => {
                warn!("Cloud load failed, using local data: {e}");
                self.status = SyncStatus::Failed;
                None
            },
            CloudOutcome::Done | CloudOutcome::Superseded => None,
        }
    }

    // ========================================================================
    // Account check and polling
    // ========================================================================

    /// Starts looking for the signed-in account's cloud record.
    ///
    /// The answer arrives from [`Self::poll`] as [`SyncEvent::AccountLoaded`]
    /// or [`SyncEvent::AccountCreated`]. Returns `false` if the cloud is not
    /// usable.
    pub fn begin_account_check(&mut self) -> bool {
        let generation = self.generation;
        let key = self.options.key.clone();
        let Some(worker) = self.usable_cloud() else {
            debug!("Cloud not usable, skipping account check");
            return false;
        };
        match worker.submit(generation, CloudOp::Read { key }) {
            Some(seq) => {
                self.account_check = Some(seq);
                true
            },
            None => false,
        }
    }

    /// Applies finished cloud work. Call once per tick.
    pub fn poll(&mut self) -> Vec<SyncEvent> {
        let mut completions = std::mem::take(&mut self.deferred);
        if let Some(worker) = &self.cloud {
            completions.extend(worker.try_completions());
        }

        let mut events = Vec::new();
        for done in completions {
            if done.generation != self.generation {
                debug!(seq = done.seq, "Dropping stale cloud completion");
                continue;
            }
            if let Some(event) = self.apply(done) {
                events.push(event);
            }
        }
        events
    }

    fn apply(&mut self, done: CloudCompletion) -> Option<SyncEvent> {
        match done.op {
            CloudOpKind::Write => {
                let latest = self.pending_upload == Some(done.seq);
                match done.outcome {
                    CloudOutcome::Done if latest => {
                        self.pending_upload = None;
                        self.status = SyncStatus::Synced;
                        debug!("Cloud save uploaded");
                    },
                    CloudOutcome::Failed(e) => {
                        warn!("Cloud save failed, keeping local copy: {e}");
                        if latest {
                            self.pending_upload = None;
                            self.status = SyncStatus::Failed;
                        }
                    },
                    _ => {},
                }
                None
            },
            CloudOpKind::Read if self.account_check == Some(done.seq) => {
                self.account_check = None;
                self.finish_account_check(done.outcome)
            },
            CloudOpKind::Read => None,
            CloudOpKind::Delete => {
                if let CloudOutcome::Failed(e) = done.outcome {
                    if !e.is_not_found() {
                        warn!("Failed to delete cloud save: {e}");
                    }
                }
                None
            },
        }
    }

    fn finish_account_check(&mut self, outcome: CloudOutcome) -> Option<SyncEvent> {
        let cloud = match outcome {
            CloudOutcome::Data(bytes) => match SaveRecord::decode(&bytes) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Cloud save unreadable, replacing it: {e}");
                    None
                },
            },
            CloudOutcome::Failed(StorageError::NotFound(_)) => None,
            CloudOutcome::Failed(e) => {
                warn!("Account check failed, continuing local-only: {e}");
                self.status = SyncStatus::Failed;
                return None;
            },
            CloudOutcome::Done | CloudOutcome::Superseded => return None,
        };

        match cloud {
            Some(cloud) => {
                let resolved = self.options.policy.resolve(&self.record, &cloud);
                if resolved != self.record {
                    self.write_local_quietly(&resolved);
                }
                self.record = resolved.clone();
                self.status = SyncStatus::Synced;
                info!("Account loaded from cloud");
                Some(SyncEvent::AccountLoaded(resolved))
            },
            None => {
                info!("Creating cloud record for account");
                match self.record.encode() {
                    Ok(bytes) => self.queue_upload(bytes),
                    Err(e) => warn!("Could not encode record for upload: {e}"),
                }
                Some(SyncEvent::AccountCreated)
            },
        }
    }
}
