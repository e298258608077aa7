//! Sync coordinator: lifecycle state machine and cycle scheduling.
//!
//! One coordinator instance owns all mutable sync state for the process:
//! the active provider, the state machine value, the pending flag, and the
//! timers. Local edits arrive through [`SyncCoordinator::notify_change`]
//! (the store subscription installs this automatically), get debounced into
//! a push cycle, and a periodic tick acts as a safety net if a debounce
//! timer was lost. At most one cycle runs at a time; a trigger that arrives
//! while a cycle is in flight is dropped, and the pending flag ensures the
//! next tick retries.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SyncOptions;
use crate::document::{now_ms, Document};
use crate::error::SyncError;
use crate::history::{HistoryLog, VersionSnapshot};
use crate::intercept::DocumentStore;
use crate::merge::merge;
use crate::provider::CloudProvider;

/// State machine value of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No provider active; entered only by explicit deactivation
    Inactive,
    /// Unsynced local changes exist
    Pending,
    /// A push or pull-merge cycle is in flight
    Syncing,
    /// Local and remote agree as of the last cycle
    Synced,
    /// The last cycle failed; the error message is retained
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Inactive => "inactive",
            SyncState::Pending => "pending",
            SyncState::Syncing => "syncing",
            SyncState::Synced => "synced",
            SyncState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Mutable coordinator state, guarded by one lock that is never held
/// across an await point.
#[derive(Debug)]
struct Shared {
    state: SyncState,
    last_error: Option<String>,
    pending: bool,
    /// Bumped on attach/deactivate; timers and in-flight cycles compare it
    /// so stale completions are ignored
    epoch: u64,
    /// Bumped on every local change; only the newest debounce timer fires
    debounce_gen: u64,
    /// Bumped on every local change; a cycle clears the pending flag only
    /// if no edit arrived while it was in flight
    change_seq: u64,
}

struct Inner {
    store: DocumentStore,
    options: SyncOptions,
    shared: Mutex<Shared>,
    provider: tokio::sync::Mutex<Option<Box<dyn CloudProvider>>>,
    subscribed: AtomicBool,
}

/// Drives synchronization between the local store and the active provider.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    pub fn new(store: DocumentStore, options: SyncOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                options,
                shared: Mutex::new(Shared {
                    state: SyncState::Inactive,
                    last_error: None,
                    pending: false,
                    epoch: 0,
                    debounce_gen: 0,
                    change_seq: 0,
                }),
                provider: tokio::sync::Mutex::new(None),
                subscribed: AtomicBool::new(false),
            }),
        }
    }

    /// The document store this coordinator watches.
    pub fn store(&self) -> &DocumentStore {
        &self.inner.store
    }

    /// Current state machine value.
    pub fn state(&self) -> SyncState {
        self.inner.shared.lock().unwrap().state
    }

    /// Message of the last failed cycle, retained until a cycle succeeds.
    pub fn last_error(&self) -> Option<String> {
        self.inner.shared.lock().unwrap().last_error.clone()
    }

    /// Version snapshots, newest first, capped at the configured size.
    pub fn history(&self) -> Result<Vec<VersionSnapshot>, SyncError> {
        self.history_log().entries()
    }

    /// Replaces the live document with a history snapshot's contents.
    ///
    /// Goes through the notifying write path, so the restored state counts
    /// as a local change and will be pushed.
    pub fn restore(&self, index: usize) -> Result<(), SyncError> {
        let snapshot = self.history_log().snapshot(index)?;
        self.inner.store.put_document(&snapshot.document)
    }

    /// Installs a provider and starts the periodic timer without running an
    /// initial cycle. Re-entry after deactivation resets to a fresh cycle.
    pub async fn attach(&self, provider: Box<dyn CloudProvider>) {
        let epoch = {
            let mut s = self.inner.shared.lock().unwrap();
            s.epoch += 1;
            s.state = SyncState::Synced;
            s.pending = false;
            s.last_error = None;
            s.epoch
        };
        *self.inner.provider.lock().await = Some(provider);
        self.subscribe_once();
        Inner::spawn_periodic(&self.inner, epoch);
        debug!(epoch, "provider attached");
    }

    /// Activates sync: installs the provider, then runs the initial
    /// pull-and-merge cycle. Returns whether local data changed.
    pub async fn activate(&self, provider: Box<dyn CloudProvider>) -> Result<bool, SyncError> {
        self.attach(provider).await;
        self.pull_and_merge().await
    }

    /// Cancels timers, discards the provider and persisted credentials,
    /// and parks the state machine at `Inactive`.
    pub async fn deactivate(&self) -> Result<(), SyncError> {
        {
            let mut s = self.inner.shared.lock().unwrap();
            s.epoch += 1;
            s.debounce_gen += 1;
            s.pending = false;
            s.state = SyncState::Inactive;
            s.last_error = None;
        }
        *self.inner.provider.lock().await = None;
        self.inner.store.clear_sync_config()?;
        info!("sync deactivated");
        Ok(())
    }

    /// Signals that a local edit occurred.
    ///
    /// Marks the document pending and (re)starts the debounce timer, so a
    /// burst of edits coalesces into one push cycle. Must be called from
    /// within a tokio runtime. No-op while inactive.
    pub fn notify_change(&self) {
        Inner::notify_change(&self.inner);
    }

    /// Forces an immediate push cycle.
    pub async fn sync_now(&self) -> Result<bool, SyncError> {
        Inner::push_cycle(&self.inner).await
    }

    /// Best-effort push of pending changes before teardown (the page-exit
    /// signal). Returns `Ok(false)` when nothing was pending.
    pub async fn flush(&self) -> Result<bool, SyncError> {
        let pending = self.inner.shared.lock().unwrap().pending;
        if !pending {
            return Ok(false);
        }
        debug!("flushing pending changes before teardown");
        Inner::push_cycle(&self.inner).await
    }

    /// Runs a pull-then-merge-then-push cycle (activation and page load).
    /// Returns whether local data actually changed, so the caller can
    /// refresh dependent views.
    pub async fn pull_and_merge(&self) -> Result<bool, SyncError> {
        Inner::pull_merge_cycle(&self.inner).await
    }

    fn history_log(&self) -> HistoryLog {
        HistoryLog::new(self.inner.store.clone(), self.inner.options.history_cap)
    }

    /// Subscribes to store writes, at most once per coordinator.
    fn subscribe_once(&self) {
        if self.inner.subscribed.swap(true, Ordering::SeqCst) {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        self.inner.store.subscribe(move |_kind| {
            if let Some(inner) = weak.upgrade() {
                Inner::notify_change(&inner);
            }
        });
    }
}

/// Ticket for one sync cycle: the epoch it belongs to and the change
/// sequence at the moment the local document was read.
struct CycleTicket {
    epoch: u64,
    seq_at_read: u64,
}

impl Inner {
    /// Claims the single cycle slot. `Ok(None)` means another cycle is in
    /// flight and this trigger is dropped.
    fn begin_cycle(inner: &Arc<Inner>) -> Result<Option<CycleTicket>, SyncError> {
        let mut s = inner.shared.lock().unwrap();
        match s.state {
            SyncState::Inactive => Err(SyncError::NotConfigured),
            SyncState::Syncing => Ok(None),
            _ => {
                s.state = SyncState::Syncing;
                Ok(Some(CycleTicket {
                    epoch: s.epoch,
                    seq_at_read: s.change_seq,
                }))
            }
        }
    }

    fn is_stale(inner: &Arc<Inner>, epoch: u64) -> bool {
        inner.shared.lock().unwrap().epoch != epoch
    }

    /// Applies a successful cycle: persists the confirmed document,
    /// records a version snapshot, and clears the pending flag unless a
    /// local edit landed while the cycle was in flight.
    fn settle_ok(inner: &Arc<Inner>, ticket: &CycleTicket, doc: &Document) -> Result<(), SyncError> {
        if Self::is_stale(inner, ticket.epoch) {
            debug!("discarding sync result after deactivation");
            return Ok(());
        }
        // Edits that landed while the cycle was on the wire exist only in
        // the live document; writing back the captured copy would erase
        // them. Keep the live profiles and adopt only the confirmed
        // metadata, so the retriggered cycle pushes the newer content.
        let live = inner.store.document()?;
        if live.same_profiles(doc) {
            inner.store.apply_synced(doc)?;
        } else {
            debug!("local edits landed mid-cycle, keeping them");
            let mut kept = live;
            kept.sync_meta = doc.sync_meta.clone();
            inner.store.apply_synced(&kept)?;
        }
        HistoryLog::new(inner.store.clone(), inner.options.history_cap)
            .record(doc, doc.sync_meta.last_sync_at)?;

        let mut s = inner.shared.lock().unwrap();
        if s.epoch == ticket.epoch {
            s.last_error = None;
            if s.change_seq == ticket.seq_at_read {
                s.pending = false;
                s.state = SyncState::Synced;
            } else {
                // Edits arrived mid-cycle; they were not in the pushed
                // document, so the next tick must pick them up.
                s.state = SyncState::Pending;
            }
        }
        info!(version = doc.sync_meta.version, "sync cycle complete");
        Ok(())
    }

    fn settle_err(inner: &Arc<Inner>, ticket: &CycleTicket, error: &SyncError) {
        let mut s = inner.shared.lock().unwrap();
        if s.epoch == ticket.epoch {
            s.last_error = Some(error.to_string());
            s.state = SyncState::Error;
            // Keep retrying on the next tick or local change; no local
            // edit is ever silently dropped.
            s.pending = true;
        }
        warn!(error = %error, "sync cycle failed");
    }

    async fn push_cycle(inner: &Arc<Inner>) -> Result<bool, SyncError> {
        let Some(ticket) = Self::begin_cycle(inner)? else {
            debug!("push requested while a cycle is in flight, dropping");
            return Ok(false);
        };

        let outcome = Self::run_push(inner).await;
        match outcome {
            Ok(doc) => match Self::settle_ok(inner, &ticket, &doc) {
                Ok(()) => Ok(true),
                Err(e) => {
                    Self::settle_err(inner, &ticket, &e);
                    Err(e)
                }
            },
            Err(e) => {
                Self::settle_err(inner, &ticket, &e);
                Err(e)
            }
        }
    }

    /// Reads the current local document (after any synchronous stamping),
    /// bumps its top-level metadata, and pushes it.
    async fn run_push(inner: &Arc<Inner>) -> Result<Document, SyncError> {
        let mut doc = inner.store.document()?;
        doc.sync_meta.version += 1;
        doc.sync_meta.last_sync_at = now_ms();

        let guard = inner.provider.lock().await;
        let provider = guard.as_ref().ok_or(SyncError::NotConfigured)?;
        provider.push(&doc).await?;
        Ok(doc)
    }

    async fn pull_merge_cycle(inner: &Arc<Inner>) -> Result<bool, SyncError> {
        let Some(ticket) = Self::begin_cycle(inner)? else {
            debug!("pull-merge requested while a cycle is in flight, dropping");
            return Ok(false);
        };

        match Self::run_pull_merge(inner, &ticket).await {
            Ok(Some((doc, changed))) => match Self::settle_ok(inner, &ticket, &doc) {
                Ok(()) => Ok(changed),
                Err(e) => {
                    Self::settle_err(inner, &ticket, &e);
                    Err(e)
                }
            },
            // Deactivated while the pull was in flight
            Ok(None) => Ok(false),
            Err(e) => {
                Self::settle_err(inner, &ticket, &e);
                Err(e)
            }
        }
    }

    async fn run_pull_merge(
        inner: &Arc<Inner>,
        ticket: &CycleTicket,
    ) -> Result<Option<(Document, bool)>, SyncError> {
        let guard = inner.provider.lock().await;
        let provider = guard.as_ref().ok_or(SyncError::NotConfigured)?;

        let remote = provider.pull().await?;
        let local = inner.store.document()?;

        let doc = match &remote {
            Some(remote) if remote.sync_meta.last_sync_at > local.sync_meta.last_sync_at => {
                debug!(
                    remote_version = remote.sync_meta.version,
                    local_version = local.sync_meta.version,
                    "remote is newer, merging"
                );
                merge(&local, Some(remote), now_ms())
            }
            Some(_) => {
                // Local copy is current; skip the merge and just refresh
                // the remote's copy and version.
                let mut doc = local.clone();
                doc.sync_meta.version += 1;
                doc.sync_meta.last_sync_at = now_ms();
                doc
            }
            None => {
                debug!("no remote document yet, first sync is push-only");
                let mut doc = local.clone();
                doc.sync_meta.version += 1;
                doc.sync_meta.last_sync_at = now_ms();
                doc
            }
        };
        let changed = !doc.same_profiles(&local);

        if Self::is_stale(inner, ticket.epoch) {
            return Ok(None);
        }
        // Persist the merge result before pushing. If the push below
        // fails, the merged document stays local and the pending flag
        // retries the push on the next tick (no rollback).
        inner.store.apply_synced(&doc)?;
        provider.push(&doc).await?;
        Ok(Some((doc, changed)))
    }

    fn notify_change(inner: &Arc<Inner>) {
        let gen = {
            let mut s = inner.shared.lock().unwrap();
            if s.state == SyncState::Inactive {
                return;
            }
            s.pending = true;
            s.change_seq += 1;
            s.debounce_gen += 1;
            if s.state != SyncState::Syncing {
                s.state = SyncState::Pending;
            }
            s.debounce_gen
        };

        let weak = Arc::downgrade(inner);
        let delay = inner.options.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else { return };
            {
                let s = inner.shared.lock().unwrap();
                // A newer change restarted the timer, or the flag was
                // already handled.
                if s.debounce_gen != gen || !s.pending {
                    return;
                }
            }
            debug!("debounce elapsed, starting push cycle");
            if let Err(e) = Inner::push_cycle(&inner).await {
                // Recorded in the state machine; retried by the next tick.
                debug!(error = %e, "debounced push failed");
            }
        });
    }

    /// Safety net: if a pending flag is set when the periodic tick fires
    /// (e.g. a debounce timer was lost to suspension), push.
    fn spawn_periodic(inner: &Arc<Inner>, epoch: u64) {
        let weak = Arc::downgrade(inner);
        let period = inner.options.periodic;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let run = {
                    let s = inner.shared.lock().unwrap();
                    if s.epoch != epoch {
                        break;
                    }
                    s.pending
                };
                if run {
                    debug!("periodic tick found pending changes");
                    if let Err(e) = Inner::push_cycle(&inner).await {
                        debug!(error = %e, "periodic push failed");
                    }
                }
            }
        });
    }
}
