//! Roster cache and invalidation sequencing
//!
//! [`RosterCache`] is the runtime-free state machine deciding when a fetch
//! must start. [`CacheWorker`] drives it: writers send [`CacheSignal`]s over
//! an mpsc queue through an [`Invalidator`], the worker runs at most one
//! `fetch_all` at a time and publishes a [`RosterView`] on a watch channel.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::api::client::RosterClient;
use crate::api::models::{Record, RecordId, SharedSnapshot, Snapshot};
use crate::error::{RemoteError, Result, RosterError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStatus {
    /// Holds a valid snapshot, or none yet
    #[default]
    Idle,
    /// A `fetch_all` is in flight
    Fetching,
    /// Data may be out of date and the last fetch did not fix that
    Stale,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Idle => write!(f, "idle"),
            CacheStatus::Fetching => write!(f, "fetching"),
            CacheStatus::Stale => write!(f, "stale"),
        }
    }
}

/// Which writer asked for the invalidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationIntent {
    Import { records: usize },
    Edit { id: RecordId },
    BatchDelete { ids: usize },
}

impl fmt::Display for MutationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationIntent::Import { records } => write!(f, "import of {} records", records),
            MutationIntent::Edit { id } => write!(f, "edit of record {}", id),
            MutationIntent::BatchDelete { ids } => write!(f, "batch delete of {} records", ids),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSignal {
    /// Plain fetch request (initial load, manual refresh)
    Fetch,
    /// Data changed remotely; refetch before trusting it
    Invalidate(MutationIntent),
}

/// What consumers see of the cache
#[derive(Debug, Clone, Default)]
pub struct RosterView {
    pub snapshot: Option<SharedSnapshot>,
    pub status: CacheStatus,
    /// Set from the first invalidation until a fetch issued after it succeeds
    pub stale: bool,
    /// An invalidation arrived mid-fetch; one more fetch follows
    pub refetch_pending: bool,
    /// Incremented on every snapshot replacement
    pub generation: u64,
    pub last_error: Option<String>,
    /// Number of signals the worker has processed
    pub signals_handled: u64,
}

impl RosterView {
    pub fn is_loading(&self) -> bool {
        self.status == CacheStatus::Fetching
    }

    pub fn records(&self) -> &[Record] {
        self.snapshot.as_deref().map(Snapshot::records).unwrap_or(&[])
    }
}

/// Fetch sequencing state, independent of any runtime
///
/// Each transition returns whether the caller must start a `fetch_all` now.
#[derive(Debug, Default)]
pub struct RosterCache {
    view: RosterView,
}

impl RosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &RosterView {
        &self.view
    }

    pub fn status(&self) -> CacheStatus {
        self.view.status
    }

    /// `Idle/Stale → Fetching`; dropped while a fetch is in flight
    pub fn request_fetch(&mut self) -> bool {
        if self.view.status == CacheStatus::Fetching {
            debug!("Fetch request ignored, fetch already in flight");
            return false;
        }
        self.view.status = CacheStatus::Fetching;
        true
    }

    /// Mark data stale. Starts a fetch unless one is in flight, in which case
    /// a single follow-up is scheduled no matter how many signals arrive.
    pub fn invalidate(&mut self) -> bool {
        self.view.stale = true;
        if self.view.status == CacheStatus::Fetching {
            if !self.view.refetch_pending {
                debug!("Invalidated mid-fetch, scheduling follow-up fetch");
            }
            self.view.refetch_pending = true;
            return false;
        }
        debug!("Cache {} -> stale -> fetching", self.view.status);
        self.view.status = CacheStatus::Fetching;
        true
    }

    /// Settle the in-flight fetch
    pub fn complete(&mut self, result: std::result::Result<Snapshot, RemoteError>) -> bool {
        match result {
            Ok(snapshot) => {
                self.view.snapshot = Some(Arc::new(snapshot));
                self.view.generation += 1;
                self.view.last_error = None;
                if !self.view.refetch_pending {
                    self.view.status = CacheStatus::Idle;
                    self.view.stale = false;
                }
            }
            Err(err) => {
                self.view.last_error = Some(err.to_string());
                self.view.stale = true;
                if !self.view.refetch_pending {
                    self.view.status = CacheStatus::Stale;
                }
            }
        }

        if self.view.refetch_pending {
            // Status stays Fetching for the follow-up
            self.view.refetch_pending = false;
            return true;
        }
        false
    }
}

/// Writers' handle onto the cache signal queue
#[derive(Debug, Clone)]
pub struct Invalidator {
    tx: mpsc::UnboundedSender<CacheSignal>,
    sent: Arc<AtomicU64>,
}

impl Invalidator {
    /// Signal that a mutation settled and the cache must refetch
    ///
    /// Never fails: if the worker is gone there is no cache left to refresh.
    pub fn invalidate(&self, intent: MutationIntent) {
        debug!("Invalidating roster cache after {}", intent);
        if self.send(CacheSignal::Invalidate(intent)).is_err() {
            warn!("Roster cache worker has stopped, invalidation dropped");
        }
    }

    pub fn request_fetch(&self) -> Result<()> {
        self.send(CacheSignal::Fetch)
    }

    /// Number of signals successfully queued so far
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    fn send(&self, signal: CacheSignal) -> Result<()> {
        self.tx.send(signal).map_err(|_| RosterError::CacheClosed)?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

type FetchResult = std::result::Result<Snapshot, RemoteError>;

/// Task owning the [`RosterCache`]
pub struct CacheWorker {
    client: Arc<dyn RosterClient>,
    cache: RosterCache,
    signals: mpsc::UnboundedReceiver<CacheSignal>,
    results_tx: mpsc::UnboundedSender<FetchResult>,
    results_rx: mpsc::UnboundedReceiver<FetchResult>,
    view_tx: watch::Sender<RosterView>,
}

/// Spawn a cache worker on the current runtime
///
/// The worker exits once every [`Invalidator`] clone is dropped and no fetch
/// is in flight.
pub fn spawn_cache(
    client: Arc<dyn RosterClient>,
) -> (Invalidator, watch::Receiver<RosterView>, JoinHandle<()>) {
    let (tx, signals) = mpsc::unbounded_channel();
    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(RosterView::default());

    let worker = CacheWorker {
        client,
        cache: RosterCache::new(),
        signals,
        results_tx,
        results_rx,
        view_tx,
    };
    let handle = tokio::spawn(worker.run());

    let invalidator = Invalidator {
        tx,
        sent: Arc::new(AtomicU64::new(0)),
    };
    (invalidator, view_rx, handle)
}

impl CacheWorker {
    pub async fn run(mut self) {
        let mut signals_open = true;

        loop {
            tokio::select! {
                signal = self.signals.recv(), if signals_open => match signal {
                    Some(signal) => self.handle_signal(signal),
                    None => signals_open = false,
                },
                Some(result) = self.results_rx.recv() => self.handle_result(result),
            }

            if !signals_open && self.cache.status() != CacheStatus::Fetching {
                break;
            }
        }

        debug!("Roster cache worker stopped");
    }

    fn handle_signal(&mut self, signal: CacheSignal) {
        let start = match &signal {
            CacheSignal::Fetch => self.cache.request_fetch(),
            CacheSignal::Invalidate(intent) => {
                debug!("Cache received invalidation after {}", intent);
                self.cache.invalidate()
            }
        };
        self.cache.view.signals_handled += 1;
        if start {
            self.start_fetch();
        }
        self.publish();
    }

    fn handle_result(&mut self, result: FetchResult) {
        match &result {
            Ok(snapshot) => info!("Fetched {} roster records", snapshot.len()),
            Err(err) => error!("Roster fetch failed: {}", err),
        }
        if self.cache.complete(result) {
            self.start_fetch();
        }
        self.publish();
    }

    fn start_fetch(&self) {
        let client = Arc::clone(&self.client);
        let results = self.results_tx.clone();
        debug!("Starting roster fetch");
        tokio::spawn(async move {
            let result = client.fetch_all().await;
            // Receiver lives as long as the worker
            let _ = results.send(result);
        });
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.cache.view().clone());
    }
}
