//! Two-tier persistence for the plan.
//!
//! Reads go to the remote artifact store first and fall back to the local
//! cache; writes land in the local cache synchronously and are pushed to the
//! remote store in a background task. Remote trouble never surfaces as an
//! error: the caller just sees possibly stale data.
//!
//! Every save bumps a generation counter under the commit lock. A remote answer
//! is only mirrored into the cache when no save happened while it was in
//! flight and no push is pending; otherwise the cache, which is newer, answers.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::api::{ApiError, ArtifactStore};
use crate::db::LocalCache;
use crate::models::PlanState;

use super::error::PlanError;

/// Remote artifact key the dashboard has always used
pub const DEFAULT_ARTIFACT_KEY: &str = "trading-plan";

/// Local cache slot for the plan
pub const LOCAL_PLAN_KEY: &str = "trading_plan_data_v1";

/// Which tier answered a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Remote,
    Local,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedPlan {
    pub state: PlanState,
    pub source: PlanSource,
    /// Save generation the answer is current for
    #[serde(skip)]
    pub generation: u64,
}

/// Explicit answer to "wipe the whole plan?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetConfirmation {
    Confirmed,
    Declined,
}

impl From<bool> for ResetConfirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            ResetConfirmation::Confirmed
        } else {
            ResetConfirmation::Declined
        }
    }
}

/// Background remote write started by a save. Dropping it does not cancel the write.
pub struct RemoteWrite {
    handle: Option<JoinHandle<Result<(), ApiError>>>,
}

impl RemoteWrite {
    fn skipped() -> Self {
        Self { handle: None }
    }

    /// True when a remote write was actually started
    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait for the remote write. True when the remote store accepted it.
    pub async fn finished(self) -> bool {
        match self.handle {
            Some(handle) => matches!(handle.await, Ok(Ok(()))),
            None => false,
        }
    }
}

/// Counts a remote push as in flight until dropped, even if its task is aborted
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn start(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct PlanStore {
    cache: LocalCache,
    remote: Option<Arc<dyn ArtifactStore>>,
    artifact_key: String,
    writes_in_flight: Arc<AtomicUsize>,
    generation: Arc<AtomicU64>,
    commit_lock: Arc<Mutex<()>>,
}

impl PlanStore {
    pub fn new(cache: LocalCache, remote: Option<Arc<dyn ArtifactStore>>) -> Self {
        Self::with_artifact_key(cache, remote, DEFAULT_ARTIFACT_KEY)
    }

    pub fn with_artifact_key(
        cache: LocalCache,
        remote: Option<Arc<dyn ArtifactStore>>,
        artifact_key: &str,
    ) -> Self {
        Self {
            cache,
            remote,
            artifact_key: artifact_key.to_string(),
            writes_in_flight: Arc::new(AtomicUsize::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Number of saves so far. Changes whenever the local copy is replaced.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// True while a remote push started by `save` has not finished
    pub fn has_pending_writes(&self) -> bool {
        self.writes_in_flight.load(Ordering::SeqCst) > 0
    }

    /// Load the plan: remote, then local cache, then the default plan.
    ///
    /// A good remote answer is mirrored into the local cache, unless a save
    /// landed while it was in flight. While a push is pending the remote tier
    /// is not asked at all.
    pub async fn load(&self) -> LoadedPlan {
        let seen = self.generation();

        if let Some(remote) = &self.remote {
            if self.has_pending_writes() {
                log::debug!("Push in flight, answering plan load from local cache");
            } else {
                match self.fetch_remote(remote.as_ref()).await {
                    Ok(state) => {
                        if let Some(loaded) = self.mirror_if_current(state, seen) {
                            log::debug!("Plan loaded from {} store", remote.store_name());
                            return loaded;
                        }
                        log::debug!("Remote plan went stale in flight, using local cache");
                    }
                    Err(e) => {
                        log::warn!(
                            "Remote plan unavailable from {} store, using local cache: {}",
                            remote.store_name(),
                            e
                        );
                    }
                }
            }
        }

        let _commit = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());
        let generation = self.generation();
        match self.load_local() {
            Some(state) => LoadedPlan {
                state,
                source: PlanSource::Local,
                generation,
            },
            None => LoadedPlan {
                state: PlanState::default(),
                source: PlanSource::Default,
                generation,
            },
        }
    }

    /// Unix seconds of the last write to the local plan copy
    pub fn local_updated_at(&self) -> Option<i64> {
        match self.cache.updated_at(LOCAL_PLAN_KEY) {
            Ok(ts) => ts,
            Err(e) => {
                log::warn!("Failed to read local plan age: {}", e);
                None
            }
        }
    }

    fn mirror_if_current(&self, state: PlanState, seen: u64) -> Option<LoadedPlan> {
        let _commit = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.generation() != seen || self.has_pending_writes() {
            return None;
        }

        if let Err(e) = self.cache.write_json(LOCAL_PLAN_KEY, &state) {
            log::warn!("Failed to mirror remote plan into local cache: {}", e);
        }
        Some(LoadedPlan {
            state,
            source: PlanSource::Remote,
            generation: seen,
        })
    }

    /// Plan as last written to the local cache, if readable
    pub fn load_local(&self) -> Option<PlanState> {
        match self.cache.read_json::<PlanState>(LOCAL_PLAN_KEY) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("Ignoring unreadable local plan cache: {}", e);
                None
            }
        }
    }

    /// Write the plan locally, then push it to the remote store in the background.
    ///
    /// Only the local write can fail the call. Without a tokio runtime the
    /// remote push is skipped.
    pub fn save(&self, state: &PlanState) -> Result<RemoteWrite, PlanError> {
        let payload = serde_json::to_value(state)?;

        let commit = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.cache.write_json(LOCAL_PLAN_KEY, state)?;
        self.generation.fetch_add(1, Ordering::SeqCst);

        let Some(remote) = self.remote.clone() else {
            return Ok(RemoteWrite::skipped());
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("No async runtime available, plan saved locally only");
            return Ok(RemoteWrite::skipped());
        };

        // Counted before the lock is released so no load slips in between
        let in_flight = InFlight::start(&self.writes_in_flight);
        drop(commit);

        let key = self.artifact_key.clone();
        let handle = runtime.spawn(async move {
            let _in_flight = in_flight;
            let result = remote.put(&key, &payload).await;
            match &result {
                Ok(()) => log::debug!("Plan pushed to {} store", remote.store_name()),
                Err(e) => log::warn!(
                    "Failed to push plan to {} store, kept locally: {}",
                    remote.store_name(),
                    e
                ),
            }
            result
        });

        Ok(RemoteWrite {
            handle: Some(handle),
        })
    }

    /// Wipe the plan back to defaults. Nothing is touched unless confirmed.
    pub fn reset(
        &self,
        confirmation: ResetConfirmation,
    ) -> Result<(PlanState, RemoteWrite), PlanError> {
        if confirmation != ResetConfirmation::Confirmed {
            log::info!("Plan reset declined");
            return Err(PlanError::ResetNotConfirmed);
        }

        let state = PlanState::default();
        let write = self.save(&state)?;
        log::info!("Plan reset to defaults");
        Ok((state, write))
    }

    async fn fetch_remote(&self, remote: &dyn ArtifactStore) -> Result<PlanState, ApiError> {
        let value = remote.fetch(&self.artifact_key).await?;
        Ok(serde_json::from_value(value)?)
    }
}
