use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::PlanState;
use crate::plan::{PlanSource, PlanStore};

/// Background job that runs on a fixed interval until stopped or dropped.
///
/// The first tick fires immediately.
pub struct PeriodicTask {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Start `tick` every `period` on the current tokio runtime
    pub fn spawn<F, Fut>(name: &str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        log::info!("Starting periodic task '{}' every {:?}", name, period);

        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                log::debug!("Tick for '{}'", task_name);
                tick().await;
            }
        });

        Self {
            name: name.to_string(),
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Abort the task. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::info!("Stopped periodic task '{}'", self.name);
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keeps a shared plan copy in step with the store.
///
/// Each tick reloads the plan and publishes it when it changed. Ticks are
/// skipped while a save is still being pushed, and an answer is dropped if a
/// save happened after it was read, so a refresh cannot bring back the state
/// that save replaced.
pub struct PlanRefresher {
    task: PeriodicTask,
}

impl PlanRefresher {
    pub fn start(
        store: PlanStore,
        period: Duration,
        plan: Arc<watch::Sender<PlanState>>,
    ) -> Self {
        let task = PeriodicTask::spawn("plan-refresh", period, move || {
            let store = store.clone();
            let plan = Arc::clone(&plan);
            async move {
                if store.has_pending_writes() {
                    log::debug!("Skipping plan refresh, save in flight");
                    return;
                }

                let loaded = store.load().await;
                if loaded.source == PlanSource::Default {
                    return;
                }

                // Checked under the channel lock: editors save first, then publish
                let changed = plan.send_if_modified(|current| {
                    if store.generation() != loaded.generation {
                        log::debug!("Dropping plan refresh, saved since it was read");
                        false
                    } else if *current == loaded.state {
                        false
                    } else {
                        *current = loaded.state;
                        true
                    }
                });
                if changed {
                    log::info!("Plan refreshed from {:?} tier", loaded.source);
                }
            }
        });

        Self { task }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn stop(&mut self) {
        self.task.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ArtifactStore, MemoryArtifactStore};
    use crate::db::{Database, LocalCache};
    use crate::plan::store::DEFAULT_ARTIFACT_KEY;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_periodic_task_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let mut task = PeriodicTask::spawn("counter", Duration::from_secs(1), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(task.is_running());
        let seen = count.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected at least 3 ticks, saw {}", seen);

        task.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!task.is_running());
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_task_cancels_it() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        {
            let _task = PeriodicTask::spawn("scoped", Duration::from_secs(1), move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
            tokio::time::sleep(Duration::from_millis(1500)).await;
        }

        let seen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_refresher_publishes_remote_changes() {
        let cache = LocalCache::new(Arc::new(Database::in_memory().unwrap()));
        let remote = Arc::new(MemoryArtifactStore::new());
        let store = PlanStore::new(cache, Some(remote.clone() as Arc<dyn ArtifactStore>));

        let plan = Arc::new(watch::channel(PlanState::default()).0);
        let mut updates = plan.subscribe();

        remote
            .seed(
                DEFAULT_ARTIFACT_KEY,
                json!({ "initialCapital": 3000, "dailyResults": [] }),
            )
            .await;

        let mut refresher = PlanRefresher::start(store, Duration::from_millis(20), Arc::clone(&plan));

        tokio::time::timeout(Duration::from_secs(2), updates.changed())
            .await
            .expect("refresh did not publish in time")
            .unwrap();
        assert_eq!(updates.borrow().initial_capital, 3000.0);

        refresher.stop();
        assert!(!refresher.is_running());
    }
}
