use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::api::{ArtifactStore, HttpArtifactStore};
use crate::config::ClientConfig;
use crate::db::{Database, LocalCache};
use crate::models::{PlanState, UiState};
use crate::plan::PlanStore;
use crate::sync::PlanRefresher;

/// Local cache slot for the dashboard's presentation state
pub const UI_STATE_KEY: &str = "ui_state_v1";

/// Everything the command layer works against.
///
/// `plan` is the in-memory working copy the views edit; the store owns the
/// persisted version.
pub struct AppState {
    pub config: ClientConfig,
    pub cache: LocalCache,
    pub store: PlanStore,
    pub plan: Arc<watch::Sender<PlanState>>,
    pub ui: Mutex<UiState>,
    refresher: Mutex<Option<PlanRefresher>>,
}

impl AppState {
    pub fn new(config: ClientConfig) -> Result<Self, String> {
        config.validate().map_err(|e| e.to_string())?;

        let database = match &config.db_path {
            Some(path) => {
                log::info!("Cache database path: {}", path);
                Database::new(path)
            }
            None => {
                log::info!("No cache path configured, using an in-memory cache");
                Database::in_memory()
            }
        }
        .map_err(|e| {
            log::error!("❌ Cache database initialization failed: {}", e);
            format!("Cache database initialization failed: {}", e)
        })?;

        let cache = LocalCache::new(Arc::new(database));

        let remote: Option<Arc<dyn ArtifactStore>> = match &config.api_base_url {
            Some(url) => {
                let client =
                    HttpArtifactStore::new(url, config.request_timeout(), config.rate_limit())
                        .map_err(|e| e.to_string())?;
                Some(Arc::new(client))
            }
            None => {
                log::warn!("No artifact API configured, plan will be stored locally only");
                None
            }
        };

        Ok(Self::with_parts(config, cache, remote))
    }

    /// Assemble state from already-built tiers
    pub fn with_parts(
        config: ClientConfig,
        cache: LocalCache,
        remote: Option<Arc<dyn ArtifactStore>>,
    ) -> Self {
        let store = PlanStore::with_artifact_key(cache.clone(), remote, &config.artifact_key);

        // Start from whatever the last session left locally until a load runs
        let plan = store.load_local().unwrap_or_default();

        let ui = match cache.read_json::<UiState>(UI_STATE_KEY) {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                log::warn!("Ignoring unreadable UI state: {}", e);
                UiState::default()
            }
        };

        Self {
            config,
            cache,
            store,
            plan: Arc::new(watch::channel(plan).0),
            ui: Mutex::new(ui),
            refresher: Mutex::new(None),
        }
    }

    /// Snapshot of the working copy
    pub fn current_plan(&self) -> PlanState {
        self.plan.borrow().clone()
    }

    /// Start the periodic plan refresh if configured and not already running.
    /// Must be called from within a tokio runtime.
    pub fn start_background_refresh(&self) -> Result<bool, String> {
        let Some(period) = self.config.refresh_interval() else {
            return Ok(false);
        };

        let mut refresher = self.refresher.lock().map_err(|e| e.to_string())?;
        if refresher.as_ref().is_some_and(PlanRefresher::is_running) {
            return Ok(false);
        }

        *refresher = Some(PlanRefresher::start(
            self.store.clone(),
            period,
            Arc::clone(&self.plan),
        ));
        Ok(true)
    }

    /// Stop background work. Called when the dashboard shell closes.
    pub fn shutdown(&self) {
        match self.refresher.lock() {
            Ok(mut refresher) => {
                if let Some(mut r) = refresher.take() {
                    r.stop();
                }
            }
            Err(e) => log::error!("Failed to stop plan refresh: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Theme, UiAction};

    #[test]
    fn test_rejects_invalid_config() {
        let config = ClientConfig {
            api_base_url: Some("not-a-url".into()),
            ..ClientConfig::default()
        };
        assert!(AppState::new(config).is_err());
    }

    #[test]
    fn test_local_only_state() {
        let app = AppState::new(ClientConfig::default()).unwrap();
        assert_eq!(app.current_plan(), PlanState::default());
    }

    #[test]
    fn test_restores_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            db_path: Some(dir.path().join("planner.db").to_string_lossy().into_owned()),
            ..ClientConfig::default()
        };

        {
            let app = AppState::new(config.clone()).unwrap();
            app.store.save(&PlanState::new(4321.0)).unwrap();
            let ui = UiState::default().reduce(UiAction::SetTheme(Theme::Light));
            app.cache.write_json(UI_STATE_KEY, &ui).unwrap();
        }

        let app = AppState::new(config).unwrap();
        assert_eq!(app.current_plan().initial_capital, 4321.0);
        assert_eq!(app.ui.lock().unwrap().theme, Theme::Light);
    }

    #[tokio::test]
    async fn test_background_refresh_lifecycle() {
        let app = AppState::new(ClientConfig::default()).unwrap();

        assert!(app.start_background_refresh().unwrap());
        assert!(!app.start_background_refresh().unwrap());

        app.shutdown();
        assert!(app.start_background_refresh().unwrap());
        app.shutdown();
    }

    #[tokio::test]
    async fn test_refresh_disabled_by_config() {
        let config = ClientConfig {
            refresh_interval_secs: 0,
            ..ClientConfig::default()
        };
        let app = AppState::new(config).unwrap();

        assert!(!app.start_background_refresh().unwrap());
    }
}
