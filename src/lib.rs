pub mod api;
pub mod app;
pub mod commands;
pub mod config;
pub mod db;
pub mod models;
pub mod plan;
pub mod sync;

pub use app::AppState;
pub use config::ClientConfig;

use std::path::Path;

/// Build the application state from the environment and start background refresh.
///
/// Must be called from within a tokio runtime.
pub fn init() -> Result<AppState, String> {
    init_with(ClientConfig::from_env())
}

pub fn init_with(config: ClientConfig) -> Result<AppState, String> {
    if let Some(parent) = config.db_path.as_deref().and_then(|p| Path::new(p).parent()) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create cache directory: {}", e))?;
        }
    }

    let app = AppState::new(config).inspect_err(|_| {
        log::error!("This might be due to a failed migration or cache corruption.");
        log::error!("Recovery steps:");
        log::error!("  1. Close the dashboard");
        log::error!("  2. Replace the cache file with the most recent one in the backups folder next to it");
        log::error!("  3. Restart the dashboard");
        log::error!("The plan itself is also kept remotely when an artifact API is configured.");
    })?;

    if app.start_background_refresh()? {
        log::info!("Plan refresh started");
    }
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_cache_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("planner.db");
        let config = ClientConfig {
            db_path: Some(db_path.to_string_lossy().into_owned()),
            ..ClientConfig::default()
        };

        let app = init_with(config).unwrap();

        assert!(db_path.exists());
        app.shutdown();
    }
}
