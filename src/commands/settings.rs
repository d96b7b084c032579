use crate::app::{AppState, UI_STATE_KEY};
use crate::models::{UiAction, UiState};

pub async fn get_ui_state(app: &AppState) -> Result<UiState, String> {
    let ui = app.ui.lock().map_err(|e| e.to_string())?;
    Ok(ui.clone())
}

/// Apply a UI action and persist the result. Persisting is best effort: the
/// new state is returned even if the cache write fails.
pub async fn dispatch_ui_action(app: &AppState, action: UiAction) -> Result<UiState, String> {
    let next = {
        let mut ui = app.ui.lock().map_err(|e| e.to_string())?;
        let next = ui.clone().reduce(action);
        *ui = next.clone();
        next
    };

    if let Err(e) = app.cache.write_json(UI_STATE_KEY, &next) {
        log::warn!("Failed to persist UI state: {}", e);
    }

    Ok(next)
}
