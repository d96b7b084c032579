use serde::Serialize;

use crate::app::AppState;
use crate::models::{DerivedDayPlan, PlanState, PlanSummary};
use crate::plan::{
    generate_plan, normalize_day, parse_capital, summarize, PlanSource, RawTradeInput,
    ResetConfirmation,
};

/// Everything the plan table renders
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub initial_capital: f64,
    pub days: Vec<DerivedDayPlan>,
    pub summary: PlanSummary,
    /// Tier that answered, when the view follows a load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PlanSource>,
    /// Unix seconds of the cached copy, when the cache answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<i64>,
}

impl PlanView {
    fn build(state: &PlanState, source: Option<PlanSource>) -> Self {
        let days = generate_plan(&state.config(), &state.daily_results);
        let summary = summarize(&days);
        Self {
            initial_capital: state.initial_capital,
            days,
            summary,
            source,
            cached_at: None,
        }
    }
}

/// Load from the store and make the result the working copy
pub async fn load_plan(app: &AppState) -> Result<PlanView, String> {
    let loaded = app.store.load().await;

    // An edit saved while loading wins over what was read
    let mut published = false;
    app.plan.send_if_modified(|current| {
        if app.store.generation() != loaded.generation {
            return false;
        }
        published = true;
        if *current == loaded.state {
            return false;
        }
        *current = loaded.state.clone();
        true
    });
    if !published {
        return get_plan(app).await;
    }

    let mut view = PlanView::build(&loaded.state, Some(loaded.source));
    if loaded.source == PlanSource::Local {
        view.cached_at = app.store.local_updated_at();
    }
    Ok(view)
}

pub async fn get_plan(app: &AppState) -> Result<PlanView, String> {
    Ok(PlanView::build(&app.current_plan(), None))
}

pub async fn get_day(app: &AppState, day: u32) -> Result<DerivedDayPlan, String> {
    if !PlanState::is_valid_day(day) {
        return Err(format!("Day {} is outside the plan (1-30)", day));
    }

    let view = PlanView::build(&app.current_plan(), None);
    view.days
        .into_iter()
        .find(|d| d.day == day)
        .ok_or_else(|| format!("Day {} not found", day))
}

/// Apply a raw bankroll entry. Blank or unparseable input falls to the minimum.
pub async fn set_initial_capital(app: &AppState, raw: String) -> Result<PlanView, String> {
    let mut state = app.current_plan();
    state.set_initial_capital(parse_capital(&raw));

    commit(app, state)
}

/// Replace one day's trades with the normalized form of the edit
pub async fn save_day_trades(
    app: &AppState,
    day: u32,
    trades: Vec<RawTradeInput>,
) -> Result<PlanView, String> {
    let mut state = app.current_plan();
    state
        .upsert_day(day, normalize_day(&trades))
        .map_err(|e| e.to_string())?;

    log::debug!("Saving {} trade rows for day {}", trades.len(), day);
    commit(app, state)
}

pub async fn reset_plan(app: &AppState, confirmed: bool) -> Result<PlanView, String> {
    let (state, _write) = app
        .store
        .reset(ResetConfirmation::from(confirmed))
        .map_err(|e| e.to_string())?;

    let view = PlanView::build(&state, None);
    app.plan.send_replace(state);
    Ok(view)
}

/// Persist `state`, then publish it as the working copy
fn commit(app: &AppState, state: PlanState) -> Result<PlanView, String> {
    app.store.save(&state).map_err(|e| {
        log::error!("Failed to save plan: {}", e);
        e.to_string()
    })?;

    let view = PlanView::build(&state, None);
    app.plan.send_replace(state);
    Ok(view)
}
