use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::plan::PlanError;

/// Length of the plan in trading days
pub const TOTAL_DAYS: u32 = 30;

/// Trade slots recorded per day
pub const TRADES_PER_DAY: usize = 10;

/// Share of the bankroll staked per trade on day 1
pub const INITIAL_STAKE_PERCENTAGE: f64 = 0.06;

/// Smallest bankroll a plan can be built from
pub const MIN_INITIAL_CAPITAL: f64 = 10.0;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 1000.0;

/// Label stored for a trade slot saved without an instrument name
pub const BLANK_LABEL: &str = "N/A";

/// Starting bankroll of a plan. Always at or above `MIN_INITIAL_CAPITAL`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanConfig {
    initial_capital: f64,
}

impl PlanConfig {
    /// Clamp a raw bankroll to the floor. NaN and infinities clamp to the floor too.
    pub fn new(initial_capital: f64) -> Self {
        let initial_capital = if initial_capital.is_finite() && initial_capital >= MIN_INITIAL_CAPITAL {
            initial_capital
        } else {
            MIN_INITIAL_CAPITAL
        };
        Self { initial_capital }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Stake per trade on days 1 and 2
    pub fn initial_stake(&self) -> f64 {
        self.initial_capital * INITIAL_STAKE_PERCENTAGE
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_CAPITAL)
    }
}

/// One trade slot of a day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEntry {
    #[serde(default, alias = "coin", deserialize_with = "lenient_label")]
    pub label: String,
    #[serde(default, alias = "resultValue", deserialize_with = "lenient_outcome")]
    pub outcome: f64,
}

impl TradeEntry {
    pub fn new(label: impl Into<String>, outcome: f64) -> Self {
        Self {
            label: label.into(),
            outcome,
        }
    }

    /// Unrecorded slot as shown in a freshly generated plan
    pub fn placeholder() -> Self {
        Self::new(String::new(), 0.0)
    }
}

/// Recorded trades of a single day, as carried on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyResult {
    pub day: u32,
    pub trades: Vec<TradeEntry>,
}

/// Persisted plan: bankroll plus the days that have recorded trades.
///
/// Days are keyed by number so an unrecorded day is an absent key rather than a
/// zero-filled slot. Serializes to the `{ initialCapital, dailyResults: [...] }`
/// artifact shape with days in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PlanStateWire", into = "PlanStateWire")]
pub struct PlanState {
    pub initial_capital: f64,
    pub daily_results: BTreeMap<u32, Vec<TradeEntry>>,
}

impl PlanState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital: PlanConfig::new(initial_capital).initial_capital(),
            daily_results: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> PlanConfig {
        PlanConfig::new(self.initial_capital)
    }

    pub fn set_initial_capital(&mut self, initial_capital: f64) {
        self.initial_capital = PlanConfig::new(initial_capital).initial_capital();
    }

    pub fn trades_for(&self, day: u32) -> Option<&[TradeEntry]> {
        self.daily_results.get(&day).map(Vec::as_slice)
    }

    pub fn is_valid_day(day: u32) -> bool {
        (1..=TOTAL_DAYS).contains(&day)
    }

    /// Replace the trades recorded for `day` wholesale, inserting the day if it
    /// had none. Every other day is left as it was.
    pub fn upsert_day(&mut self, day: u32, trades: Vec<TradeEntry>) -> Result<(), PlanError> {
        if !Self::is_valid_day(day) {
            return Err(PlanError::DayOutOfRange(day));
        }
        self.daily_results.insert(day, trades);
        Ok(())
    }
}

impl Default for PlanState {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_CAPITAL)
    }
}

/// Derived schedule row. Recomputed on every read, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedDayPlan {
    pub day: u32,
    pub stake_size: f64,
    pub daily_goal: f64,
    pub success_count: usize,
    pub trades: Vec<TradeEntry>,
    pub daily_result: f64,
    pub cumulative_total: f64,
}

/// Aggregate figures over a generated plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub final_total: f64,
    pub recorded_days: usize,
    pub total_successes: usize,
    pub days_goal_met: usize,
    pub best_day: Option<u32>,
    pub worst_day: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanStateWire {
    #[serde(alias = "bancaInicial", deserialize_with = "lenient_capital")]
    initial_capital: f64,
    #[serde(default, deserialize_with = "lenient_results")]
    daily_results: Vec<DailyResult>,
}

impl From<PlanStateWire> for PlanState {
    fn from(wire: PlanStateWire) -> Self {
        let mut state = PlanState::new(wire.initial_capital);

        // Later duplicates of a day win, matching replace-on-save semantics
        for result in wire.daily_results {
            if !PlanState::is_valid_day(result.day) {
                log::debug!("Dropping stored result for out-of-range day {}", result.day);
                continue;
            }
            let mut trades = result.trades;
            trades.truncate(TRADES_PER_DAY);
            state.daily_results.insert(result.day, trades);
        }

        state
    }
}

impl From<PlanState> for PlanStateWire {
    fn from(state: PlanState) -> Self {
        Self {
            initial_capital: state.initial_capital,
            daily_results: state
                .daily_results
                .into_iter()
                .map(|(day, trades)| DailyResult { day, trades })
                .collect(),
        }
    }
}

/// Numeric field that older clients may have written as a string or null
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Number(f64),
    Text(String),
    Null(()),
}

fn lenient_outcome<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match LooseNumber::deserialize(deserializer)? {
        LooseNumber::Number(n) if n.is_finite() => n,
        LooseNumber::Number(_) | LooseNumber::Null(()) => 0.0,
        LooseNumber::Text(text) => crate::plan::parse_outcome(&text),
    })
}

fn lenient_capital<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match LooseNumber::deserialize(deserializer)? {
        LooseNumber::Number(n) => PlanConfig::new(n).initial_capital(),
        LooseNumber::Null(()) => MIN_INITIAL_CAPITAL,
        LooseNumber::Text(text) => crate::plan::parse_capital(&text),
    })
}

fn lenient_label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_results<'de, D>(deserializer: D) -> Result<Vec<DailyResult>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<DailyResult>>::deserialize(deserializer)?.unwrap_or_default())
}
