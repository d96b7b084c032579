//! Derives the 30-day compounding schedule from a bankroll and the recorded days.
//!
//! Stake starts at 6% of the bankroll and doubles every second day, so days 1-2
//! share a stake, days 3-4 use twice that, and so on. The daily goal is the stake
//! times the number of trade slots. Everything here is pure: the schedule is
//! rebuilt in full on every read.

use std::collections::BTreeMap;

use crate::models::{DerivedDayPlan, PlanConfig, PlanSummary, TOTAL_DAYS, TRADES_PER_DAY, TradeEntry};

/// Days between stake doublings
const DOUBLING_PERIOD_DAYS: u32 = 2;

/// Stake per trade for `day`, given the day-1 stake. Zero outside the plan.
pub fn stake_for_day(day: u32, initial_stake: f64) -> f64 {
    if !(1..=TOTAL_DAYS).contains(&day) {
        return 0.0;
    }
    let doublings = (day - 1) / DOUBLING_PERIOD_DAYS;
    initial_stake * 2f64.powi(doublings as i32)
}

/// Build the full schedule, day 1 through 30, in order.
///
/// Days missing from `results` get blank slots and contribute nothing. Stored
/// days shorter than `TRADES_PER_DAY` are padded; extra slots are ignored.
pub fn generate_plan(
    config: &PlanConfig,
    results: &BTreeMap<u32, Vec<TradeEntry>>,
) -> Vec<DerivedDayPlan> {
    let initial_stake = config.initial_stake();
    let mut cumulative_total = 0.0;

    (1..=TOTAL_DAYS)
        .map(|day| {
            let stake_size = stake_for_day(day, initial_stake);
            let daily_goal = stake_size * TRADES_PER_DAY as f64;
            let trades = fill_slots(results.get(&day).map(Vec::as_slice).unwrap_or_default());

            let success_count = trades.iter().filter(|t| t.outcome > 0.0).count();
            let daily_result: f64 = trades.iter().map(|t| t.outcome).sum();
            cumulative_total += daily_result;

            DerivedDayPlan {
                day,
                stake_size,
                daily_goal,
                success_count,
                trades,
                daily_result,
                cumulative_total,
            }
        })
        .collect()
}

/// Roll a generated schedule up into headline numbers
pub fn summarize(plan: &[DerivedDayPlan]) -> PlanSummary {
    let recorded: Vec<&DerivedDayPlan> = plan.iter().filter(|d| is_recorded(d)).collect();

    let best_day = recorded
        .iter()
        .max_by(|a, b| a.daily_result.total_cmp(&b.daily_result))
        .map(|d| d.day);
    let worst_day = recorded
        .iter()
        .min_by(|a, b| a.daily_result.total_cmp(&b.daily_result))
        .map(|d| d.day);

    PlanSummary {
        final_total: plan.last().map_or(0.0, |d| d.cumulative_total),
        recorded_days: recorded.len(),
        total_successes: plan.iter().map(|d| d.success_count).sum(),
        days_goal_met: recorded
            .iter()
            .filter(|d| d.daily_result >= d.daily_goal)
            .count(),
        best_day,
        worst_day,
    }
}

fn fill_slots(stored: &[TradeEntry]) -> Vec<TradeEntry> {
    (0..TRADES_PER_DAY)
        .map(|i| match stored.get(i) {
            Some(t) => TradeEntry::new(
                t.label.clone(),
                if t.outcome.is_finite() { t.outcome } else { 0.0 },
            ),
            None => TradeEntry::placeholder(),
        })
        .collect()
}

fn is_recorded(day: &DerivedDayPlan) -> bool {
    day.trades
        .iter()
        .any(|t| !t.label.is_empty() || t.outcome != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlanState;

    fn empty() -> BTreeMap<u32, Vec<TradeEntry>> {
        BTreeMap::new()
    }

    fn day_with(outcomes: &[f64]) -> Vec<TradeEntry> {
        outcomes.iter().map(|&o| TradeEntry::new("N/A", o)).collect()
    }

    #[test]
    fn test_always_thirty_days_in_order() {
        let plan = generate_plan(&PlanConfig::new(1000.0), &empty());
        assert_eq!(plan.len(), 30);
        for (i, day) in plan.iter().enumerate() {
            assert_eq!(day.day, i as u32 + 1);
            assert_eq!(day.trades.len(), TRADES_PER_DAY);
        }
    }

    #[test]
    fn test_stake_doubles_every_two_days() {
        for capital in [10.0, 137.5, 1000.0, 50_000.0] {
            let plan = generate_plan(&PlanConfig::new(capital), &empty());
            for day in (1..=29).step_by(2) {
                let idx = day - 1;
                assert_eq!(plan[idx].stake_size, plan[idx + 1].stake_size);
            }
            for idx in 0..28 {
                assert_eq!(plan[idx + 2].stake_size, 2.0 * plan[idx].stake_size);
            }
        }
    }

    #[test]
    fn test_goal_is_ten_stakes() {
        let plan = generate_plan(&PlanConfig::new(777.0), &empty());
        for day in &plan {
            assert_eq!(day.daily_goal, 10.0 * day.stake_size);
        }
    }

    #[test]
    fn test_concrete_stakes_for_1000() {
        let plan = generate_plan(&PlanConfig::new(1000.0), &empty());
        assert_eq!(plan[0].stake_size, 60.0);
        assert_eq!(plan[0].daily_goal, 600.0);
        assert_eq!(plan[2].stake_size, 120.0);
        assert_eq!(plan[2].daily_goal, 1200.0);
        assert_eq!(plan[4].stake_size, 240.0);
    }

    #[test]
    fn test_stake_outside_plan_is_zero() {
        assert_eq!(stake_for_day(0, 60.0), 0.0);
        assert_eq!(stake_for_day(31, 60.0), 0.0);
        assert_eq!(stake_for_day(30, 1.0), 16384.0);
    }

    #[test]
    fn test_single_winning_trade() {
        let mut results = empty();
        let mut outcomes = [0.0; 10];
        outcomes[9] = 50.0;
        results.insert(1, day_with(&outcomes));
        results.insert(2, day_with(&[0.0; 10]));

        let plan = generate_plan(&PlanConfig::new(1000.0), &results);

        assert_eq!(plan[0].daily_result, 50.0);
        assert_eq!(plan[0].success_count, 1);
        assert_eq!(plan[0].cumulative_total, 50.0);
        assert_eq!(plan[1].cumulative_total, 50.0);
    }

    #[test]
    fn test_cumulative_equals_sum_of_days() {
        let mut results = empty();
        results.insert(1, day_with(&[10.0, -4.0]));
        results.insert(6, day_with(&[25.0, 25.0, -1.5]));
        results.insert(30, day_with(&[-8.0]));

        let plan = generate_plan(&PlanConfig::new(1000.0), &results);
        let total: f64 = plan.iter().map(|d| d.daily_result).sum();

        assert_eq!(plan[29].cumulative_total, total);
        assert_eq!(plan[29].cumulative_total, 46.5);
    }

    #[test]
    fn test_missing_and_short_days_are_padded() {
        let mut results = empty();
        results.insert(4, vec![TradeEntry::new("BTC", 5.0)]);

        let plan = generate_plan(&PlanConfig::new(1000.0), &results);

        assert_eq!(plan[3].trades[0], TradeEntry::new("BTC", 5.0));
        assert!(plan[3].trades[1..].iter().all(|t| *t == TradeEntry::placeholder()));
        assert!(plan[0].trades.iter().all(|t| *t == TradeEntry::placeholder()));
        assert_eq!(plan[0].daily_result, 0.0);
    }

    #[test]
    fn test_non_finite_outcomes_count_as_zero() {
        let mut results = empty();
        results.insert(1, day_with(&[f64::NAN, f64::INFINITY, 3.0]));

        let plan = generate_plan(&PlanConfig::new(1000.0), &results);

        assert_eq!(plan[0].daily_result, 3.0);
        assert_eq!(plan[0].success_count, 1);
    }

    #[test]
    fn test_generation_is_idempotent() {
        let mut results = empty();
        results.insert(3, day_with(&[1.25, -0.5, 9.0]));
        let config = PlanConfig::new(420.0);

        let first = generate_plan(&config, &results);
        let second = generate_plan(&config, &results);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_negative_capital_behaves_like_floor() {
        let state = PlanState::new(-5.0);
        let clamped = generate_plan(&state.config(), &empty());
        let floor = generate_plan(&PlanConfig::new(10.0), &empty());
        assert_eq!(clamped, floor);
    }

    #[test]
    fn test_summary() {
        let mut results = empty();
        results.insert(1, day_with(&[700.0]));
        results.insert(2, day_with(&[-30.0, 10.0]));
        results.insert(3, vec![TradeEntry::new("ETH", 0.0)]);

        let plan = generate_plan(&PlanConfig::new(1000.0), &results);
        let summary = summarize(&plan);

        assert_eq!(summary.final_total, 680.0);
        assert_eq!(summary.recorded_days, 3);
        assert_eq!(summary.total_successes, 2);
        assert_eq!(summary.days_goal_met, 1);
        assert_eq!(summary.best_day, Some(1));
        assert_eq!(summary.worst_day, Some(2));
    }

    #[test]
    fn test_summary_of_blank_plan() {
        let summary = summarize(&generate_plan(&PlanConfig::default(), &empty()));
        assert_eq!(summary.final_total, 0.0);
        assert_eq!(summary.recorded_days, 0);
        assert_eq!(summary.best_day, None);
    }
}
