//! Compounding plan engine: schedule generation, day-edit normalization and
//! the two-tier plan store.

pub mod error;
pub mod generator;
pub mod normalize;
pub mod store;

pub use error::PlanError;
pub use generator::{generate_plan, stake_for_day, summarize};
pub use normalize::{normalize_day, normalize_label, parse_capital, parse_outcome, RawTradeInput};
pub use store::{LoadedPlan, PlanSource, PlanStore, RemoteWrite, ResetConfirmation};
