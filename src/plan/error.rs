use thiserror::Error;

use crate::db::CacheError;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Day {0} is outside the plan (1-30)")]
    DayOutOfRange(u32),

    #[error("Reset requires explicit confirmation")]
    ResetNotConfirmed,

    #[error("Local cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Failed to encode plan: {0}")]
    Encode(#[from] serde_json::Error),
}
