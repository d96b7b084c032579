pub mod scheduler;

pub use scheduler::{PeriodicTask, PlanRefresher};
