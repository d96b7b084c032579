pub mod cache;
pub mod connection;
pub mod migration_runner;

pub use cache::{CacheError, LocalCache};
pub use connection::Database;
