pub mod artifacts;
pub mod client;
pub mod error;
pub mod memory;
pub mod rate_limiter;

pub use artifacts::HttpArtifactStore;
pub use client::{ArtifactStore, RateLimitConfig};
pub use error::ApiError;
pub use memory::MemoryArtifactStore;
pub use rate_limiter::RateLimiter;
