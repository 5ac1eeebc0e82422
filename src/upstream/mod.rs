// =============================================================================
// upstream — typed access to the three leaderboard data sources
// =============================================================================

mod client;
mod error;

pub use client::{RetryPolicy, UpstreamClient};
pub use error::UpstreamError;
