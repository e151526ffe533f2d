//! The engine's public API.
//!
//! [`MatchRegistryApi`] owns the match lifecycle: it validates operations against the local
//! mirror, submits the corresponding contract call through the injected [`crate::chain::ChainAdapter`],
//! awaits confirmation, and mirrors the confirmed state. [`StatsApi`] serves the read-only
//! leaderboard and statistics queries straight from the stats ledger, independently of the write
//! path.

mod errors;
mod match_flow_api;
mod stats_api;

pub use errors::MatchFlowError;
pub use match_flow_api::MatchRegistryApi;
pub use stats_api::StatsApi;
