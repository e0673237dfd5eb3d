//! Bridge orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::Bridge;
pub use stats::BridgeStats;
