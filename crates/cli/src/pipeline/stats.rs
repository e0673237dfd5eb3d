//! Bridge run statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::SinkResult;
use observability::{RunningStats, StatsSummary};

/// Per-sink outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkTally {
    pub succeeded: u64,
    pub failed: u64,
}

/// Statistics from a bridge run
#[derive(Debug, Clone, Default)]
pub struct BridgeStats {
    /// Messages received from the feed and dispatched
    pub messages: u64,

    /// Outcomes per sink, keyed by sink name
    pub sinks: BTreeMap<String, SinkTally>,

    /// Dispatch latency in milliseconds (slowest sink per message)
    pub dispatch_latency_ms: RunningStats,

    /// Total duration of the run
    pub duration: Duration,
}

impl BridgeStats {
    /// Account for one dispatched message
    pub fn record(&mut self, results: &[SinkResult], latency: Duration) {
        self.messages += 1;
        self.dispatch_latency_ms.push(latency.as_secs_f64() * 1000.0);

        for result in results {
            let tally = self.sinks.entry(result.sink_name.clone()).or_default();
            if result.is_ok() {
                tally.succeeded += 1;
            } else {
                tally.failed += 1;
            }
        }
    }

    /// Failed sink writes across all sinks
    pub fn total_failures(&self) -> u64 {
        self.sinks.values().map(|t| t.failed).sum()
    }

    /// Messages per second over the run
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Bridge Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Messages: {}", self.messages);
        println!("   ├─ Throughput: {:.2} msg/s", self.throughput());
        println!(
            "   └─ Dispatch latency (ms): {}",
            StatsSummary::from(&self.dispatch_latency_ms)
        );

        if !self.sinks.is_empty() {
            println!("\nSinks");
            let last = self.sinks.len() - 1;
            for (idx, (name, tally)) in self.sinks.iter().enumerate() {
                let branch = if idx == last { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} ok, {} failed",
                    branch, name, tally.succeeded, tally.failed
                );
            }
        }

        println!();
    }
}
