use std::collections::VecDeque;

use serde::Serialize;

/// Maximum amount of `RoundSummary`s kept around.
const HISTORY_LIMIT: usize = 1024;

/// Which half of the merge trigger closed a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeTrigger {
    Count,
    Timeout,
}

/// What happened at a single merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSummary {
    /// The round the merge produced.
    pub round: u64,
    pub aggregated_from: usize,
    pub total_weight: u64,
    pub avg_staleness: f64,
    pub trigger: MergeTrigger,
}

/// Cumulative counters of the coordinator's decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub accepted: u64,
    pub rejected: u64,
    pub merges: u64,
    pub timeouts: u64,
}

#[derive(Debug, Default)]
pub(crate) struct History {
    stats: CoordinatorStats,
    rounds: VecDeque<RoundSummary>,
}

impl History {
    pub fn accepted(&mut self) {
        self.stats.accepted += 1;
    }

    pub fn rejected(&mut self) {
        self.stats.rejected += 1;
    }

    pub fn merged(&mut self, summary: RoundSummary) {
        self.stats.merges += 1;

        if summary.trigger == MergeTrigger::Timeout {
            self.stats.timeouts += 1;
        }

        if self.rounds.len() == HISTORY_LIMIT {
            self.rounds.pop_front();
        }

        self.rounds.push_back(summary);
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats.clone()
    }

    pub fn rounds(&self) -> Vec<RoundSummary> {
        self.rounds.iter().cloned().collect()
    }
}
