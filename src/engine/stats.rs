use std::collections::BTreeMap;

use serde::Serialize;

/// How many error messages a report keeps verbatim
pub const MAX_REPORTED_ERRORS: usize = 5;

/// One timed benchmark operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub database: String,
    pub operation: String,
    /// One-based position within the database's pass
    pub operation_number: usize,
    pub response_time: u64,
    pub success: bool,
    pub error: Option<String>,
}

/// Nearest-rank percentile: `sorted[ceil(p/100 * n) - 1]`, 0 when empty
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Descriptive statistics over the successful operations of one pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub total_operations: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub avg_response_time: u64,
    pub min_response_time: u64,
    pub max_response_time: u64,
    pub median_response_time: u64,
    pub p95_response_time: u64,
    pub p99_response_time: u64,
    pub total_response_time: u64,
    pub ops_per_second: u64,
}

impl DatabaseStats {
    pub fn from_results(results: &[OperationResult]) -> Self {
        let mut times: Vec<u64> = results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.response_time)
            .collect();
        times.sort_unstable();

        let total_operations = results.len();
        let successful = times.len();
        let total_response_time: u64 = times.iter().sum();
        let max_response_time = times.last().copied().unwrap_or(0);

        let success_rate = if total_operations == 0 {
            0.0
        } else {
            successful as f64 / total_operations as f64 * 100.0
        };
        let avg_response_time = if successful == 0 {
            0
        } else {
            (total_response_time as f64 / successful as f64).round() as u64
        };
        // Successes divided by the slowest response, in seconds
        let ops_per_second = if max_response_time == 0 {
            0
        } else {
            (successful as f64 / (max_response_time as f64 / 1000.0)).round() as u64
        };

        Self {
            total_operations,
            successful,
            failed: total_operations - successful,
            success_rate,
            avg_response_time,
            min_response_time: times.first().copied().unwrap_or(0),
            max_response_time,
            median_response_time: percentile(&times, 50.0),
            p95_response_time: percentile(&times, 95.0),
            p99_response_time: percentile(&times, 99.0),
            total_response_time,
            ops_per_second,
        }
    }
}

/// Successful operations bucketed by response time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LatencyBreakdown {
    #[serde(rename = "under_50ms")]
    pub under_50ms: usize,
    #[serde(rename = "50_100ms")]
    pub from_50_to_100ms: usize,
    #[serde(rename = "100_500ms")]
    pub from_100_to_500ms: usize,
    #[serde(rename = "500_1000ms")]
    pub from_500_to_1000ms: usize,
    #[serde(rename = "over_1000ms")]
    pub over_1000ms: usize,
}

impl LatencyBreakdown {
    pub fn from_results(results: &[OperationResult]) -> Self {
        let mut breakdown = Self::default();
        for time in results.iter().filter(|r| r.success).map(|r| r.response_time) {
            match time {
                0..50 => breakdown.under_50ms += 1,
                50..100 => breakdown.from_50_to_100ms += 1,
                100..500 => breakdown.from_100_to_500ms += 1,
                500..1000 => breakdown.from_500_to_1000ms += 1,
                _ => breakdown.over_1000ms += 1,
            }
        }
        breakdown
    }
}

/// Error messages of failed operations, in order
pub fn error_messages(results: &[OperationResult]) -> Vec<&str> {
    results
        .iter()
        .filter(|r| !r.success)
        .filter_map(|r| r.error.as_deref())
        .collect()
}

/// Failure histogram keyed by the text before the first `:`
pub fn error_types(results: &[OperationResult]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for message in error_messages(results) {
        let kind = message.split(':').next().unwrap_or_default().trim();
        let kind = if kind.is_empty() { "Unknown Error" } else { kind };
        *counts.entry(kind.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Head-to-head summary of two passes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// Display name of the database with the lower average response time
    pub winner: String,
    /// How much lower the winner's average is, in milliseconds
    pub advantage_ms: u64,
    /// The same difference as a percentage of the slower average
    pub advantage_percent: f64,
    /// First success rate minus second success rate
    pub success_rate_diff: f64,
    /// Second average over first average, 1 when the first is zero
    pub performance_ratio: f64,
}

impl Comparison {
    /// Compare `first` against `second`; ties go to `second`
    pub fn between(
        first_name: &str,
        first: &DatabaseStats,
        second_name: &str,
        second: &DatabaseStats,
    ) -> Self {
        let (winner, fast, slow) = if first.avg_response_time < second.avg_response_time {
            (first_name, first.avg_response_time, second.avg_response_time)
        } else {
            (second_name, second.avg_response_time, first.avg_response_time)
        };

        let advantage_ms = slow - fast;
        let advantage_percent = if slow == 0 {
            0.0
        } else {
            round2(advantage_ms as f64 / slow as f64 * 100.0)
        };
        let performance_ratio = if first.avg_response_time == 0 {
            1.0
        } else {
            second.avg_response_time as f64 / first.avg_response_time as f64
        };

        Self {
            winner: winner.to_string(),
            advantage_ms,
            advantage_percent,
            success_rate_diff: first.success_rate - second.success_rate,
            performance_ratio,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
