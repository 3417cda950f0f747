use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::stats::{
    Comparison, DatabaseStats, LatencyBreakdown, MAX_REPORTED_ERRORS, OperationResult,
    error_messages, error_types,
};
use crate::domain::QueryRotation;
use crate::storage::QueryTarget;
use crate::streaming::Notifications;

pub const TEST_STARTED_EVENT: &str = "test:started";
pub const TEST_PROGRESS_EVENT: &str = "test:progress";
pub const OPERATION_COMPLETED_EVENT: &str = "operation:completed";
pub const TEST_COMPLETED_EVENT: &str = "test:completed";

/// Operations between two `test:progress` events
pub const PROGRESS_EVERY: usize = 5;

/// Successful operations per score point
pub const OPERATIONS_PER_POINT: usize = 10;

/// Everything measured for one database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseReport {
    pub database: String,
    #[serde(flatten)]
    pub stats: DatabaseStats,
    /// The first few error messages, verbatim
    pub errors: Vec<String>,
    pub error_types: BTreeMap<String, u64>,
    pub latency_breakdown: LatencyBreakdown,
    #[serde(skip)]
    pub results: Vec<OperationResult>,
}

impl DatabaseReport {
    fn new(display_name: &str, results: Vec<OperationResult>) -> Self {
        Self {
            database: display_name.to_string(),
            stats: DatabaseStats::from_results(&results),
            errors: error_messages(&results)
                .into_iter()
                .take(MAX_REPORTED_ERRORS)
                .map(str::to_string)
                .collect(),
            error_types: error_types(&results),
            latency_breakdown: LatencyBreakdown::from_results(&results),
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    pub test_id: String,
    pub user_id: String,
    pub rotation: QueryRotation,
    /// Milliseconds since the epoch
    pub start_time: i64,
    pub end_time: i64,
    pub duration: i64,
    pub operations_requested: usize,
    pub total_operations: usize,
    pub score_earned: usize,
}

/// Result of a full benchmark run, keyed by database label
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    pub test_info: TestInfo,
    #[serde(flatten)]
    pub databases: BTreeMap<String, DatabaseReport>,
    pub comparison: Comparison,
}

/// Runs the same query rotation against two databases, one after the other
///
/// Operations are strictly sequential, so each timing is the latency of a
/// single request. A failing operation is recorded and the run continues.
pub struct BenchmarkHarness<A, B> {
    first: A,
    second: B,
    rotation: QueryRotation,
    notifications: Notifications,
}

impl<A, B> BenchmarkHarness<A, B>
where
    A: QueryTarget,
    B: QueryTarget,
{
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            rotation: QueryRotation::default(),
            notifications: Notifications::silent(),
        }
    }

    pub fn with_rotation(mut self, rotation: QueryRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_notifications(mut self, notifications: Notifications) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }

    /// Run `operations` queries against each database and report
    pub async fn run(&self, user_id: &str, operations: usize) -> BenchmarkReport {
        let start_time = Utc::now().timestamp_millis();
        info!(user_id, operations, rotation = %self.rotation, "Benchmark started");
        self.notifications.emit(
            TEST_STARTED_EVENT,
            json!({
                "userId": user_id,
                "database": "BOTH",
                "operationType": "STRESS_TEST",
                "startTime": start_time,
            }),
        );

        let first_results = self.run_pass(&self.first, user_id, operations).await;
        let second_results = self.run_pass(&self.second, user_id, operations).await;

        let successes = first_results
            .iter()
            .chain(second_results.iter())
            .filter(|r| r.success)
            .count();
        let score_earned = successes / OPERATIONS_PER_POINT;

        let end_time = Utc::now().timestamp_millis();
        let duration = end_time - start_time;
        self.notifications.emit(
            TEST_COMPLETED_EVENT,
            json!({
                "userId": user_id,
                "scoreEarned": score_earned,
                "testDuration": duration,
                "firstResults": first_results.len(),
                "secondResults": second_results.len(),
            }),
        );

        let first = DatabaseReport::new(self.first.display_name(), first_results);
        let second = DatabaseReport::new(self.second.display_name(), second_results);
        let comparison = Comparison::between(
            &first.database,
            &first.stats,
            &second.database,
            &second.stats,
        );
        info!(
            winner = %comparison.winner,
            advantage_ms = comparison.advantage_ms,
            score_earned,
            "Benchmark completed"
        );

        let mut databases = BTreeMap::new();
        databases.insert(self.first.label().to_string(), first);
        databases.insert(self.second.label().to_string(), second);

        BenchmarkReport {
            test_info: TestInfo {
                test_id: format!("{user_id}-{end_time}"),
                user_id: user_id.to_string(),
                rotation: self.rotation,
                start_time,
                end_time,
                duration,
                operations_requested: operations,
                total_operations: operations * 2,
                score_earned,
            },
            databases,
            comparison,
        }
    }

    async fn run_pass<T: QueryTarget>(
        &self,
        target: &T,
        user_id: &str,
        operations: usize,
    ) -> Vec<OperationResult> {
        let database = target.label().to_string();
        let mut results = Vec::with_capacity(operations);

        for i in 0..operations {
            if i % PROGRESS_EVERY == 0 {
                let progress = (i as f64 / operations as f64 * 100.0).round() as u64;
                self.notifications.emit(
                    TEST_PROGRESS_EVENT,
                    json!({
                        "userId": user_id,
                        "database": database,
                        "progress": progress,
                        "currentOperation": i + 1,
                        "totalOperations": operations,
                    }),
                );
            }

            let shape = self.rotation.shape_for(i);
            let started = Instant::now();
            let outcome = target.run_query(shape).await;
            let response_time = started.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(rows) => {
                    debug!(%database, operation = %shape, rows, response_time, "Operation succeeded");
                    OperationResult {
                        database: database.clone(),
                        operation: shape.label().to_string(),
                        operation_number: i + 1,
                        response_time,
                        success: true,
                        error: None,
                    }
                }
                Err(error) => {
                    warn!(%database, operation = %shape, %error, "Operation failed");
                    OperationResult {
                        database: database.clone(),
                        operation: shape.label().to_string(),
                        operation_number: i + 1,
                        response_time,
                        success: false,
                        error: Some(error.to_string()),
                    }
                }
            };

            self.notifications.emit(
                OPERATION_COMPLETED_EVENT,
                json!({
                    "userId": user_id,
                    "database": result.database,
                    "operationName": result.operation,
                    "operationNumber": result.operation_number,
                    "totalOperations": operations,
                    "responseTime": result.response_time,
                    "success": result.success,
                    "errorMessage": result.error,
                    "timestamp": Utc::now().timestamp_millis(),
                }),
            );
            results.push(result);
        }

        results
    }
}
