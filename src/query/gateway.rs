//! Submission and status polling against the remote query service.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{ExecutionState, QueryService, StartQuery};
use crate::error::QueryError;

/// Owns the submit / poll / cancel protocol for one connection.
///
/// Cheap to clone; all clones share the underlying service handle.
#[derive(Clone)]
pub(crate) struct QueryGateway {
    service: Arc<dyn QueryService>,
    database: String,
    workgroup: String,
    poll_frequency: Duration,
}

impl QueryGateway {
    pub fn new(
        service: Arc<dyn QueryService>,
        database: String,
        workgroup: String,
        poll_frequency: Duration,
    ) -> Self {
        Self {
            service,
            database,
            workgroup,
            poll_frequency,
        }
    }

    /// Submits a query and returns its execution id.
    ///
    /// Submission failures (syntax, permissions) are surfaced immediately;
    /// they are not transient and are not retried.
    pub async fn submit(&self, sql: &str, output_location: &str) -> Result<String, QueryError> {
        let execution_id = self
            .service
            .start_query_execution(StartQuery {
                sql: sql.to_owned(),
                database: self.database.clone(),
                workgroup: self.workgroup.clone(),
                output_location: output_location.to_owned(),
            })
            .await
            .map_err(QueryError::Submission)?;

        debug!(execution_id = %execution_id, "query submitted");
        Ok(execution_id)
    }

    /// Polls until the execution reaches a terminal state, the deadline
    /// expires, or `cancel` fires.
    ///
    /// Deadline expiry and cancellation both issue one best-effort stop
    /// request before returning; a transport error while polling aborts
    /// immediately without a stop request. A terminal `Failed` state carries
    /// the remote-supplied reason verbatim.
    pub async fn wait(
        &self,
        execution_id: &str,
        deadline: Instant,
        timeout_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<(), QueryError> {
        loop {
            let status = self
                .service
                .get_query_execution(execution_id)
                .await
                .map_err(QueryError::Polling)?;

            match status.state {
                ExecutionState::Succeeded => {
                    debug!(execution_id = %execution_id, "query succeeded");
                    return Ok(());
                }
                ExecutionState::Failed => {
                    return Err(QueryError::ExecutionFailed {
                        reason: status.reason.unwrap_or_default(),
                    });
                }
                ExecutionState::Cancelled => return Err(QueryError::Cancelled),
                ExecutionState::Queued | ExecutionState::Running => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.stop_best_effort(execution_id).await;
                    return Err(QueryError::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    self.stop_best_effort(execution_id).await;
                    return Err(QueryError::Timeout { seconds: timeout_secs });
                }
                _ = tokio::time::sleep(self.poll_frequency) => {}
            }
        }
    }

    /// Errors from the stop request are logged, never escalated over the
    /// error already being reported.
    async fn stop_best_effort(&self, execution_id: &str) {
        if let Err(err) = self.service.stop_query_execution(execution_id).await {
            warn!(execution_id = %execution_id, error = %err, "best-effort stop request failed");
        }
    }
}
