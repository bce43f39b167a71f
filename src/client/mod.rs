//! Remote service boundary.
//!
//! The driver talks to two external collaborators: the query service
//! (submit / poll / cancel / list results / describe tables) and the object
//! store results are written to. Both are abstract capability traits here;
//! [`aws`] provides the production implementations, and tests script their
//! own.

pub mod aws;
mod types;

pub use types::{
    ColumnDesc, ExecutionState, ExecutionStatus, ResultPage, StartQuery, TableColumn,
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ClientError;

/// The remote query service.
///
/// Mirrors the minimal slice of the service API the driver needs. Every
/// method maps to exactly one remote call; failures carry the operation name.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submits a query and returns its execution id.
    async fn start_query_execution(&self, query: StartQuery) -> Result<String, ClientError>;

    /// Reports the current execution state.
    async fn get_query_execution(&self, execution_id: &str)
        -> Result<ExecutionStatus, ClientError>;

    /// Requests that a running execution stop. Best-effort on the remote side.
    async fn stop_query_execution(&self, execution_id: &str) -> Result<(), ClientError>;

    /// Fetches one page of results for a completed execution.
    async fn get_query_results(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        max_results: Option<i32>,
    ) -> Result<ResultPage, ClientError>;

    /// Describes a table's columns via the data catalog.
    async fn get_table_metadata(
        &self,
        catalog: &str,
        database: &str,
        table: &str,
    ) -> Result<Vec<TableColumn>, ClientError>;

    /// Returns the workgroup's default result output location.
    async fn work_group_output_location(&self, workgroup: &str) -> Result<String, ClientError>;
}

/// The object store holding result files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Downloads one object in full.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError>;
}
