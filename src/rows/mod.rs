//! Result cursors: one polymorphic surface over three retrieval strategies.
//!
//! A completed execution's rows can be read three ways — paginated API
//! calls, a whole-file CSV download, or a derived table's compressed data
//! files. Each strategy is a variant of [`Rows`]; the variant is chosen once
//! at construction from the active [`ResultMode`] and is the single
//! extension point for future retrieval strategies.

mod api;
mod ctas;
mod download;

pub use api::ApiRows;
pub use ctas::CtasRows;
pub use download::DownloadRows;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{ObjectStore, QueryService};
use crate::config::ResultMode;
use crate::error::{AthenaError, RetrievalError};
use crate::query::gateway::QueryGateway;
use crate::types::Value;

/// Everything a cursor variant needs to construct itself.
pub(crate) struct RowsConfig {
    pub service: Arc<dyn QueryService>,
    pub store: Arc<dyn ObjectStore>,
    pub execution_id: String,
    /// The first row of a row-producing query's first page duplicates the
    /// header and is skipped; DDL output has no header row.
    pub skip_header: bool,
    pub result_mode: ResultMode,
    pub output_location: String,
    pub deadline: Instant,
    pub timeout_secs: u64,
    pub database: String,
    pub catalog: String,
    /// Name of the derived table, when one was created for this query.
    pub ctas_table: String,
    pub cleanup: Option<CtasCleanup>,
}

/// Drops the temporary derived table once its contents are read.
///
/// Runs on both the success and the failure path of cursor construction so
/// server-side storage is not leaked; only deadline expiry skips it.
pub(crate) struct CtasCleanup {
    pub gateway: QueryGateway,
    pub output_location: String,
    pub table: String,
    pub timeout_secs: u64,
}

impl CtasCleanup {
    pub async fn run(&self) -> Result<(), AthenaError> {
        let sql = format!("DROP TABLE {}", self.table);
        let execution_id = self.gateway.submit(&sql, &self.output_location).await?;
        let deadline = Instant::now() + Duration::from_secs(self.timeout_secs);
        self.gateway
            .wait(
                &execution_id,
                deadline,
                self.timeout_secs,
                &CancellationToken::new(),
            )
            .await?;
        Ok(())
    }
}

/// A cursor over one completed query's rows.
///
/// Rows are yielded in the order the underlying source provides them: page
/// order for [`ApiRows`], file-line order for [`DownloadRows`], manifest
/// order for [`CtasRows`].
#[derive(Debug)]
pub enum Rows {
    Api(ApiRows),
    Download(DownloadRows),
    Ctas(CtasRows),
}

impl Rows {
    pub(crate) async fn new(config: RowsConfig) -> Result<Self, AthenaError> {
        match config.result_mode {
            ResultMode::Api => Ok(Rows::Api(ApiRows::new(config).await?)),
            ResultMode::Download => Ok(Rows::Download(DownloadRows::new(config).await?)),
            ResultMode::GzipDownload => Ok(Rows::Ctas(CtasRows::new(config).await?)),
        }
    }

    /// Column names, in result order.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Rows::Api(rows) => rows.columns(),
            Rows::Download(rows) => rows.columns(),
            Rows::Ctas(rows) => rows.columns(),
        }
    }

    /// Declared type name of one column.
    ///
    /// Note that the same logical type is reported differently per mode:
    /// `integer`/`varchar` through the API, `int`/`string` from a derived
    /// table's schema.
    pub fn column_type_name(&self, index: usize) -> Option<&str> {
        match self {
            Rows::Api(rows) => rows.column_type_name(index),
            Rows::Download(rows) => rows.column_type_name(index),
            Rows::Ctas(rows) => rows.column_type_name(index),
        }
    }

    /// Yields the next decoded row, or `None` once exhausted.
    pub async fn next_row(&mut self) -> Result<Option<Vec<Value>>, AthenaError> {
        match self {
            Rows::Api(rows) => rows.next_row().await,
            Rows::Download(rows) => rows.next_row(),
            Rows::Ctas(rows) => rows.next_row(),
        }
    }
}

/// Splits an `s3://bucket[/prefix]` location into bucket and key prefix.
pub(crate) fn split_location(location: &str) -> Result<(&str, &str), RetrievalError> {
    let trimmed = location.trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("s3://")
        .ok_or_else(|| RetrievalError::InvalidLocation(location.to_owned()))?;
    if rest.is_empty() {
        return Err(RetrievalError::InvalidLocation(location.to_owned()));
    }
    Ok(match rest.split_once('/') {
        Some((bucket, prefix)) => (bucket, prefix),
        None => (rest, ""),
    })
}

/// Joins a key prefix and an object name.
pub(crate) fn object_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}/{name}")
    }
}
