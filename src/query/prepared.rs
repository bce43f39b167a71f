//! Server-side prepared statements.
//!
//! A statement lives remotely under a unique `tmp_prepare_` key from PREPARE
//! until DEALLOCATE. Each execute renders the bound parameters into an
//! `EXECUTE ... USING` statement which then runs through the normal
//! submit → poll → cursor pipeline. The statement's result mode was fixed
//! when it was prepared.

use crate::config::{QueryOptions, ResultMode};
use crate::connection::Connection;
use crate::error::AthenaError;
use crate::query::literal::{execute_query_text, Param};
use crate::rows::Rows;

pub struct PreparedStatement {
    connection: Connection,
    prepare_key: String,
    param_count: usize,
    result_mode: ResultMode,
    ctas_table: String,
    closed: bool,
}

impl PreparedStatement {
    pub(crate) fn new(
        connection: Connection,
        prepare_key: String,
        param_count: usize,
        result_mode: ResultMode,
        ctas_table: String,
    ) -> Self {
        Self {
            connection,
            prepare_key,
            param_count,
            result_mode,
            ctas_table,
            closed: false,
        }
    }

    /// Number of positional `?` placeholders, counted at prepare time.
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Executes with the given parameters and returns a cursor.
    ///
    /// # Panics
    ///
    /// Panics if the statement has been closed — that is a contract
    /// violation, not a recoverable error.
    pub async fn query(&self, params: &[Param]) -> Result<Rows, AthenaError> {
        self.query_with(params, &QueryOptions::default()).await
    }

    /// [`PreparedStatement::query`] with per-call overrides.
    pub async fn query_with(
        &self,
        params: &[Param],
        options: &QueryOptions,
    ) -> Result<Rows, AthenaError> {
        assert!(!self.closed, "prepared statement used after close");
        let force_numeric_string = options.force_numeric_string.unwrap_or(false);
        let sql = execute_query_text(&self.prepare_key, params, force_numeric_string);
        self.connection
            .run(&sql, self.result_mode, self.ctas_table.clone(), options)
            .await
    }

    /// Executes with the given parameters, discarding any rows.
    pub async fn execute(&self, params: &[Param]) -> Result<(), AthenaError> {
        self.execute_with(params, &QueryOptions::default()).await
    }

    /// [`PreparedStatement::execute`] with per-call overrides.
    pub async fn execute_with(
        &self,
        params: &[Param],
        options: &QueryOptions,
    ) -> Result<(), AthenaError> {
        self.query_with(params, options).await.map(|_| ())
    }

    /// Releases the server-side statement.
    ///
    /// Idempotent: the first call submits `DEALLOCATE PREPARE`; later calls
    /// are no-ops.
    pub async fn close(&mut self) -> Result<(), AthenaError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let sql = format!("DEALLOCATE PREPARE {}", self.prepare_key);
        self.connection
            .gateway
            .submit(&sql, &self.connection.config.output_location)
            .await?;
        Ok(())
    }
}
