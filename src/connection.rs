//! Connection: turns exec/query calls into submit → poll → cursor dispatch.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::client::{ObjectStore, QueryService};
use crate::config::{Config, QueryOptions, ResultMode};
use crate::error::AthenaError;
use crate::query::gateway::QueryGateway;
use crate::query::prepared::PreparedStatement;
use crate::rows::{CtasCleanup, Rows, RowsConfig};

fn ddl_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(ALTER|CREATE|DESCRIBE|DROP|MSCK|SHOW)").expect("static pattern")
    })
}

fn select_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^SELECT").expect("static pattern"))
}

/// DDL output carries no duplicated header row.
pub(crate) fn is_ddl_query(sql: &str) -> bool {
    ddl_regex().is_match(sql)
}

pub(crate) fn is_select_query(sql: &str) -> bool {
    select_regex().is_match(sql)
}

/// An open connection to the service.
///
/// Cheap to clone; clones share the underlying clients and configuration.
/// There are no transactions — the remote service has none, so no `begin`
/// API exists.
#[derive(Clone)]
pub struct Connection {
    pub(crate) service: Arc<dyn QueryService>,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) config: Config,
    pub(crate) gateway: QueryGateway,
    /// Output location resolved from the workgroup, cached after first use.
    resolved_output_location: Arc<Mutex<Option<String>>>,
}

impl Connection {
    pub(crate) fn new(
        config: Config,
        service: Arc<dyn QueryService>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let gateway = QueryGateway::new(
            service.clone(),
            config.database.clone(),
            config.workgroup.clone(),
            config.poll_frequency,
        );
        Self {
            service,
            store,
            config,
            gateway,
            resolved_output_location: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs a query and returns a cursor over its rows.
    pub async fn query(&self, sql: &str) -> Result<Rows, AthenaError> {
        self.query_with(sql, &QueryOptions::default()).await
    }

    /// [`Connection::query`] with per-call overrides.
    pub async fn query_with(&self, sql: &str, options: &QueryOptions) -> Result<Rows, AthenaError> {
        let mode = self.effective_mode(sql, options);
        let (sql, ctas_table) = wrap_for_mode(sql, mode);
        self.run(&sql, mode, ctas_table, options).await
    }

    /// Runs a statement, discarding any rows it produces.
    pub async fn execute(&self, sql: &str) -> Result<(), AthenaError> {
        self.execute_with(sql, &QueryOptions::default()).await
    }

    /// [`Connection::execute`] with per-call overrides.
    pub async fn execute_with(
        &self,
        sql: &str,
        options: &QueryOptions,
    ) -> Result<(), AthenaError> {
        self.query_with(sql, options).await.map(|_| ())
    }

    /// Creates a server-side prepared statement with positional `?`
    /// placeholders.
    pub async fn prepare(&self, sql: &str) -> Result<PreparedStatement, AthenaError> {
        self.prepare_with(sql, &QueryOptions::default()).await
    }

    /// [`Connection::prepare`] with per-call overrides. The result mode is
    /// fixed for the statement's lifetime at prepare time.
    pub async fn prepare_with(
        &self,
        sql: &str,
        options: &QueryOptions,
    ) -> Result<PreparedStatement, AthenaError> {
        let mode = self.effective_mode(sql, options);
        let (wrapped, ctas_table) = wrap_for_mode(sql, mode);
        let param_count = wrapped.matches('?').count();

        let prepare_key = format!("tmp_prepare_{}", Uuid::new_v4().simple());
        let prepare_sql = format!("PREPARE {prepare_key} FROM {wrapped}");

        let timeout_secs = options.timeout_secs.unwrap_or(self.config.timeout_secs);
        let cancel = options.cancel.clone().unwrap_or_default();
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);

        let execution_id = self
            .gateway
            .submit(&prepare_sql, &self.config.output_location)
            .await?;
        self.gateway
            .wait(&execution_id, deadline, timeout_secs, &cancel)
            .await?;

        Ok(PreparedStatement::new(
            self.clone(),
            prepare_key,
            param_count,
            mode,
            ctas_table,
        ))
    }

    /// Submit → poll → dispatch for an already-wrapped statement.
    pub(crate) async fn run(
        &self,
        sql: &str,
        mode: ResultMode,
        ctas_table: String,
        options: &QueryOptions,
    ) -> Result<Rows, AthenaError> {
        let timeout_secs = options.timeout_secs.unwrap_or(self.config.timeout_secs);
        let catalog = options
            .catalog
            .clone()
            .unwrap_or_else(|| self.config.catalog.clone());
        let cancel = options.cancel.clone().unwrap_or_default();
        let output_location = self.output_location_for(mode).await?;

        // One deadline bounds the poll loop and, in download modes, cursor
        // construction.
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);

        let execution_id = self.gateway.submit(sql, &output_location).await?;
        self.gateway
            .wait(&execution_id, deadline, timeout_secs, &cancel)
            .await?;

        let cleanup = (!ctas_table.is_empty()).then(|| CtasCleanup {
            gateway: self.gateway.clone(),
            output_location: output_location.clone(),
            table: ctas_table.clone(),
            timeout_secs,
        });

        Rows::new(RowsConfig {
            service: self.service.clone(),
            store: self.store.clone(),
            execution_id,
            skip_header: !is_ddl_query(sql),
            result_mode: mode,
            output_location,
            deadline,
            timeout_secs,
            database: self.config.database.clone(),
            catalog,
            ctas_table,
            cleanup,
        })
        .await
    }

    /// Per-call mode wins over the connection default; non-SELECT statements
    /// always use the API — the download modes only exist for row-producing
    /// queries.
    fn effective_mode(&self, sql: &str, options: &QueryOptions) -> ResultMode {
        if !is_select_query(sql) {
            return ResultMode::Api;
        }
        options.result_mode.unwrap_or(self.config.result_mode)
    }

    /// Download modes need a concrete output location; when none is
    /// configured, the workgroup's default is fetched once and cached.
    pub(crate) async fn output_location_for(
        &self,
        mode: ResultMode,
    ) -> Result<String, AthenaError> {
        if mode == ResultMode::Api || !self.config.output_location.is_empty() {
            return Ok(self.config.output_location.clone());
        }

        let mut resolved = self.resolved_output_location.lock().await;
        if let Some(location) = resolved.as_ref() {
            return Ok(location.clone());
        }

        let location = self
            .service
            .work_group_output_location(&self.config.workgroup)
            .await?;
        debug!(
            workgroup = %self.config.workgroup,
            location = %location,
            "resolved output location from workgroup",
        );
        *resolved = Some(location.clone());
        Ok(location)
    }
}

/// In gzip mode the SELECT is wrapped into a CTAS materializing a uniquely
/// named temporary table; that wrapped query is what actually runs.
fn wrap_for_mode(sql: &str, mode: ResultMode) -> (String, String) {
    if mode != ResultMode::GzipDownload {
        return (sql.to_owned(), String::new());
    }
    let table = format!("tmp_ctas_{}", Uuid::new_v4().simple());
    let wrapped = format!("CREATE TABLE {table} WITH (format='TEXTFILE') AS {sql}");
    (wrapped, table)
}
