//! Connection configuration and per-call options.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;

/// Default workgroup when none is configured.
pub const DEFAULT_WORKGROUP: &str = "primary";

/// Default data catalog name.
pub const DEFAULT_CATALOG: &str = "AwsDataCatalog";

/// Default status-poll interval.
pub const DEFAULT_POLL_FREQUENCY: Duration = Duration::from_secs(5);

/// Default submit-to-ready timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;

/// How a query's results are retrieved.
///
/// Fixed for the lifetime of one exec/query call. Non-SELECT statements are
/// always forced to [`ResultMode::Api`] — the download modes only make sense
/// for row-producing queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultMode {
    /// Paginated retrieval through the result-listing API. The default.
    #[default]
    Api,
    /// Single-object CSV download from the output location. The whole result
    /// set is held in memory; avoids the API's paging limits.
    Download,
    /// The query is wrapped in a CTAS writing a gzip-compressed text table;
    /// its data files are downloaded and the temporary table dropped after
    /// reading. Column type names come from the table schema and use
    /// engine-native spellings (`int`, `string`) rather than the API's
    /// (`integer`, `varchar`).
    GzipDownload,
}

fn parse_result_mode(value: &str) -> Result<ResultMode, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "" | "api" => Ok(ResultMode::Api),
        "dl" | "download" => Ok(ResultMode::Download),
        "gzip" => Ok(ResultMode::GzipDownload),
        _ => Err(ConfigError::InvalidResultMode(value.to_owned())),
    }
}

/// Accepts `300ms`, `5s`, `2m` style duration strings.
fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidPollFrequency(value.to_owned());

    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => value.split_at(split),
        None => return Err(invalid()),
    };
    let number: u64 = number.parse().map_err(|_| invalid())?;

    match unit {
        "ms" => Ok(Duration::from_millis(number)),
        "s" => Ok(Duration::from_secs(number)),
        "m" => Ok(Duration::from_secs(number * 60)),
        _ => Err(invalid()),
    }
}

/// Connection-level configuration.
///
/// Built either from a connection string ([`Config::from_connection_string`])
/// or directly, for callers that need custom credential/session wiring.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// AWS SDK configuration. Required for
    /// [`Database::from_config`](crate::Database::from_config); when opening
    /// from a connection string the default credential chain is loaded at
    /// connect time instead.
    pub sdk: Option<aws_config::SdkConfig>,
    /// Database queries run against. Required.
    pub database: String,
    /// `s3://bucket[/prefix]` URI results are written to. When empty and a
    /// download mode is active, the workgroup's configured location is used.
    pub output_location: String,
    /// Workgroup submissions run in. Defaults to [`DEFAULT_WORKGROUP`].
    pub workgroup: String,
    /// Region override for the default credential chain.
    pub region: Option<String>,
    /// Status-poll interval. Defaults to [`DEFAULT_POLL_FREQUENCY`].
    pub poll_frequency: Duration,
    /// Default result-retrieval mode.
    pub result_mode: ResultMode,
    /// Default submit-to-ready timeout in seconds. Defaults to
    /// [`DEFAULT_TIMEOUT_SECS`].
    pub timeout_secs: u64,
    /// Data catalog for describe-table calls. Defaults to [`DEFAULT_CATALOG`].
    pub catalog: String,
}

impl Config {
    /// Creates a configuration with the given database and all defaults.
    pub fn new(database: impl Into<String>) -> Self {
        let mut config = Self {
            database: database.into(),
            ..Self::default()
        };
        config.apply_defaults();
        config
    }

    /// Parses a `k=v&k2=v2` connection string.
    ///
    /// Recognized keys: `db` (required), `output_location`, `region`,
    /// `workgroup`, `poll_frequency` (duration string, default `5s`),
    /// `result_mode` (`api` | `dl` | `download` | `gzip`, default `api`),
    /// `timeout` (seconds, default 1800), `catalog`.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (key, value) in url::form_urlencoded::parse(connection_string.as_bytes()) {
            match key.as_ref() {
                "db" => config.database = value.into_owned(),
                "output_location" => config.output_location = value.into_owned(),
                "region" if !value.is_empty() => config.region = Some(value.into_owned()),
                "workgroup" => config.workgroup = value.into_owned(),
                "poll_frequency" if !value.is_empty() => {
                    config.poll_frequency = parse_duration(&value)?;
                }
                "result_mode" => config.result_mode = parse_result_mode(&value)?,
                "timeout" if !value.is_empty() => {
                    config.timeout_secs = value
                        .parse()
                        .map_err(|_| ConfigError::InvalidTimeout(value.to_string()))?;
                }
                "catalog" => config.catalog = value.into_owned(),
                _ => {}
            }
        }

        if config.database.is_empty() {
            return Err(ConfigError::DatabaseRequired);
        }

        config.apply_defaults();
        Ok(config)
    }

    pub(crate) fn apply_defaults(&mut self) {
        if self.workgroup.is_empty() {
            self.workgroup = DEFAULT_WORKGROUP.to_owned();
        }
        if self.catalog.is_empty() {
            self.catalog = DEFAULT_CATALOG.to_owned();
        }
        if self.poll_frequency.is_zero() {
            self.poll_frequency = DEFAULT_POLL_FREQUENCY;
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
    }
}

/// Per-call overrides.
///
/// A value set here wins over the connection-level default for one
/// exec/query/prepare call; unset fields inherit the connection's.
///
/// ```
/// use athena_driver::{QueryOptions, ResultMode};
///
/// let options = QueryOptions::new()
///     .result_mode(ResultMode::Download)
///     .timeout_secs(60);
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub(crate) result_mode: Option<ResultMode>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) catalog: Option<String>,
    pub(crate) force_numeric_string: Option<bool>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the result-retrieval mode for this call.
    pub fn result_mode(mut self, mode: ResultMode) -> Self {
        self.result_mode = Some(mode);
        self
    }

    /// Overrides the submit-to-ready timeout for this call.
    pub fn timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }

    /// Overrides the data catalog for this call.
    pub fn catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    /// When true, string parameters that happen to parse as numbers are still
    /// rendered as quoted string literals. By default a numeric-looking
    /// string renders as a bare numeric literal; see
    /// [`Param::to_literal`](crate::Param::to_literal).
    pub fn force_numeric_string(mut self, force: bool) -> Self {
        self.force_numeric_string = Some(force);
        self
    }

    /// Attaches a cancellation token. Cancelling it while the call is waiting
    /// issues a best-effort remote stop and fails the call with
    /// [`QueryError::Cancelled`](crate::error::QueryError::Cancelled).
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
