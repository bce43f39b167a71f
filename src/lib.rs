//! # athena-driver
//!
//! SQL driver for Amazon Athena: submit a query, poll it to completion, and
//! iterate its rows through one of three retrieval strategies.
//!
//! Athena executes queries asynchronously and deposits results as objects in
//! S3. This crate bridges that model into an ordinary database-driver shape:
//! connect, exec, prepare, query, iterate typed rows.
//!
//! ## Features
//!
//! - **Three result modes**: paginated API retrieval (default), whole-file
//!   CSV download, and CTAS-based retrieval of gzip-compressed data files —
//!   selectable per connection or per call.
//! - **Typed rows**: textual cells are coerced into integers, floats,
//!   booleans, timestamps and dates from the declared column types; decimals
//!   stay textual to preserve precision.
//! - **Prepared statements**: server-side PREPARE / EXECUTE USING /
//!   DEALLOCATE with positional `?` parameters.
//! - **Deadlines and cancellation**: one configurable timeout bounds
//!   submit-to-ready latency, with best-effort remote cancellation.
//!
//! ## Query example
//!
//! ```no_run
//! use athena_driver::Driver;
//!
//! # async fn example() -> Result<(), athena_driver::AthenaError> {
//! let database = Driver::new()
//!     .open("db=sampledb&output_location=s3://my-bucket&region=us-east-1")?;
//! let connection = database.connect().await?;
//!
//! let mut rows = connection.query("SELECT name, population FROM cities").await?;
//! while let Some(row) = rows.next_row().await? {
//!     println!("{row:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Per-call options
//!
//! ```no_run
//! use athena_driver::{QueryOptions, ResultMode};
//!
//! # async fn example(connection: athena_driver::Connection) -> Result<(), athena_driver::AthenaError> {
//! // Large scan: skip API paging, download the result object instead.
//! let options = QueryOptions::new()
//!     .result_mode(ResultMode::Download)
//!     .timeout_secs(300);
//! let mut rows = connection.query_with("SELECT * FROM events", &options).await?;
//! # let _ = rows.next_row().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Prepared statement example
//!
//! ```no_run
//! use athena_driver::Param;
//!
//! # async fn example(connection: athena_driver::Connection) -> Result<(), athena_driver::AthenaError> {
//! let mut statement = connection
//!     .prepare("SELECT * FROM cities WHERE population > ? AND country = ?")
//!     .await?;
//! let mut rows = statement
//!     .query(&[Param::from(1_000_000i64), Param::from("JP")])
//!     .await?;
//! # let _ = rows.next_row().await?;
//! statement.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod query;
pub mod rows;
pub mod types;

// =============================================================================
// Driver Interface Types
// =============================================================================

/// Re-export the driver, database and connection types.
pub use connection::Connection;
pub use driver::{Database, Driver};

// =============================================================================
// Configuration
// =============================================================================

pub use config::{Config, QueryOptions, ResultMode};

// =============================================================================
// Results
// =============================================================================

pub use rows::{ApiRows, CtasRows, DownloadRows, Rows};
pub use types::Value;

// =============================================================================
// Prepared Statements
// =============================================================================

pub use query::{Param, PreparedStatement};

// =============================================================================
// Error Types
// =============================================================================

/// Re-export error types for convenient matching.
pub use error::{
    AthenaError, ClientError, ConfigError, ConversionError, QueryError, RetrievalError,
};
