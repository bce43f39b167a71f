//! Driver and database handles.
//!
//! `Driver::open` parses a connection string into a [`Database`];
//! [`Database::connect`] builds the AWS clients and yields a
//! [`Connection`]. Programmatic construction goes through
//! [`Database::from_config`] (custom credential/session wiring) or
//! [`Database::with_clients`] (arbitrary service/store implementations).

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::client::aws::{AthenaQueryService, S3ObjectStore};
use crate::client::{ObjectStore, QueryService};
use crate::config::{Config, ResultMode};
use crate::connection::Connection;
use crate::error::{AthenaError, ConfigError};

/// Assigns each database handle a unique registration name.
///
/// Registration is name-keyed, so this process-wide counter is required; it
/// is the only global mutable state in the driver.
fn next_registration_name() -> String {
    static OPEN_COUNT: Mutex<u64> = Mutex::new(0);
    let mut count = OPEN_COUNT.lock().expect("registration counter poisoned");
    *count += 1;
    format!("athena-{count}")
}

/// Entry point for connection-string construction.
#[derive(Debug, Default)]
pub struct Driver;

impl Driver {
    pub fn new() -> Self {
        Self
    }

    /// Parses a connection string into a database handle. No I/O happens
    /// until [`Database::connect`].
    pub fn open(&self, connection_string: &str) -> Result<Database, AthenaError> {
        let config = Config::from_connection_string(connection_string)?;
        Ok(Database::new(config))
    }
}

/// A configured but not-yet-connected database.
pub struct Database {
    config: Config,
    name: String,
    clients: Option<(Arc<dyn QueryService>, Arc<dyn ObjectStore>)>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("name", &self.name)
            .field("connected", &self.clients.is_some())
            .finish()
    }
}

impl Database {
    fn new(mut config: Config) -> Self {
        config.apply_defaults();
        Self {
            config,
            name: next_registration_name(),
            clients: None,
        }
    }

    /// Builds a database from a fully-populated [`Config`]. The config must
    /// carry an AWS SDK configuration; use this for custom credential or
    /// session wiring.
    pub fn from_config(config: Config) -> Result<Self, AthenaError> {
        if config.database.is_empty() {
            return Err(ConfigError::DatabaseRequired.into());
        }
        if config.sdk.is_none() {
            return Err(ConfigError::SessionRequired.into());
        }
        Ok(Self::new(config))
    }

    /// Builds a database on explicit service and store implementations,
    /// bypassing the AWS clients entirely.
    pub fn with_clients(
        config: Config,
        service: Arc<dyn QueryService>,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, AthenaError> {
        if config.database.is_empty() {
            return Err(ConfigError::DatabaseRequired.into());
        }
        let mut database = Self::new(config);
        database.clients = Some((service, store));
        Ok(database)
    }

    /// The handle's unique registration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connects: builds clients if needed and, for download modes with no
    /// configured output location, resolves the workgroup default up front
    /// so misconfiguration fails here rather than at query time.
    pub async fn connect(&self) -> Result<Connection, AthenaError> {
        let (service, store) = match &self.clients {
            Some((service, store)) => (service.clone(), store.clone()),
            None => {
                let sdk = match &self.config.sdk {
                    Some(sdk) => sdk.clone(),
                    None => load_sdk_config(self.config.region.as_deref()).await,
                };
                (
                    Arc::new(AthenaQueryService::from_sdk_config(&sdk)) as Arc<dyn QueryService>,
                    Arc::new(S3ObjectStore::from_sdk_config(&sdk)) as Arc<dyn ObjectStore>,
                )
            }
        };

        let connection = Connection::new(self.config.clone(), service, store);
        if self.config.result_mode != ResultMode::Api {
            connection
                .output_location_for(self.config.result_mode)
                .await?;
        }

        debug!(name = %self.name, database = %self.config.database, "connected");
        Ok(connection)
    }
}

async fn load_sdk_config(region: Option<&str>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_owned()));
    }
    loader.load().await
}
