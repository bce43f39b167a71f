//! AWS SDK implementations of the capability traits.
//!
//! These adapters are deliberately thin: they translate between SDK types and
//! the plain types in [`crate::client`], and tag every failure with the name
//! of the API call that produced it. All driver logic lives above the traits.

use async_trait::async_trait;
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use bytes::Bytes;

use crate::client::{
    ColumnDesc, ExecutionState, ExecutionStatus, ObjectStore, QueryService, ResultPage,
    StartQuery, TableColumn,
};
use crate::error::ClientError;

fn call_error(operation: &'static str, err: impl std::fmt::Display) -> ClientError {
    ClientError::new(operation, err.to_string())
}

/// [`QueryService`] backed by the Athena API.
#[derive(Debug, Clone)]
pub struct AthenaQueryService {
    client: aws_sdk_athena::Client,
}

impl AthenaQueryService {
    pub fn new(client: aws_sdk_athena::Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_athena::Client::new(config))
    }
}

#[async_trait]
impl QueryService for AthenaQueryService {
    async fn start_query_execution(&self, query: StartQuery) -> Result<String, ClientError> {
        let context = QueryExecutionContext::builder()
            .database(query.database)
            .build();

        let mut request = self
            .client
            .start_query_execution()
            .query_string(query.sql)
            .query_execution_context(context)
            .work_group(query.workgroup);
        if !query.output_location.is_empty() {
            request = request.result_configuration(
                ResultConfiguration::builder()
                    .output_location(query.output_location)
                    .build(),
            );
        }

        let response = request
            .send()
            .await
            .map_err(|e| call_error("StartQueryExecution", e))?;

        response
            .query_execution_id()
            .map(str::to_owned)
            .ok_or_else(|| {
                ClientError::new("StartQueryExecution", "response carried no execution id")
            })
    }

    async fn get_query_execution(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionStatus, ClientError> {
        let response = self
            .client
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| call_error("GetQueryExecution", e))?;

        let status = response
            .query_execution()
            .and_then(|execution| execution.status())
            .ok_or_else(|| ClientError::new("GetQueryExecution", "response carried no status"))?;

        let state = match status.state() {
            Some(QueryExecutionState::Queued) => ExecutionState::Queued,
            Some(QueryExecutionState::Running) => ExecutionState::Running,
            Some(QueryExecutionState::Succeeded) => ExecutionState::Succeeded,
            Some(QueryExecutionState::Failed) => ExecutionState::Failed,
            Some(QueryExecutionState::Cancelled) => ExecutionState::Cancelled,
            other => {
                return Err(ClientError::new(
                    "GetQueryExecution",
                    format!("unknown execution state: {other:?}"),
                ))
            }
        };

        Ok(ExecutionStatus {
            state,
            reason: status.state_change_reason().map(str::to_owned),
        })
    }

    async fn stop_query_execution(&self, execution_id: &str) -> Result<(), ClientError> {
        self.client
            .stop_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| call_error("StopQueryExecution", e))?;
        Ok(())
    }

    async fn get_query_results(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        max_results: Option<i32>,
    ) -> Result<ResultPage, ClientError> {
        let mut request = self
            .client
            .get_query_results()
            .query_execution_id(execution_id);
        if let Some(token) = next_token {
            request = request.next_token(token);
        }
        if let Some(max) = max_results {
            request = request.max_results(max);
        }

        let response = request
            .send()
            .await
            .map_err(|e| call_error("GetQueryResults", e))?;

        let mut page = ResultPage {
            next_token: response.next_token().map(str::to_owned),
            ..Default::default()
        };

        if let Some(result_set) = response.result_set() {
            if let Some(metadata) = result_set.result_set_metadata() {
                for info in metadata.column_info() {
                    page.columns.push(ColumnDesc {
                        name: info.name().to_owned(),
                        type_name: info.r#type().to_owned(),
                    });
                }
            }
            for row in result_set.rows() {
                page.rows.push(
                    row.data()
                        .iter()
                        .map(|datum| datum.var_char_value().map(str::to_owned))
                        .collect(),
                );
            }
        }

        Ok(page)
    }

    async fn get_table_metadata(
        &self,
        catalog: &str,
        database: &str,
        table: &str,
    ) -> Result<Vec<TableColumn>, ClientError> {
        let response = self
            .client
            .get_table_metadata()
            .catalog_name(catalog)
            .database_name(database)
            .table_name(table)
            .send()
            .await
            .map_err(|e| call_error("GetTableMetadata", e))?;

        let metadata = response.table_metadata().ok_or_else(|| {
            ClientError::new("GetTableMetadata", "response carried no table metadata")
        })?;

        Ok(metadata
            .columns()
            .iter()
            .map(|column| TableColumn {
                name: column.name().to_owned(),
                type_name: column.r#type().map(str::to_owned),
            })
            .collect())
    }

    async fn work_group_output_location(&self, workgroup: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .get_work_group()
            .work_group(workgroup)
            .send()
            .await
            .map_err(|e| call_error("GetWorkGroup", e))?;

        response
            .work_group()
            .and_then(|wg| wg.configuration())
            .and_then(|config| config.result_configuration())
            .and_then(|result_config| result_config.output_location())
            .map(str::to_owned)
            .ok_or_else(|| {
                ClientError::new("GetWorkGroup", "work group has no default output location")
            })
    }
}

/// [`ObjectStore`] backed by S3.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_s3::Client::new(config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| call_error("GetObject", e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| call_error("GetObject", e))?;

        Ok(data.into_bytes())
    }
}
