//! Derived-table retrieval.
//!
//! In gzip mode the original SELECT was wrapped into a CTAS at submission
//! time, so the execution's output is a set of compressed text-format data
//! files listed by a manifest object, and the column schema comes from the
//! temporary table itself — independent of the result-listing API's
//! metadata limits. The table is dropped once its contents are read.

use std::io::Read;

use flate2::read::GzDecoder;
use tracing::warn;

use crate::client::{ObjectStore, QueryService, TableColumn};
use crate::error::{AthenaError, ConversionError, QueryError, RetrievalError};
use crate::types::{coerce, Value};

use super::{split_location, RowsConfig};

/// Field delimiter in the table's text-format data files.
const FIELD_DELIMITER: char = '\u{1}';

/// Null marker in the table's text-format data files.
const NULL_MARKER: &str = "\\N";

#[derive(Debug)]
pub struct CtasRows {
    columns: Vec<TableColumn>,
    records: Vec<Vec<String>>,
    cursor: usize,
}

impl CtasRows {
    pub(crate) async fn new(config: RowsConfig) -> Result<Self, AthenaError> {
        let download =
            download_table_data(&*config.store, &config.output_location, &config.execution_id);
        let describe = fetch_table_columns(
            &*config.service,
            &config.catalog,
            &config.database,
            &config.ctas_table,
        );

        // Schema and data are fetched concurrently under the call's
        // deadline; the first failure cancels the other branch.
        let joined = tokio::time::timeout_at(config.deadline, async {
            tokio::try_join!(download, describe)
        })
        .await;

        let outcome = match joined {
            // Deadline expiry propagates cancellation to both branches; no
            // cleanup is attempted on this path.
            Err(_) => {
                return Err(QueryError::Timeout {
                    seconds: config.timeout_secs,
                }
                .into())
            }
            Ok(outcome) => outcome,
        };

        // The temporary table is dropped whether or not retrieval succeeded,
        // so a failed read does not leak server-side storage. A cleanup
        // failure never masks the retrieval error.
        match outcome {
            Ok((records, columns)) => {
                if let Some(cleanup) = &config.cleanup {
                    cleanup.run().await?;
                }
                Ok(Self {
                    columns,
                    records,
                    cursor: 0,
                })
            }
            Err(err) => {
                if let Some(cleanup) = &config.cleanup {
                    if let Err(cleanup_err) = cleanup.run().await {
                        warn!(
                            table = %config.ctas_table,
                            error = %cleanup_err,
                            "dropping derived table failed",
                        );
                    }
                }
                Err(err)
            }
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_type_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).and_then(|c| c.type_name.as_deref())
    }

    pub fn next_row(&mut self) -> Result<Option<Vec<Value>>, AthenaError> {
        let Some(record) = self.records.get(self.cursor) else {
            return Ok(None);
        };
        let row = convert_table_row(&self.columns, record)?;
        self.cursor += 1;
        Ok(Some(row))
    }
}

async fn download_table_data(
    store: &dyn ObjectStore,
    output_location: &str,
    execution_id: &str,
) -> Result<Vec<Vec<String>>, AthenaError> {
    let (bucket, _) = split_location(output_location)?;

    let manifest_key = manifest_key(output_location, execution_id)?;
    let manifest = store
        .get_object(bucket, &manifest_key)
        .await
        .map_err(RetrievalError::Download)?;
    let keys = manifest_object_keys(&String::from_utf8_lossy(&manifest), bucket);

    let mut records = Vec::new();
    for key in keys {
        let body = store
            .get_object(bucket, &key)
            .await
            .map_err(RetrievalError::Download)?;

        let mut text = String::new();
        GzDecoder::new(&body[..])
            .read_to_string(&mut text)
            .map_err(|e| RetrievalError::Decompress {
                key: key.clone(),
                message: e.to_string(),
            })?;

        records.extend(split_delimited_records(&text));
    }

    Ok(records)
}

fn manifest_key(output_location: &str, execution_id: &str) -> Result<String, RetrievalError> {
    let (_, prefix) = split_location(output_location)?;
    Ok(super::object_key(
        prefix,
        &format!("tables/{execution_id}-manifest.csv"),
    ))
}

/// Manifest lines name each output data file as a full `s3://.../key` URI;
/// the keys are made bucket-relative, preserving the listed order.
fn manifest_object_keys(manifest: &str, bucket: &str) -> Vec<String> {
    let uri_prefix = format!("s3://{bucket}/");
    manifest
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.strip_prefix(&uri_prefix).unwrap_or(line).to_owned())
        .collect()
}

/// Each line is one record; fields are separated by the 0x01 control byte.
fn split_delimited_records(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(|line| line.split(FIELD_DELIMITER).map(str::to_owned).collect())
        .collect()
}

async fn fetch_table_columns(
    service: &dyn QueryService,
    catalog: &str,
    database: &str,
    table: &str,
) -> Result<Vec<TableColumn>, AthenaError> {
    let columns = service
        .get_table_metadata(catalog, database, table)
        .await
        .map_err(RetrievalError::Metadata)?;
    Ok(columns)
}

fn convert_table_row(
    columns: &[TableColumn],
    record: &[String],
) -> Result<Vec<Value>, ConversionError> {
    let mut row = Vec::with_capacity(record.len());
    for (index, raw) in record.iter().enumerate() {
        if raw == NULL_MARKER {
            row.push(Value::Null);
            continue;
        }
        let column_type = columns
            .get(index)
            .and_then(|c| c.type_name.as_deref())
            .unwrap_or_default();
        let value = coerce(raw, column_type).map_err(|_| ConversionError {
            index,
            value: raw.clone(),
            column_type: column_type.to_owned(),
        })?;
        row.push(value);
    }
    Ok(row)
}
