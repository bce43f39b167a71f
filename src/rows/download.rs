//! Bulk CSV download retrieval.
//!
//! The service writes a `<execution id>.csv` object alongside the API
//! results. Downloading it sidesteps the API's paging limits for large
//! result sets at the cost of holding the whole result in memory. Column
//! metadata still comes from the API, via a minimal one-row page request
//! issued concurrently with the download.

#[cfg(test)]
use std::sync::Arc;

use crate::client::{ColumnDesc, ObjectStore, QueryService};
use crate::error::{AthenaError, ConversionError, QueryError, RetrievalError};
use crate::types::{coerce, Value};

use super::{object_key, split_location, RowsConfig};

/// One CSV field. An unquoted empty field is null; a quoted empty field is
/// an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct CsvField {
    pub value: String,
    pub is_null: bool,
}

#[derive(Debug)]
pub struct DownloadRows {
    columns: Vec<ColumnDesc>,
    records: Vec<Vec<CsvField>>,
    cursor: usize,
}

impl DownloadRows {
    pub(crate) async fn new(config: RowsConfig) -> Result<Self, AthenaError> {
        let download = download_records(&*config.store, &config.output_location, &config.execution_id);
        let metadata = fetch_columns(&*config.service, &config.execution_id);

        // Both operations share the call's deadline; the first failure
        // cancels the other branch and discards partial results.
        let joined = tokio::time::timeout_at(config.deadline, async {
            tokio::try_join!(download, metadata)
        })
        .await;

        let (mut records, columns) = match joined {
            Err(_) => {
                return Err(QueryError::Timeout {
                    seconds: config.timeout_secs,
                }
                .into())
            }
            Ok(outcome) => outcome?,
        };

        // The first record repeats the column names.
        if !records.is_empty() {
            records.remove(0);
        }

        Ok(Self {
            columns,
            records,
            cursor: 0,
        })
    }

    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_type_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.type_name.as_str())
    }

    pub fn next_row(&mut self) -> Result<Option<Vec<Value>>, AthenaError> {
        let Some(fields) = self.records.get(self.cursor) else {
            return Ok(None);
        };
        let row = convert_csv_row(&self.columns, fields)?;
        self.cursor += 1;
        Ok(Some(row))
    }
}

async fn download_records(
    store: &dyn ObjectStore,
    output_location: &str,
    execution_id: &str,
) -> Result<Vec<Vec<CsvField>>, AthenaError> {
    let (bucket, prefix) = split_location(output_location)?;
    let key = object_key(prefix, &format!("{execution_id}.csv"));
    let body = store
        .get_object(bucket, &key)
        .await
        .map_err(RetrievalError::Download)?;
    Ok(parse_csv_records(&String::from_utf8_lossy(&body)))
}

async fn fetch_columns(
    service: &dyn QueryService,
    execution_id: &str,
) -> Result<Vec<ColumnDesc>, AthenaError> {
    let page = service
        .get_query_results(execution_id, None, Some(1))
        .await
        .map_err(RetrievalError::Metadata)?;
    Ok(page.columns)
}

fn convert_csv_row(
    columns: &[ColumnDesc],
    fields: &[CsvField],
) -> Result<Vec<Value>, ConversionError> {
    let mut row = Vec::with_capacity(fields.len());
    for (index, field) in fields.iter().enumerate() {
        if field.is_null {
            row.push(Value::Null);
            continue;
        }
        let column_type = columns
            .get(index)
            .map(|c| c.type_name.as_str())
            .unwrap_or_default();
        let value = coerce(&field.value, column_type).map_err(|_| ConversionError {
            index,
            value: field.value.clone(),
            column_type: column_type.to_owned(),
        })?;
        row.push(value);
    }
    Ok(row)
}

/// Parses the service's CSV output.
///
/// Fields are comma-separated; a field whose first character is a double
/// quote is quoted, with embedded quotes doubled. The null distinction the
/// standard encoders cannot express is why this is hand-rolled: an unquoted
/// empty field is null, a quoted empty field is an empty string.
pub(crate) fn parse_csv_records(input: &str) -> Vec<Vec<CsvField>> {
    let mut records = Vec::new();

    for line in input.lines() {
        let mut record = Vec::new();
        let mut field = String::new();
        let mut quoted = false;

        for ch in line.chars() {
            if field.is_empty() {
                quoted = ch == '"';
            }

            let mut delimiter = false;
            if ch == ',' {
                if quoted {
                    if field.len() > 1 && field.ends_with('"') {
                        field = field[1..field.len() - 1].to_owned();
                        delimiter = true;
                    }
                } else {
                    delimiter = true;
                }
            }

            if delimiter {
                record.push(CsvField {
                    is_null: !quoted && field.is_empty(),
                    value: std::mem::take(&mut field),
                });
            } else {
                field.push(ch);
            }
        }

        if quoted && field.len() > 1 && field.ends_with('"') {
            field = field[1..field.len() - 1].to_owned();
        }
        record.push(CsvField {
            is_null: !quoted && field.is_empty(),
            value: field,
        });

        records.push(record);
    }

    records
}
