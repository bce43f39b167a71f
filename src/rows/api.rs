//! Paginated retrieval straight from the result-listing API.
//!
//! Memory use is bounded by one page; nothing is cached beyond the current
//! buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::client::{ColumnDesc, QueryService};
use crate::error::{AthenaError, ConversionError, RetrievalError};
use crate::types::{coerce, Value};

use super::RowsConfig;

pub struct ApiRows {
    service: Arc<dyn QueryService>,
    execution_id: String,
    skip_header: bool,
    columns: Vec<ColumnDesc>,
    buffer: VecDeque<Vec<Option<String>>>,
    next_token: Option<String>,
    done: bool,
}

impl std::fmt::Debug for ApiRows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRows")
            .field("execution_id", &self.execution_id)
            .field("skip_header", &self.skip_header)
            .field("columns", &self.columns)
            .field("buffer", &self.buffer)
            .field("next_token", &self.next_token)
            .field("done", &self.done)
            .finish()
    }
}

impl ApiRows {
    pub(crate) async fn new(config: RowsConfig) -> Result<Self, AthenaError> {
        let mut rows = Self {
            service: config.service,
            execution_id: config.execution_id,
            skip_header: config.skip_header,
            columns: Vec::new(),
            buffer: VecDeque::new(),
            next_token: None,
            done: false,
        };
        rows.fetch_next_page().await?;
        Ok(rows)
    }

    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_type_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.type_name.as_str())
    }

    pub async fn next_row(&mut self) -> Result<Option<Vec<Value>>, AthenaError> {
        if self.buffer.is_empty() {
            if self.done {
                return Ok(None);
            }
            self.fetch_next_page().await?;
            if self.buffer.is_empty() {
                return Ok(None);
            }
        }

        let cells = self.buffer.pop_front().expect("buffer is non-empty");
        Ok(Some(self.convert_row(&cells)?))
    }

    async fn fetch_next_page(&mut self) -> Result<(), AthenaError> {
        let page = self
            .service
            .get_query_results(&self.execution_id, self.next_token.as_deref(), None)
            .await
            .map_err(RetrievalError::Page)?;

        // Column metadata is identical on every page; capture it once.
        if self.columns.is_empty() {
            self.columns = page.columns;
        }

        let mut rows = page.rows;
        if self.skip_header && !rows.is_empty() {
            rows.remove(0);
        }
        self.skip_header = false;

        self.next_token = page.next_token;
        self.done = self.next_token.is_none();
        self.buffer = rows.into();
        Ok(())
    }

    fn convert_row(&self, cells: &[Option<String>]) -> Result<Vec<Value>, ConversionError> {
        let mut row = Vec::with_capacity(cells.len());
        for (index, cell) in cells.iter().enumerate() {
            match cell {
                None => row.push(Value::Null),
                Some(raw) => {
                    let column_type = self
                        .columns
                        .get(index)
                        .map(|c| c.type_name.as_str())
                        .unwrap_or_default();
                    let value = coerce(raw, column_type).map_err(|_| ConversionError {
                        index,
                        value: raw.clone(),
                        column_type: column_type.to_owned(),
                    })?;
                    row.push(value);
                }
            }
        }
        Ok(row)
    }
}
