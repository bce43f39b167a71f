//! End-to-end driver tests against scripted service and store fakes.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;

use athena_driver::client::{
    ColumnDesc, ExecutionState, ExecutionStatus, ObjectStore, QueryService, ResultPage,
    StartQuery, TableColumn,
};
use athena_driver::{
    AthenaError, ClientError, Config, Database, Param, QueryOptions, ResultMode, RetrievalError,
    Value,
};

/// Scripted query service: records submissions, succeeds immediately, and
/// serves result pages keyed by continuation token.
#[derive(Default)]
struct FakeAthena {
    submissions: Mutex<Vec<StartQuery>>,
    pages: Mutex<HashMap<Option<String>, ResultPage>>,
    table_columns: Mutex<Vec<TableColumn>>,
    fail_table_metadata: bool,
    workgroup_location: Option<String>,
    workgroup_lookups: Mutex<usize>,
}

impl FakeAthena {
    fn with_page(page: ResultPage) -> Self {
        let fake = Self::default();
        fake.pages.lock().unwrap().insert(None, page);
        fake
    }

    fn submissions(&self) -> Vec<StartQuery> {
        self.submissions.lock().unwrap().clone()
    }

    fn set_table_columns(&self, columns: Vec<TableColumn>) {
        *self.table_columns.lock().unwrap() = columns;
    }
}

#[async_trait]
impl QueryService for FakeAthena {
    async fn start_query_execution(&self, query: StartQuery) -> Result<String, ClientError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(query);
        Ok(format!("exec-{}", submissions.len()))
    }

    async fn get_query_execution(
        &self,
        _execution_id: &str,
    ) -> Result<ExecutionStatus, ClientError> {
        Ok(ExecutionStatus {
            state: ExecutionState::Succeeded,
            reason: None,
        })
    }

    async fn stop_query_execution(&self, _execution_id: &str) -> Result<(), ClientError> {
        Ok(())
    }

    async fn get_query_results(
        &self,
        _execution_id: &str,
        next_token: Option<&str>,
        _max_results: Option<i32>,
    ) -> Result<ResultPage, ClientError> {
        self.pages
            .lock()
            .unwrap()
            .get(&next_token.map(str::to_owned))
            .cloned()
            .ok_or_else(|| ClientError::new("GetQueryResults", "no page scripted for token"))
    }

    async fn get_table_metadata(
        &self,
        _catalog: &str,
        _database: &str,
        _table: &str,
    ) -> Result<Vec<TableColumn>, ClientError> {
        if self.fail_table_metadata {
            return Err(ClientError::new("GetTableMetadata", "access denied"));
        }
        Ok(self.table_columns.lock().unwrap().clone())
    }

    async fn work_group_output_location(&self, _workgroup: &str) -> Result<String, ClientError> {
        *self.workgroup_lookups.lock().unwrap() += 1;
        self.workgroup_location
            .clone()
            .ok_or_else(|| ClientError::new("GetWorkGroup", "no default output location"))
    }
}

/// In-memory object store keyed by (bucket, key).
#[derive(Default)]
struct FakeStore {
    objects: Mutex<HashMap<(String, String), Bytes>>,
}

impl FakeStore {
    fn put(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_owned(), key.to_owned()), body.into());
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
            .ok_or_else(|| ClientError::new("GetObject", format!("no such object: {key}")))
    }
}

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn config(result_mode: ResultMode) -> Config {
    let mut config = Config::new("testdb");
    config.output_location = "s3://results-bucket".to_owned();
    config.result_mode = result_mode;
    config
}

async fn connect<S, O>(config: Config, service: Arc<S>, store: Arc<O>) -> athena_driver::Connection
where
    S: QueryService + 'static,
    O: ObjectStore + 'static,
{
    Database::with_clients(config, service, store)
        .unwrap()
        .connect()
        .await
        .unwrap()
}

fn scenario_columns() -> Vec<ColumnDesc> {
    [
        ("nullcol", "varchar"),
        ("dec", "decimal"),
        ("flag", "boolean"),
        ("ts", "timestamp"),
    ]
    .iter()
    .map(|(name, type_name)| ColumnDesc {
        name: (*name).to_owned(),
        type_name: (*type_name).to_owned(),
    })
    .collect()
}

fn scenario_timestamp() -> Value {
    Value::Timestamp(
        NaiveDate::from_ymd_opt(2006, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 11)
            .unwrap(),
    )
}

#[tokio::test]
async fn api_mode_scenario() {
    let header = vec![
        Some("nullcol".to_owned()),
        Some("dec".to_owned()),
        Some("flag".to_owned()),
        Some("ts".to_owned()),
    ];
    let data_row = vec![
        None,
        Some("1001".to_owned()),
        Some("true".to_owned()),
        Some("2006-01-02 03:04:11.0".to_owned()),
    ];
    let service = Arc::new(FakeAthena::with_page(ResultPage {
        columns: scenario_columns(),
        rows: vec![header, data_row.clone(), data_row.clone(), data_row],
        next_token: None,
    }));
    let store = Arc::new(FakeStore::default());

    let connection = connect(config(ResultMode::Api), service.clone(), store).await;
    let mut rows = connection.query("SELECT * FROM fixtures").await.unwrap();

    assert_eq!(rows.columns(), vec!["nullcol", "dec", "flag", "ts"]);
    assert_eq!(rows.column_type_name(0), Some("varchar"));
    assert_eq!(rows.column_type_name(1), Some("decimal"));
    assert_eq!(rows.column_type_name(3), Some("timestamp"));

    let mut count = 0;
    while let Some(row) = rows.next_row().await.unwrap() {
        count += 1;
        assert_eq!(row[0], Value::Null);
        assert_eq!(row[1], Value::Text("1001".to_owned()));
        assert_eq!(row[2], Value::Bool(true));
        assert_eq!(row[3], scenario_timestamp());
    }
    assert_eq!(count, 3);

    // Exactly one submission, passed through verbatim.
    let submissions = service.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].sql, "SELECT * FROM fixtures");
    assert_eq!(submissions[0].database, "testdb");
    assert_eq!(submissions[0].workgroup, "primary");
}

#[tokio::test]
async fn download_mode_scenario() {
    // Metadata comes from a minimal API page; data comes from the CSV object.
    let service = Arc::new(FakeAthena::with_page(ResultPage {
        columns: scenario_columns(),
        rows: Vec::new(),
        next_token: None,
    }));
    let store = Arc::new(FakeStore::default());
    store.put(
        "results-bucket",
        "exec-1.csv",
        "\"nullcol\",\"dec\",\"flag\",\"ts\"\n,\"1001\",\"true\",\"2006-01-02 03:04:11.0\"",
    );

    let connection = connect(config(ResultMode::Download), service, store).await;
    let mut rows = connection.query("SELECT * FROM fixtures").await.unwrap();

    let row = rows.next_row().await.unwrap().unwrap();
    assert_eq!(
        row,
        vec![
            Value::Null,
            Value::Text("1001".to_owned()),
            Value::Bool(true),
            scenario_timestamp(),
        ]
    );
    assert!(rows.next_row().await.unwrap().is_none());
}

#[tokio::test]
async fn ctas_mode_scenario_reports_engine_native_types_and_drops_table() {
    let service = Arc::new(FakeAthena::default());
    service.set_table_columns(vec![
        TableColumn {
            name: "nullcol".to_owned(),
            type_name: Some("string".to_owned()),
        },
        TableColumn {
            name: "dec".to_owned(),
            type_name: Some("decimal(11,5)".to_owned()),
        },
        TableColumn {
            name: "flag".to_owned(),
            type_name: Some("boolean".to_owned()),
        },
        TableColumn {
            name: "ts".to_owned(),
            type_name: Some("timestamp".to_owned()),
        },
    ]);

    let store = Arc::new(FakeStore::default());
    store.put(
        "results-bucket",
        "tables/exec-1-manifest.csv",
        "s3://results-bucket/tables/exec-1/part-0.gz\n",
    );
    store.put(
        "results-bucket",
        "tables/exec-1/part-0.gz",
        gzip("\\N\u{1}1001\u{1}true\u{1}2006-01-02 03:04:11.0\n"),
    );

    let connection = connect(config(ResultMode::GzipDownload), service.clone(), store).await;
    let mut rows = connection.query("SELECT * FROM fixtures").await.unwrap();

    // Same logical columns, but the derived table's type spellings.
    assert_eq!(rows.columns(), vec!["nullcol", "dec", "flag", "ts"]);
    assert_eq!(rows.column_type_name(0), Some("string"));
    assert_eq!(rows.column_type_name(1), Some("decimal(11,5)"));
    assert_eq!(rows.column_type_name(3), Some("timestamp"));

    let row = rows.next_row().await.unwrap().unwrap();
    assert_eq!(row[0], Value::Null);
    assert_eq!(row[1], Value::Text("1001".to_owned()));
    assert_eq!(row[2], Value::Bool(true));
    assert_eq!(row[3], scenario_timestamp());
    assert!(rows.next_row().await.unwrap().is_none());

    // Submission 1 is the CTAS wrapper, submission 2 drops the table.
    let submissions = service.submissions();
    assert_eq!(submissions.len(), 2);
    assert!(submissions[0].sql.starts_with("CREATE TABLE tmp_ctas_"));
    assert!(submissions[0]
        .sql
        .ends_with("WITH (format='TEXTFILE') AS SELECT * FROM fixtures"));
    assert!(submissions[1].sql.starts_with("DROP TABLE tmp_ctas_"));
}

#[tokio::test]
async fn ctas_describe_failure_fails_construction_but_still_drops_table() {
    let mut service = FakeAthena::default();
    service.fail_table_metadata = true;
    let service = Arc::new(service);

    let store = Arc::new(FakeStore::default());
    store.put(
        "results-bucket",
        "tables/exec-1-manifest.csv",
        "s3://results-bucket/tables/exec-1/part-0.gz\n",
    );
    store.put(
        "results-bucket",
        "tables/exec-1/part-0.gz",
        gzip("1\u{1}2\n"),
    );

    let connection = connect(config(ResultMode::GzipDownload), service.clone(), store).await;
    let err = connection.query("SELECT * FROM fixtures").await.unwrap_err();
    assert!(matches!(
        err,
        AthenaError::Retrieval(RetrievalError::Metadata(_))
    ));

    // No cursor was returned, yet the temporary table was still dropped.
    let submissions = service.submissions();
    assert_eq!(submissions.len(), 2);
    assert!(submissions[1].sql.starts_with("DROP TABLE tmp_ctas_"));
}

#[tokio::test]
async fn ctas_download_failure_fails_construction() {
    let service = Arc::new(FakeAthena::default());
    service.set_table_columns(vec![TableColumn {
        name: "a".to_owned(),
        type_name: Some("int".to_owned()),
    }]);
    // No manifest object in the store.
    let store = Arc::new(FakeStore::default());

    let connection = connect(config(ResultMode::GzipDownload), service, store).await;
    let err = connection.query("SELECT 1").await.unwrap_err();
    assert!(matches!(
        err,
        AthenaError::Retrieval(RetrievalError::Download(_))
    ));
}

#[tokio::test]
async fn non_select_statements_are_forced_to_api_mode() {
    let service = Arc::new(FakeAthena::with_page(ResultPage::default()));
    let store = Arc::new(FakeStore::default());

    let connection = connect(config(ResultMode::GzipDownload), service.clone(), store).await;
    connection
        .execute("INSERT INTO t VALUES (1)")
        .await
        .unwrap();

    // No CTAS wrapping, no DROP: the statement ran as-is through the API.
    let submissions = service.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].sql, "INSERT INTO t VALUES (1)");
}

#[tokio::test]
async fn empty_output_location_is_resolved_from_workgroup_once() {
    let mut service = FakeAthena::with_page(ResultPage {
        columns: vec![ColumnDesc {
            name: "a".to_owned(),
            type_name: "integer".to_owned(),
        }],
        rows: Vec::new(),
        next_token: None,
    });
    service.workgroup_location = Some("s3://wg-bucket/results".to_owned());
    let service = Arc::new(service);

    let store = Arc::new(FakeStore::default());
    store.put("wg-bucket", "results/exec-1.csv", "\"a\"\n\"7\"");

    let mut config = Config::new("testdb");
    config.result_mode = ResultMode::Download;

    let connection = connect(config, service.clone(), store).await;
    let mut rows = connection.query("SELECT a FROM t").await.unwrap();
    let row = rows.next_row().await.unwrap().unwrap();
    assert_eq!(row, vec![Value::Int(7)]);

    // Resolved at connect time and cached; the query did not look it up again.
    assert_eq!(*service.workgroup_lookups.lock().unwrap(), 1);
    assert_eq!(service.submissions()[0].output_location, "s3://wg-bucket/results");
}

#[tokio::test]
async fn prepared_statement_lifecycle() {
    let service = Arc::new(FakeAthena::with_page(ResultPage {
        columns: vec![
            ColumnDesc {
                name: "a".to_owned(),
                type_name: "integer".to_owned(),
            },
            ColumnDesc {
                name: "b".to_owned(),
                type_name: "varchar".to_owned(),
            },
        ],
        rows: vec![
            vec![Some("a".to_owned()), Some("b".to_owned())],
            vec![Some("1".to_owned()), Some("x".to_owned())],
        ],
        next_token: None,
    }));
    let store = Arc::new(FakeStore::default());

    let connection = connect(config(ResultMode::Api), service.clone(), store).await;
    let mut statement = connection
        .prepare("SELECT * FROM t WHERE a=? AND b=?")
        .await
        .unwrap();
    assert_eq!(statement.param_count(), 2);

    let mut rows = statement
        .query(&[Param::from(1i32), Param::from("x")])
        .await
        .unwrap();
    let row = rows.next_row().await.unwrap().unwrap();
    assert_eq!(row, vec![Value::Int(1), Value::Text("x".to_owned())]);

    statement.close().await.unwrap();
    // Second close is a no-op.
    statement.close().await.unwrap();

    let submissions = service.submissions();
    assert_eq!(submissions.len(), 3);
    assert!(submissions[0].sql.starts_with("PREPARE tmp_prepare_"));
    assert!(submissions[0]
        .sql
        .ends_with("FROM SELECT * FROM t WHERE a=? AND b=?"));
    assert!(submissions[1].sql.starts_with("EXECUTE tmp_prepare_"));
    assert!(submissions[1].sql.ends_with("USING 1,'x'"));
    assert!(submissions[2].sql.starts_with("DEALLOCATE PREPARE tmp_prepare_"));
}

#[tokio::test]
async fn prepared_statement_numeric_string_forcing() {
    let service = Arc::new(FakeAthena::with_page(ResultPage::default()));
    let store = Arc::new(FakeStore::default());

    let connection = connect(config(ResultMode::Api), service.clone(), store).await;
    let statement = connection
        .prepare("SELECT * FROM t WHERE s=?")
        .await
        .unwrap();

    // Default: a numeric-looking string renders bare.
    statement
        .execute(&[Param::from("123.456")])
        .await
        .unwrap();
    // Opt out: the same value stays a quoted string.
    statement
        .execute_with(
            &[Param::from("123.456")],
            &QueryOptions::new().force_numeric_string(true),
        )
        .await
        .unwrap();

    let submissions = service.submissions();
    assert!(submissions[1].sql.ends_with("USING 123.456"));
    assert!(submissions[2].sql.ends_with("USING '123.456'"));
}

#[tokio::test]
async fn failed_execution_surfaces_remote_reason() {
    struct FailingService(FakeAthena);

    #[async_trait]
    impl QueryService for FailingService {
        async fn start_query_execution(&self, query: StartQuery) -> Result<String, ClientError> {
            self.0.start_query_execution(query).await
        }
        async fn get_query_execution(
            &self,
            _execution_id: &str,
        ) -> Result<ExecutionStatus, ClientError> {
            Ok(ExecutionStatus {
                state: ExecutionState::Failed,
                reason: Some("SYNTAX_ERROR: line 1:8".to_owned()),
            })
        }
        async fn stop_query_execution(&self, id: &str) -> Result<(), ClientError> {
            self.0.stop_query_execution(id).await
        }
        async fn get_query_results(
            &self,
            id: &str,
            token: Option<&str>,
            max: Option<i32>,
        ) -> Result<ResultPage, ClientError> {
            self.0.get_query_results(id, token, max).await
        }
        async fn get_table_metadata(
            &self,
            catalog: &str,
            database: &str,
            table: &str,
        ) -> Result<Vec<TableColumn>, ClientError> {
            self.0.get_table_metadata(catalog, database, table).await
        }
        async fn work_group_output_location(&self, wg: &str) -> Result<String, ClientError> {
            self.0.work_group_output_location(wg).await
        }
    }

    let service = Arc::new(FailingService(FakeAthena::default()));
    let store = Arc::new(FakeStore::default());

    let connection = connect(config(ResultMode::Api), service, store).await;
    let err = connection.query("SELECT broken").await.unwrap_err();
    match err {
        AthenaError::Query(athena_driver::QueryError::ExecutionFailed { reason }) => {
            assert_eq!(reason, "SYNTAX_ERROR: line 1:8");
        }
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }
}
