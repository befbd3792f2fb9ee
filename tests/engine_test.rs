mod common;

use cass_stmt::{
    CellValue, ClusterAccess, DriverError, EngineConfig, Encoding, Error, ExecuteRequest,
    KeyQuery, KeyQueryColumnDetails, KeyQueryOptions, RestrictionRule, RetryPolicy, Row,
    RowDetails, SchemaBuilder, StatementEngine,
    schema_builder::{ColumnDefinition, CreateTableOptions},
};
use common::{SpyConnection, files_table};

fn restricted_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.restrictions.enabled = true;
    config.restrictions.rules = vec![
        RestrictionRule::new(r"\bdrop\b", "dropping is not allowed"),
        RestrictionRule::new(r"\bdrop\s+keyspace\b", "dropping keyspaces is not allowed"),
    ];
    config
}

fn file_row(note: &str) -> Row {
    let mut row = Row::new();
    row.insert("owner".into(), CellValue::from("ann"));
    row.insert("digest".into(), CellValue::Bytes(vec![0xbe, 0xef]));
    row.insert("body".into(), CellValue::Bytes(b"payload".to_vec()));
    row.insert("note".into(), CellValue::from(note));
    row
}

fn full_key() -> KeyQuery {
    KeyQuery::new()
        .key("owner", KeyQueryColumnDetails::new("ann"))
        .key("digest", KeyQueryColumnDetails::encoded("0xbeef", Encoding::Hex))
}

#[tokio::test]
async fn denied_statement_never_reaches_connection() {
    let engine = StatementEngine::new(SpyConnection::default(), restricted_config()).unwrap();
    let err = engine
        .execute("DROP KEYSPACE app", &ExecuteRequest::default())
        .await
        .unwrap_err();
    match err {
        Error::StatementNotAllowed { reason, .. } => {
            assert_eq!(reason, "dropping keyspaces is not allowed")
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(engine.connection().calls().is_empty());
}

#[tokio::test]
async fn restrictions_off_lets_statement_through() {
    let mut config = restricted_config();
    config.restrictions.enabled = false;
    let engine = StatementEngine::new(SpyConnection::default(), config).unwrap();
    engine
        .execute("DROP TABLE ks.t", &ExecuteRequest::default())
        .await
        .unwrap();
    assert_eq!(engine.connection().calls().len(), 1);
}

#[tokio::test]
async fn select_is_capped_and_requoted() {
    let config = EngineConfig {
        page_size: 50,
        fetch_size: 20,
        ..EngineConfig::default()
    };
    let engine = StatementEngine::new(SpyConnection::default(), config).unwrap();
    let result = engine
        .execute("SELECT * FROM app.Users LIMIT 7000;", &ExecuteRequest::default())
        .await
        .unwrap();
    assert_eq!(result.statement, "SELECT * FROM \"app\".\"Users\" LIMIT 50");

    engine
        .execute("INSERT INTO app.users (id) VALUES (1)", &ExecuteRequest::default())
        .await
        .unwrap();
    let calls = engine.connection().calls();
    assert_eq!(calls[1].statement, "INSERT INTO \"app\".\"users\" (id) VALUES (1)");
    assert_eq!(calls[0].options.fetch_size, 20);
    assert_eq!(calls[0].options.retry, RetryPolicy::NoRetry);
}

#[tokio::test]
async fn inaccessible_keyspace_fails_before_execution() {
    let engine = StatementEngine::new(SpyConnection::default(), EngineConfig::default()).unwrap();
    let request = ExecuteRequest {
        access: Some(ClusterAccess::shared(["mine"])),
        ..ExecuteRequest::default()
    };
    let err = engine
        .execute("SELECT * FROM theirs.t", &request)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::KeyspaceNotAccessible { keyspace } if keyspace == "theirs"));
    assert!(engine.connection().calls().is_empty());

    engine.execute("SELECT * FROM mine.t", &request).await.unwrap();
    assert_eq!(engine.connection().calls().len(), 1);
}

#[tokio::test]
async fn decode_needs_a_target() {
    let engine = StatementEngine::new(SpyConnection::default(), EngineConfig::default()).unwrap();
    let request = ExecuteRequest {
        decode: Some(KeyQueryOptions::default()),
        ..ExecuteRequest::default()
    };
    let err = engine.execute("SELECT now() FROM system_local", &request).await.unwrap_err();
    assert!(matches!(err, Error::StatementUnparseable { .. }));
}

#[tokio::test]
async fn rows_without_schema_are_an_invariant_violation() {
    let conn = SpyConnection::default().returning(vec![file_row("x")]);
    let engine = StatementEngine::new(conn, EngineConfig::default()).unwrap();
    let request = ExecuteRequest {
        decode: Some(KeyQueryOptions::default()),
        ..ExecuteRequest::default()
    };
    let err = engine.execute("SELECT * FROM ks.files", &request).await.unwrap_err();
    assert!(matches!(err, Error::Invariant(_)));
}

#[tokio::test]
async fn decoded_rows_are_truncated() {
    let long = "n".repeat(200);
    let conn = SpyConnection::with_table(files_table()).returning(vec![file_row(&long)]);
    let engine = StatementEngine::new(conn, EngineConfig::default()).unwrap();
    let request = ExecuteRequest {
        decode: Some(KeyQueryOptions {
            encoding: Some(Encoding::Hex),
            decode_values: false,
        }),
        ..ExecuteRequest::default()
    };
    let result = engine.execute("SELECT * FROM ks.files", &request).await.unwrap();
    let row = &result.rows[0];
    assert_eq!(row["digest"], CellValue::from("0xbeef"));
    assert_eq!(row["note"], CellValue::Text(format!("{}...", "n".repeat(150))));
    assert!(result.truncated_columns.contains("note"));
    assert!(!result.truncated_columns.contains("owner"));
}

#[tokio::test]
async fn driver_errors_are_wrapped() {
    let conn = SpyConnection::default().failing(DriverError::ReadTimeout("1 of 2".into()));
    let engine = StatementEngine::new(conn, EngineConfig::default()).unwrap();
    let err = engine
        .execute("SELECT * FROM ks.t", &ExecuteRequest::default())
        .await
        .unwrap_err();
    match err {
        Error::Query { statement, message } => {
            assert_eq!(statement, "SELECT * FROM \"ks\".\"t\" LIMIT 100");
            assert!(message.contains("read timeout"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn key_operations_submit_generated_statements() {
    let conn = SpyConnection::with_table(files_table()).returning(vec![file_row("hi")]);
    let engine = StatementEngine::new(conn, EngineConfig::default()).unwrap();

    let result = engine
        .select_by_key("ks", "files", &full_key(), false, None)
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert!(!result.rows[0].contains_key("body"));

    let mut fields = RowDetails::new();
    fields.insert("note".into(), KeyQueryColumnDetails::new("changed"));
    engine
        .update_row("ks", "files", &full_key(), &fields, None)
        .await
        .unwrap();
    engine.delete_row("ks", "files", &full_key(), None).await.unwrap();

    let calls = engine.connection().calls();
    assert_eq!(
        calls[0].statement,
        "SELECT \"owner\", \"note\" FROM \"ks\".\"files\" WHERE \"owner\"=? AND \"digest\"=? LIMIT 100"
    );
    assert_eq!(
        calls[1].statement,
        "UPDATE \"ks\".\"files\" SET \"note\"=? WHERE \"owner\"=? AND \"digest\"=?"
    );
    assert_eq!(calls[1].bindings[2].value, CellValue::Bytes(vec![0xbe, 0xef]));
    assert_eq!(
        calls[2].statement,
        "DELETE FROM \"ks\".\"files\" WHERE \"owner\"=? AND \"digest\"=?"
    );
}

#[tokio::test]
async fn incomplete_key_never_reaches_connection() {
    let engine =
        StatementEngine::new(SpyConnection::with_table(files_table()), EngineConfig::default())
            .unwrap();
    let key = KeyQuery::new().key("owner", KeyQueryColumnDetails::new("ann"));
    let err = engine.delete_row("ks", "files", &key, None).await.unwrap_err();
    assert!(matches!(err, Error::PrimaryKeyMissing { .. }));

    let mut row = RowDetails::new();
    row.insert("owner".into(), KeyQueryColumnDetails::new("ann"));
    let err = engine.insert_row("ks", "files", &row, None, None).await.unwrap_err();
    assert!(matches!(err, Error::PrimaryKeyMissing { .. }));
    assert!(engine.connection().calls().is_empty());
}

#[tokio::test]
async fn blob_fetch_returns_bytes() {
    let conn = SpyConnection::with_table(files_table()).returning(vec![file_row("hi")]);
    let engine = StatementEngine::new(conn, EngineConfig::default()).unwrap();
    let bytes = engine
        .fetch_blob("ks", "files", &full_key(), "body", None)
        .await
        .unwrap();
    assert_eq!(bytes, Some(b"payload".to_vec()));

    let err = engine
        .fetch_blob("ks", "files", &full_key(), "note", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IncorrectColumnType { .. }));
}

#[tokio::test]
async fn ddl_failures_are_typed() {
    let conn = SpyConnection::default().failing(DriverError::Server("already exists".into()));
    let engine = StatementEngine::new(conn, EngineConfig::default()).unwrap();
    let opts = CreateTableOptions {
        keyspace: "ks".into(),
        table: "t".into(),
        partition_columns: vec![ColumnDefinition {
            name: "id".into(),
            native_type: "int".into(),
        }],
        clustering_columns: vec![],
        static_columns: vec![],
        columns: vec![],
        options: Default::default(),
    };
    let err = engine
        .create_table(&SchemaBuilder::for_release_version("3.11.4"), &opts, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TableCreation { reason, .. } if reason == "already exists"));

    let err = engine.drop_table("ks", "t", None).await.unwrap_err();
    assert!(matches!(err, Error::TableDrop { .. }));
    let err = engine.truncate_table("ks", "t", None).await.unwrap_err();
    assert!(matches!(err, Error::TableTruncate { .. }));

    let calls = engine.connection().calls();
    assert_eq!(calls[1].statement, "DROP TABLE \"ks\".\"t\"");
    assert_eq!(calls[2].statement, "TRUNCATE \"ks\".\"t\"");
}

#[tokio::test]
async fn create_table_rejects_collection_keys_before_execution() {
    let engine = StatementEngine::new(SpyConnection::default(), EngineConfig::default()).unwrap();
    let opts = CreateTableOptions {
        keyspace: "ks".into(),
        table: "t".into(),
        partition_columns: vec![ColumnDefinition {
            name: "id".into(),
            native_type: "list<int>".into(),
        }],
        clustering_columns: vec![],
        static_columns: vec![],
        columns: vec![],
        options: Default::default(),
    };
    let err = engine
        .create_table(&SchemaBuilder::for_release_version("2.1"), &opts, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchemaValidation(_)));
    assert!(engine.connection().calls().is_empty());
}

#[tokio::test]
async fn key_values_are_never_truncated() {
    let long = "o".repeat(200);
    let mut row = file_row(&long);
    row.insert("owner".into(), CellValue::from(long.as_str()));

    let conn = SpyConnection::with_table(files_table()).returning(vec![row.clone()]);
    let engine = StatementEngine::new(conn, EngineConfig::default()).unwrap();
    let result = engine
        .execute("SELECT owner, note FROM ks.files", &ExecuteRequest::default())
        .await
        .unwrap();
    assert_eq!(result.rows[0]["owner"], CellValue::from(long.as_str()));
    assert!(!result.truncated_columns.contains("owner"));
    assert!(result.truncated_columns.contains("note"));

    let unknown = SpyConnection::default().returning(vec![row]);
    let engine = StatementEngine::new(unknown, EngineConfig::default()).unwrap();
    let result = engine
        .execute("SELECT owner, note FROM ks.files", &ExecuteRequest::default())
        .await
        .unwrap();
    assert_eq!(result.rows[0]["owner"], CellValue::from(long.as_str()));
    assert!(result.truncated_columns.is_empty());
}

#[tokio::test]
async fn batch_checks_every_keyspace() {
    let engine = StatementEngine::new(SpyConnection::default(), EngineConfig::default()).unwrap();
    let request = ExecuteRequest {
        access: Some(ClusterAccess::shared(["mine"])),
        ..ExecuteRequest::default()
    };
    let batch = "BEGIN BATCH INSERT INTO mine.t (a) VALUES (1); DELETE FROM theirs.t WHERE a = 2; APPLY BATCH";
    let err = engine.execute(batch, &request).await.unwrap_err();
    assert!(matches!(err, Error::KeyspaceNotAccessible { keyspace } if keyspace == "theirs"));
    assert!(engine.connection().calls().is_empty());
}
