use kazi_core::db::migrations::latest_version;
use kazi_core::db::{open_db, open_db_in_memory, open_db_with, DbError, OpenOptions};
use rusqlite::Connection;
use std::time::Duration;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "main_code_sequence");
    assert_table_exists(&conn, "main_codes");
    assert_table_exists(&conn, "artifacts");
    assert_index_exists(&conn, "idx_artifacts_artifact_date");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kazi.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "main_codes");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn connections_enforce_foreign_keys_and_busy_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kazi.sqlite3");
    let options = OpenOptions {
        busy_timeout: Duration::from_millis(1234),
    };
    let conn = open_db_with(&path, options).unwrap();

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
    assert_eq!(busy_timeout, 1234);
}

#[test]
fn schema_rejects_malformed_codes_and_duplicate_artifact_numbers() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO main_codes (id, code, finding_place) VALUES ('m1', 'AAA', 'Trench 1');",
        [],
    )
    .unwrap();

    assert!(conn
        .execute(
            "INSERT INTO main_codes (id, code, finding_place) VALUES ('m2', 'aaa', 'Trench 1');",
            [],
        )
        .is_err());
    assert!(conn
        .execute(
            "INSERT INTO main_codes (id, code, finding_place) VALUES ('m3', 'AAAA', 'Trench 1');",
            [],
        )
        .is_err());
    for code in ["A1A", "A A", "ÄAA"] {
        assert!(
            conn.execute(
                "INSERT INTO main_codes (id, code, finding_place) VALUES ('m4', ?1, 'Trench 1');",
                [code],
            )
            .is_err(),
            "{code:?} should violate the code CHECK"
        );
    }

    conn.execute(
        "INSERT INTO artifacts (id, main_code_id, artifact_no, artifact_date)
         VALUES ('a1', 'm1', 1, '2024-07-14');",
        [],
    )
    .unwrap();
    let duplicate = conn.execute(
        "INSERT INTO artifacts (id, main_code_id, artifact_no, artifact_date)
         VALUES ('a2', 'm1', 1, '2024-07-15');",
        [],
    );
    assert!(duplicate.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert_master_entry(conn, "table", table_name);
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    assert_master_entry(conn, "index", index_name);
}

fn assert_master_entry(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} {name} does not exist");
}
