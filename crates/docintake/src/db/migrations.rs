//! Ordered schema steps for the job ledger.
//!
//! Applied steps are recorded in `schema_migrations` together with a SHA-256
//! of their SQL. Editing a step after it shipped is refused at open time.

use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use super::error::DatabaseError;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
    /// Column this step adds; the SQL is skipped when it already exists.
    adds_column: Option<(&'static str, &'static str)>,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "create_document_jobs",
        sql: include_str!("sql/001_create_document_jobs.sql"),
        adds_column: None,
    },
    Step {
        version: 2,
        name: "add_file_hash",
        sql: include_str!("sql/002_add_file_hash.sql"),
        adds_column: Some(("document_jobs", "file_hash")),
    },
    Step {
        version: 3,
        name: "add_correlation_id",
        sql: include_str!("sql/003_add_correlation_id.sql"),
        adds_column: Some(("document_jobs", "correlation_id")),
    },
];

const BOOKKEEPING: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    name       TEXT NOT NULL,
    checksum   TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

fn checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// Brings the schema up to date. Each step runs in its own transaction.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(BOOKKEEPING)?;

    for step in STEPS {
        let expected = checksum(step.sql);
        let recorded: Option<String> = conn
            .query_row(
                "SELECT checksum FROM schema_migrations WHERE version = ?1",
                [step.version],
                |r| r.get(0),
            )
            .optional()?;

        match recorded {
            Some(found) if found == expected => continue,
            Some(found) => {
                return Err(DatabaseError::ChecksumMismatch {
                    version: step.version,
                    expected,
                    found,
                })
            }
            None => {}
        }

        let tx = conn.unchecked_transaction()?;
        let present = match step.adds_column {
            Some((table, column)) => has_column(&tx, table, column)?,
            None => false,
        };
        if present {
            log::info!("Schema step {} ({}) already in place", step.version, step.name);
        } else {
            log::info!("Applying schema step {} ({})", step.version, step.name);
            tx.execute_batch(step.sql)
                .map_err(|e| DatabaseError::Migration {
                    version: step.version,
                    reason: e.to_string(),
                })?;
        }
        tx.execute(
            "INSERT INTO schema_migrations (version, name, checksum) VALUES (?1, ?2, ?3)",
            params![step.version, step.name, expected],
        )?;
        tx.commit()?;
    }

    Ok(())
}

pub fn applied_versions(conn: &Connection) -> Result<Vec<u32>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |r| r.get(0))?
        .collect::<Result<Vec<u32>, _>>()?;
    Ok(versions)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
            params![table, column],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        conn
    }

    #[test]
    fn test_fresh_db_records_every_step() {
        let conn = fresh();
        assert_eq!(applied_versions(&conn).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_rerun_is_a_no_op() {
        let conn = fresh();
        run_all(&conn).unwrap();
        assert_eq!(applied_versions(&conn).unwrap().len(), STEPS.len());
    }

    #[test]
    fn test_existing_column_is_not_added_twice() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(include_str!("sql/001_create_document_jobs.sql"))
            .unwrap();
        conn.execute_batch("ALTER TABLE document_jobs ADD COLUMN file_hash TEXT;")
            .unwrap();
        conn.execute_batch(BOOKKEEPING).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, name, checksum) VALUES (1, ?1, ?2)",
            params![STEPS[0].name, checksum(STEPS[0].sql)],
        )
        .unwrap();

        run_all(&conn).unwrap();
        assert!(has_column(&conn, "document_jobs", "file_hash").unwrap());
        assert!(has_column(&conn, "document_jobs", "correlation_id").unwrap());
    }

    #[test]
    fn test_edited_step_is_refused() {
        let conn = fresh();
        conn.execute(
            "UPDATE schema_migrations SET checksum = 'stale' WHERE version = 2",
            [],
        )
        .unwrap();

        match run_all(&conn) {
            Err(DatabaseError::ChecksumMismatch { version, found, .. }) => {
                assert_eq!(version, 2);
                assert_eq!(found, "stale");
            }
            other => panic!("expected checksum mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_document_jobs_has_all_columns() {
        let conn = fresh();
        for column in [
            "id",
            "filename",
            "status",
            "size_bytes",
            "mime",
            "page_count",
            "doc_type_guess",
            "linked_building_id",
            "linked_unit_id",
            "error_code",
            "error_message",
            "ocr_artifact_url",
            "extracted_text",
            "extracted_json",
            "summary_json",
            "token_usage",
            "latency_ms",
            "created_at",
            "updated_at",
            "user_id",
            "agency_id",
            "file_hash",
            "correlation_id",
        ] {
            assert!(
                has_column(&conn, "document_jobs", column).unwrap(),
                "missing column {}",
                column
            );
        }
    }

    #[test]
    fn test_unknown_table_has_no_columns() {
        let conn = fresh();
        assert!(!has_column(&conn, "no_such_table", "id").unwrap());
    }
}
