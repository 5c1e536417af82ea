//! Row-level access to the `document_jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw `document_jobs` row. Typed interpretation lives in `crate::ledger`.
#[derive(Debug, Clone, Default)]
pub struct JobRow {
    pub id: String,
    pub filename: String,
    pub status: String,
    pub size_bytes: i64,
    pub mime: String,
    pub page_count: Option<i64>,
    pub doc_type_guess: Option<String>,
    pub linked_building_id: Option<String>,
    pub linked_unit_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub ocr_artifact_url: Option<String>,
    pub extracted_text: Option<String>,
    pub extracted_json: Option<String>,
    pub summary_json: Option<String>,
    pub token_usage: Option<i64>,
    pub latency_ms: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub user_id: String,
    pub agency_id: Option<String>,
    pub file_hash: Option<String>,
    pub correlation_id: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            status: row.get("status")?,
            size_bytes: row.get("size_bytes")?,
            mime: row.get("mime")?,
            page_count: row.get("page_count")?,
            doc_type_guess: row.get("doc_type_guess")?,
            linked_building_id: row.get("linked_building_id")?,
            linked_unit_id: row.get("linked_unit_id")?,
            error_code: row.get("error_code")?,
            error_message: row.get("error_message")?,
            ocr_artifact_url: row.get("ocr_artifact_url")?,
            extracted_text: row.get("extracted_text")?,
            extracted_json: row.get("extracted_json")?,
            summary_json: row.get("summary_json")?,
            token_usage: row.get("token_usage")?,
            latency_ms: row.get("latency_ms")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            user_id: row.get("user_id")?,
            agency_id: row.get("agency_id")?,
            file_hash: row.get("file_hash")?,
            correlation_id: row.get("correlation_id")?,
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<String>,
    pub exclude_status: Option<String>,
    pub user_id: Option<String>,
    pub agency_id: Option<String>,
    pub file_hash: Option<String>,
    /// Inclusive RFC 3339 bounds on `created_at`.
    pub created_from: Option<String>,
    pub created_to: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO document_jobs (id, filename, status, size_bytes, mime, page_count,
             doc_type_guess, linked_building_id, linked_unit_id, error_code, error_message,
             ocr_artifact_url, extracted_text, extracted_json, summary_json, token_usage,
             latency_ms, created_at, updated_at, user_id, agency_id, file_hash, correlation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
             ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
            params![
                job.id,
                job.filename,
                job.status,
                job.size_bytes,
                job.mime,
                job.page_count,
                job.doc_type_guess,
                job.linked_building_id,
                job.linked_unit_id,
                job.error_code,
                job.error_message,
                job.ocr_artifact_url,
                job.extracted_text,
                job.extracted_json,
                job.summary_json,
                job.token_usage,
                job.latency_ms,
                job.created_at,
                job.updated_at,
                job.user_id,
                job.agency_id,
                job.file_hash,
                job.correlation_id,
            ],
        )?;
        Ok(())
    })
}

/// Overwrites every mutable column. `id`, `created_at` and ownership are fixed
/// at insert time. Returns the number of rows touched (0 or 1).
pub fn update(db: &Database, job: &JobRow) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE document_jobs SET filename=?2, status=?3, size_bytes=?4, mime=?5,
             page_count=?6, doc_type_guess=?7, linked_building_id=?8, linked_unit_id=?9,
             error_code=?10, error_message=?11, ocr_artifact_url=?12, extracted_text=?13,
             extracted_json=?14, summary_json=?15, token_usage=?16, latency_ms=?17,
             updated_at=?18, file_hash=?19, correlation_id=?20
             WHERE id=?1",
            params![
                job.id,
                job.filename,
                job.status,
                job.size_bytes,
                job.mime,
                job.page_count,
                job.doc_type_guess,
                job.linked_building_id,
                job.linked_unit_id,
                job.error_code,
                job.error_message,
                job.ocr_artifact_url,
                job.extracted_text,
                job.extracted_json,
                job.summary_json,
                job.token_usage,
                job.latency_ms,
                job.updated_at,
                job.file_hash,
                job.correlation_id,
            ],
        )?;
        Ok(changed)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM document_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Filtered, paginated listing, newest first. Returns (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        let mut push = |clause: &str, value: &Option<String>| {
            if let Some(value) = value {
                conditions.push(format!("{} ?{}", clause, param_values.len() + 1));
                param_values.push(Box::new(value.clone()));
            }
        };
        push("status =", &filter.status);
        push("status !=", &filter.exclude_status);
        push("user_id =", &filter.user_id);
        push("agency_id =", &filter.agency_id);
        push("file_hash =", &filter.file_hash);
        push("created_at >=", &filter.created_from);
        push("created_at <=", &filter.created_to);

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM document_jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM document_jobs {} ORDER BY created_at DESC, id ASC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM document_jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
