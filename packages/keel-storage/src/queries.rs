use serde_json::Value;

use crate::{Error, Result, db::Db, models::CallRecord};

const UNIQUE_VIOLATION: &str = "23505";

/// Inserts the raw record with `assessment` and `status` NULL. A duplicate
/// identifier maps to [`Error::Conflict`] so the caller can regenerate.
pub async fn insert_call(db: &Db, record: &CallRecord) -> Result<()> {
	let result = sqlx::query(
		"\
INSERT INTO call_analyses (call_id, call_timestamp, payload, summary, audit_thread_id, created_at)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(record.call_id.as_str())
	.bind(record.call_timestamp)
	.bind(&record.payload)
	.bind(record.summary.as_str())
	.bind(record.audit_thread_id.as_deref())
	.bind(record.created_at)
	.execute(&db.pool)
	.await;

	match result {
		Ok(_) => Ok(()),
		Err(sqlx::Error::Database(err)) if err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
			Err(Error::Conflict(format!("call_id {} already exists", record.call_id))),
		Err(err) => Err(err.into()),
	}
}

pub async fn fetch_call(db: &Db, call_id: &str) -> Result<Option<CallRecord>> {
	let record = sqlx::query_as::<_, CallRecord>(
		"\
SELECT call_id, call_timestamp, payload, summary, assessment, status, audit_thread_id, created_at
FROM call_analyses
WHERE call_id = $1",
	)
	.bind(call_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(record)
}

/// Writes the assessment and its derived status in one statement. Re-writing
/// the same value is a success, not an error.
pub async fn set_assessment(
	db: &Db,
	call_id: &str,
	assessment: &Value,
	status: &str,
) -> Result<()> {
	let result = sqlx::query(
		"\
UPDATE call_analyses
SET assessment = $2, status = $3
WHERE call_id = $1",
	)
	.bind(call_id)
	.bind(assessment)
	.bind(status)
	.execute(&db.pool)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("call_id {call_id} does not exist")));
	}

	Ok(())
}

pub async fn set_audit_thread(db: &Db, call_id: &str, thread_id: &str) -> Result<()> {
	sqlx::query("UPDATE call_analyses SET audit_thread_id = $2 WHERE call_id = $1")
		.bind(call_id)
		.bind(thread_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn update_status(db: &Db, call_id: &str, status: &str) -> Result<()> {
	let result = sqlx::query("UPDATE call_analyses SET status = $2 WHERE call_id = $1")
		.bind(call_id)
		.bind(status)
		.execute(&db.pool)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("call_id {call_id} does not exist")));
	}

	Ok(())
}

pub async fn recent_calls(db: &Db, limit: i64) -> Result<Vec<CallRecord>> {
	let records = sqlx::query_as::<_, CallRecord>(
		"\
SELECT call_id, call_timestamp, payload, summary, assessment, status, audit_thread_id, created_at
FROM call_analyses
ORDER BY call_timestamp DESC
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(records)
}
