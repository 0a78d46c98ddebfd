use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::info;

use crate::{Error, KeelService, Result};
use keel_domain::CallStatus;
use keel_storage::models::CallRecord;

/// A stored record as returned to callers, verbatim.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallView {
	pub call_id: String,
	#[serde(with = "crate::time_serde")]
	pub call_timestamp: OffsetDateTime,
	pub payload: Value,
	pub summary: String,
	pub assessment: Option<Value>,
	pub status: Option<CallStatus>,
	pub audit_thread_id: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}

impl From<CallRecord> for CallView {
	fn from(record: CallRecord) -> Self {
		let status = record
			.status
			.as_deref()
			.and_then(|raw| serde_json::from_value(Value::String(raw.to_string())).ok());

		Self {
			call_id: record.call_id,
			call_timestamp: record.call_timestamp,
			payload: record.payload,
			summary: record.summary,
			assessment: record.assessment,
			status,
			audit_thread_id: record.audit_thread_id,
			created_at: record.created_at,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
	pub call_id: String,
	pub status: CallStatus,
}

impl KeelService {
	pub async fn get_call(&self, call_id: &str) -> Result<CallView> {
		let record = self.deps.records.fetch(call_id).await?;

		record
			.map(CallView::from)
			.ok_or_else(|| Error::NotFound { message: format!("call_id {call_id} is unknown") })
	}

	/// Externally triggered status advance. The value is restricted to the
	/// closed enum by typed deserialization; re-applying the current status
	/// is an idempotent success.
	pub async fn update_status(
		&self,
		call_id: &str,
		status: CallStatus,
	) -> Result<StatusUpdateResponse> {
		self.deps.records.update_status(call_id, status.as_str()).await?;

		info!(%call_id, status = status.as_str(), "Status updated.");

		Ok(StatusUpdateResponse { call_id: call_id.to_string(), status })
	}

	/// The full audit trail for a call, fetched from the trace service.
	/// Available only when the audit channel is configured and the record
	/// carries a thread reference.
	pub async fn get_audit_trail(&self, call_id: &str) -> Result<Value> {
		let record = self.deps.records.fetch(call_id).await?;
		let record = record
			.ok_or_else(|| Error::NotFound { message: format!("call_id {call_id} is unknown") })?;
		let thread_id = record.audit_thread_id.ok_or_else(|| Error::NotFound {
			message: format!("call_id {call_id} has no audit thread"),
		})?;
		let audit = self.deps.audit.as_ref().ok_or_else(|| Error::NotFound {
			message: "the audit channel is not configured".to_string(),
		})?;

		Ok(audit.fetch(&thread_id).await?)
	}
}
