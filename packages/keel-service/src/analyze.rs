use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{Error, KeelService, Result, context, retrieval};
use keel_domain::{CallRiskInput, CallStatus, FieldViolation, GroundedAssessment, call_id, status};
use keel_storage::models::CallRecord;

const MAX_ID_ATTEMPTS: usize = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
	pub call_id: String,
	#[serde(with = "crate::time_serde")]
	pub call_timestamp: OffsetDateTime,
	pub input_risk_assessment: keel_domain::signal::RiskAssessment,
	pub assessment: GroundedAssessment,
	pub status: CallStatus,
	pub audit_thread_id: Option<String>,
}

impl KeelService {
	/// The analysis pipeline: validate, store the raw record (the commit
	/// point), embed, retrieve, assemble, reason, persist, derive status.
	/// Failures before the commit point surface as errors; everything after
	/// it degrades to the deterministic fallback assessment.
	pub async fn analyze_call(&self, payload: CallRiskInput) -> Result<AnalyzeResponse> {
		payload.validate().map_err(invalid_payload)?;

		if self.deps.knowledge.count().await? == 0 {
			return Err(Error::NotReady);
		}

		let now = OffsetDateTime::now_utc();
		let record = self.store_with_fresh_id(&payload, now).await?;
		let call_id = record.call_id.clone();

		info!(%call_id, "Call record stored.");

		let audit_thread = self.open_audit_thread(&call_id).await;

		if let Some(thread_id) = &audit_thread {
			if let Err(err) = self.deps.records.set_audit_thread(&call_id, thread_id).await {
				warn!(%call_id, %err, "Failed to attach audit thread to record.");
			}

			self.audit_append(
				&audit_thread,
				"signals",
				serde_json::to_string(&payload).unwrap_or_default(),
			);
		}

		let assessment = match self.ground(&call_id, &payload, &audit_thread).await {
			Ok(assessment) => assessment,
			Err(err) => {
				warn!(%call_id, %err, "Grounding degraded to the fallback assessment.");

				GroundedAssessment::fallback()
			},
		};
		let derived = status::initial_status(
			assessment.recommended_action,
			payload.risk_assessment.risk_score,
			&self.cfg.status,
		);
		let assessment_json = serde_json::to_value(&assessment)?;

		self.deps.records.set_assessment(&call_id, &assessment_json, derived.as_str()).await?;

		info!(%call_id, status = derived.as_str(), "Assessment persisted.");

		self.audit_append(&audit_thread, "assessment", assessment_json.to_string());

		Ok(AnalyzeResponse {
			call_id,
			call_timestamp: record.call_timestamp,
			input_risk_assessment: payload.risk_assessment,
			assessment,
			status: derived,
			audit_thread_id: audit_thread,
		})
	}

	/// Embed, retrieve, assemble, reason. Every error that escapes here is
	/// converted to the fallback by the caller; the raw record is already
	/// durable at this point.
	async fn ground(
		&self,
		call_id: &str,
		payload: &CallRiskInput,
		audit_thread: &Option<String>,
	) -> Result<GroundedAssessment> {
		let query_vector = self.embed_with_retry(&payload.summary_for_rag).await?;

		// The stored summary vector feeds historical-call search later; losing
		// it never blocks the assessment.
		if let Err(err) = self
			.deps
			.calls
			.upsert(
				call_id,
				query_vector.clone(),
				&payload.summary_for_rag,
				i64::from(payload.risk_assessment.risk_score),
				payload.risk_assessment.fraud_likelihood.as_str(),
			)
			.await
		{
			warn!(%call_id, %err, "Failed to index the call summary vector.");
		}

		let plans = self.analysis_plans();
		let evidence = self.retrieve_categories(&plans, &query_vector).await;
		let titles = retrieval::shown_titles(&evidence);
		let grounding_context =
			context::build_grounding_context(payload, &evidence, self.cfg.context.max_chars);

		info!(
			%call_id,
			evidence = titles.len(),
			chars = grounding_context.chars().count(),
			"Grounding context assembled."
		);

		self.audit_append(audit_thread, "context", grounding_context.clone());

		Ok(self.run_grounded_reasoning(&grounding_context, &titles).await)
	}

	/// Stores the raw record, regenerating the identifier on a collision.
	/// Once this returns Ok, the record is the pipeline's commit point.
	async fn store_with_fresh_id(
		&self,
		payload: &CallRiskInput,
		now: OffsetDateTime,
	) -> Result<CallRecord> {
		let payload_json = serde_json::to_value(payload)?;

		for _ in 0..MAX_ID_ATTEMPTS {
			let record = CallRecord {
				call_id: call_id::generate(now),
				call_timestamp: now,
				payload: payload_json.clone(),
				summary: payload.summary_for_rag.clone(),
				assessment: None,
				status: None,
				audit_thread_id: None,
				created_at: now,
			};

			match self.deps.records.insert(&record).await {
				Ok(()) => return Ok(record),
				Err(keel_storage::Error::Conflict(message)) => {
					warn!(%message, "Call id collision, regenerating.");
				},
				Err(err) => return Err(err.into()),
			}
		}

		Err(Error::Dependency {
			message: format!("could not allocate a unique call id in {MAX_ID_ATTEMPTS} attempts"),
		})
	}
}

fn invalid_payload(violations: Vec<FieldViolation>) -> Error {
	let fields = violations.iter().map(|violation| violation.field.clone()).collect();
	let message = violations
		.iter()
		.map(|violation| format!("{}: {}", violation.field, violation.message))
		.collect::<Vec<_>>()
		.join("; ");

	Error::InvalidRequest { message, fields }
}
