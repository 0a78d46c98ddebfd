use std::fmt::Write;

use serde_json::Value;

use crate::chat::CallEvidence;
use keel_domain::ConversationTurn;
use keel_storage::models::RetrievedDoc;

/// Assembles the question-answering context: retrieved knowledge, matched
/// call analyses, the (already truncated) conversation history, and the
/// current question, in that fixed order. Empty sections are omitted.
pub(crate) fn build_chat_context(
	question: &str,
	knowledge_docs: &[RetrievedDoc],
	calls: &[CallEvidence],
	history: &[ConversationTurn],
) -> String {
	let mut sections = Vec::new();

	if !knowledge_docs.is_empty() {
		let mut out = "=== RETRIEVED KNOWLEDGE ===".to_string();

		for (index, doc) in knowledge_docs.iter().enumerate() {
			let _ = write!(
				out,
				"\n[{}] ({}, sim={:.2}) [{}] {}\n    {}",
				index + 1,
				doc.category,
				doc.similarity,
				doc.doc_id,
				doc.title,
				doc.content
			);
		}

		sections.push(out);
	}

	if !calls.is_empty() {
		let mut out = "=== MATCHED CALL ANALYSES ===".to_string();

		for (index, call) in calls.iter().enumerate() {
			match call {
				CallEvidence::Hit(hit) => {
					let _ = write!(
						out,
						"\n[{}] {} | risk={} | fraud={} | sim={:.2}\n    Summary: {}",
						index + 1,
						hit.call_id,
						hit.risk_score,
						hit.fraud_likelihood,
						hit.similarity,
						hit.summary
					);
				},
				CallEvidence::Direct(record) => {
					let risk = record
						.payload
						.pointer("/risk_assessment/risk_score")
						.and_then(Value::as_i64)
						.map(|score| score.to_string())
						.unwrap_or_else(|| "?".to_string());
					let status = record.status.as_deref().unwrap_or("pending");

					let _ = write!(
						out,
						"\n[{}] {} | risk={risk} | status={status} [DIRECT LOOKUP]\n    Summary: {}",
						index + 1,
						record.call_id,
						record.summary
					);

					if let Some(assessment) = &record.assessment {
						append_assessment_details(&mut out, assessment);
					}
				},
			}
		}

		sections.push(out);
	}

	if !history.is_empty() {
		let mut out = "=== CONVERSATION HISTORY ===".to_string();

		for turn in history {
			let _ = write!(out, "\n{}: {}", turn.role.display_name(), turn.content);
		}

		sections.push(out);
	}

	sections.push(format!("=== CURRENT QUESTION ===\n{question}"));

	sections.join("\n\n")
}

/// Direct lookups carry the full stored assessment, so the reasoner can
/// answer follow-ups about explanation, action, and matched patterns.
fn append_assessment_details(out: &mut String, assessment: &Value) {
	if let Some(explanation) = assessment.get("explanation").and_then(Value::as_str) {
		let _ = write!(out, "\n    Explanation: {explanation}");
	}
	if let Some(action) = assessment.get("recommended_action").and_then(Value::as_str) {
		let _ = write!(out, "\n    Action: {action}");
	}
	if let Some(confidence) = assessment.get("confidence").and_then(Value::as_f64) {
		let _ = write!(out, "\n    Confidence: {confidence:.2}");
	}
	if let Some(patterns) = assessment.get("matched_patterns").and_then(Value::as_array) {
		let titles: Vec<&str> = patterns.iter().filter_map(Value::as_str).collect();

		if !titles.is_empty() {
			let _ = write!(out, "\n    Matched Patterns: {}", titles.join(", "));
		}
	}
}
