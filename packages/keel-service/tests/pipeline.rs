use std::{sync::Arc, time::Duration};

use keel_domain::{CallStatus, KnowledgeCategory, RecommendedAction, RiskLabel};
use keel_service::{Error, KeelService};
use keel_testkit::{
	Fakes, MemoryKnowledge, ScriptedGeneration, StubEmbedding, benign_payload, knowledge_doc,
	risky_payload, test_config, unit_x,
};

fn assessment_reply(action: &str, matched: &[&str]) -> String {
	serde_json::json!({
		"grounded_assessment": "high_risk",
		"explanation": "Signals align with a fraud-adjacent pattern and require verification.",
		"recommended_action": action,
		"confidence": 0.82,
		"regulatory_flags": [],
		"matched_patterns": matched,
	})
	.to_string()
}

fn seed_default_knowledge(knowledge: &MemoryKnowledge) {
	knowledge.seed(
		knowledge_doc("fp_001", KnowledgeCategory::FraudPattern, "Coached promise"),
		unit_x(),
	);
	knowledge.seed(
		knowledge_doc("cr_001", KnowledgeCategory::Compliance, "Verification before clearance"),
		vec![0.6, 0.8, 0.0, 0.0],
	);
}

#[tokio::test]
async fn high_risk_scenario_escalates_with_cited_patterns() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![assessment_reply(
			"escalate_to_compliance",
			&["Coached promise"],
		)])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service.analyze_call(risky_payload()).await.unwrap();

	assert!(matches!(
		response.assessment.recommended_action,
		RecommendedAction::ManualReview | RecommendedAction::EscalateToCompliance
	));
	assert_eq!(response.assessment.matched_patterns, vec!["Coached promise".to_string()]);
	assert_eq!(response.status, CallStatus::Escalated);
	assert!((0.0..=1.0).contains(&response.assessment.confidence));

	// The returned identifier resolves to exactly one stored record.
	let stored = service.get_call(&response.call_id).await.unwrap();

	assert_eq!(stored.status, Some(CallStatus::Escalated));
	assert!(stored.assessment.is_some());
	assert_eq!(fakes.records.len(), 1);
}

#[tokio::test]
async fn auto_clear_resolves_the_record() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![assessment_reply(
			"auto_clear",
			&[],
		)])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service.analyze_call(benign_payload()).await.unwrap();

	assert_eq!(response.status, CallStatus::Resolved);
}

#[tokio::test]
async fn invalid_payload_is_rejected_without_side_effects() {
	let fakes = Fakes::new();
	let service = KeelService::with_deps(test_config(), fakes.deps());
	let mut payload = risky_payload();
	payload.nlp_insights.intent.confidence = 1.4;
	payload.summary_for_rag = "short".to_string();

	let err = service.analyze_call(payload).await.unwrap_err();

	match err {
		Error::InvalidRequest { fields, .. } => {
			assert!(fields.contains(&"nlp_insights.intent.confidence".to_string()));
			assert!(fields.contains(&"summary_for_rag".to_string()));
		},
		other => panic!("expected InvalidRequest, got {other:?}"),
	}

	assert!(fakes.records.is_empty());
	assert_eq!(fakes.embedding.call_count(), 0);
}

#[tokio::test]
async fn empty_knowledge_base_is_not_ready_before_any_generation() {
	let fakes = Fakes::new();
	let service = KeelService::with_deps(test_config(), fakes.deps());

	let err = service.analyze_call(risky_payload()).await.unwrap_err();

	assert!(matches!(err, Error::NotReady));
	assert!(fakes.records.is_empty());
	assert_eq!(fakes.generation.call_count(), 0);
}

#[tokio::test]
async fn embedding_retries_exactly_once_and_stores_one_vector() {
	let fakes = Fakes {
		embedding: Arc::new(StubEmbedding::failing_first(unit_x(), 1)),
		generation: Arc::new(ScriptedGeneration::replying(vec![assessment_reply(
			"manual_review",
			&["Coached promise"],
		)])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service.analyze_call(risky_payload()).await.unwrap();

	assert_eq!(response.assessment.recommended_action, RecommendedAction::ManualReview);
	assert_eq!(fakes.embedding.call_count(), 2);
	assert_eq!(fakes.calls.stored_ids(), vec![response.call_id]);
}

#[tokio::test]
async fn embedding_failing_twice_degrades_to_the_fallback() {
	let fakes = Fakes {
		embedding: Arc::new(StubEmbedding::failing_first(unit_x(), 2)),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service.analyze_call(risky_payload()).await.unwrap();

	assert_eq!(response.assessment.recommended_action, RecommendedAction::ManualReview);
	assert_eq!(response.assessment.confidence, 0.0);
	assert!(response.assessment.matched_patterns.is_empty());
	assert_eq!(response.status, CallStatus::InReview);
	assert_eq!(fakes.generation.call_count(), 0);

	// The record still reached a terminal result.
	let stored = fakes.records.get(&response.call_id).unwrap();

	assert!(stored.assessment.is_some());
}

#[tokio::test]
async fn reasoner_retries_once_on_contract_violation() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![
			"this is not json".to_string(),
			assessment_reply("flag_for_review", &["Coached promise"]),
		])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service.analyze_call(risky_payload()).await.unwrap();

	assert_eq!(response.assessment.recommended_action, RecommendedAction::FlagForReview);
	assert_eq!(response.status, CallStatus::InReview);
	assert_eq!(fakes.generation.call_count(), 2);
}

#[tokio::test]
async fn invented_citations_never_survive() {
	let invented = assessment_reply("flag_for_review", &["Invented pattern"]);
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![invented.clone(), invented])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service.analyze_call(risky_payload()).await.unwrap();

	// Both attempts cited unseen evidence, so the fallback wins.
	assert_eq!(response.assessment.recommended_action, RecommendedAction::ManualReview);
	assert!(response.assessment.matched_patterns.is_empty());
	assert_eq!(fakes.generation.call_count(), 2);
}

#[tokio::test]
async fn category_timeouts_degrade_to_empty_evidence_and_still_complete() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![assessment_reply(
			"manual_review",
			&[],
		)])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);
	// Slower than retrieval.category_timeout_ms in the test config.
	fakes.knowledge.set_delay(Some(Duration::from_millis(500)));

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service.analyze_call(risky_payload()).await.unwrap();

	assert_eq!(response.assessment.grounded_assessment, RiskLabel::HighRisk);
	assert!(response.assessment.matched_patterns.is_empty());
	assert_eq!(response.status, CallStatus::InReview);
}

#[tokio::test]
async fn audit_failures_are_invisible_to_the_caller() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![assessment_reply(
			"manual_review",
			&["Coached promise"],
		)])),
		audit: Arc::new(keel_testkit::RecordingAudit::failing()),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps_with_audit());
	let response = service.analyze_call(risky_payload()).await.unwrap();

	assert!(response.audit_thread_id.is_none());
	assert_eq!(response.assessment.recommended_action, RecommendedAction::ManualReview);
}

#[tokio::test]
async fn audit_channel_traces_every_stage() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![assessment_reply(
			"manual_review",
			&["Coached promise"],
		)])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps_with_audit());
	let response = service.analyze_call(risky_payload()).await.unwrap();
	let thread_id = response.audit_thread_id.clone().unwrap();

	// Appends are detached; wait for them to land.
	let mut labels = vec![];
	for _ in 0..50 {
		labels = fakes
			.audit
			.events()
			.into_iter()
			.filter(|(thread, _, _)| thread == &thread_id)
			.map(|(_, label, _)| label)
			.collect();

		if labels.len() >= 3 {
			break;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	assert!(labels.contains(&"signals".to_string()));
	assert!(labels.contains(&"context".to_string()));
	assert!(labels.contains(&"assessment".to_string()));

	let trail = service.get_audit_trail(&response.call_id).await.unwrap();

	assert_eq!(trail["thread_id"], serde_json::json!(thread_id));
}

#[tokio::test]
async fn status_updates_are_restricted_and_idempotent() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![assessment_reply(
			"manual_review",
			&[],
		)])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service.analyze_call(risky_payload()).await.unwrap();

	let updated = service.update_status(&response.call_id, CallStatus::Resolved).await.unwrap();

	assert_eq!(updated.status, CallStatus::Resolved);

	// Re-applying the same value succeeds.
	service.update_status(&response.call_id, CallStatus::Resolved).await.unwrap();

	let err = service.update_status("call_2026_01_01_ffffff", CallStatus::Resolved).await;

	assert!(matches!(err, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn fetch_unknown_call_is_not_found() {
	let fakes = Fakes::new();
	let service = KeelService::with_deps(test_config(), fakes.deps());

	assert!(matches!(
		service.get_call("call_2026_01_01_aaaaaa").await,
		Err(Error::NotFound { .. })
	));
}
