use std::{sync::Arc, time::Duration};

use time::macros::datetime;

use keel_domain::{ConversationTurn, KnowledgeCategory, TurnRole};
use keel_service::{ChatFilters, ChatRequest, Error, KeelService, SourceType};
use keel_storage::models::CallRecord;
use keel_testkit::{
	Fakes, MemoryKnowledge, ScriptedGeneration, knowledge_doc, test_config, unit_x,
};

fn chat_reply(answer: &str, source_ids: &[&str]) -> String {
	serde_json::json!({ "answer": answer, "source_ids": source_ids }).to_string()
}

fn request(question: &str) -> ChatRequest {
	ChatRequest {
		question: question.to_string(),
		conversation_history: vec![],
		filters: ChatFilters::default(),
	}
}

fn seed_default_knowledge(knowledge: &MemoryKnowledge) {
	knowledge.seed(
		knowledge_doc("fp_001", KnowledgeCategory::FraudPattern, "Coached promise"),
		unit_x(),
	);
	knowledge.seed(
		knowledge_doc("rh_001", KnowledgeCategory::RiskHeuristic, "Conditional language"),
		vec![0.8, 0.6, 0.0, 0.0],
	);
}

fn stored_call(call_id: &str, timestamp: time::OffsetDateTime) -> CallRecord {
	CallRecord {
		call_id: call_id.to_string(),
		call_timestamp: timestamp,
		payload: serde_json::json!({ "risk_assessment": { "risk_score": 78 } }),
		summary: "Conditional payment promise under coaching.".to_string(),
		assessment: Some(serde_json::json!({
			"grounded_assessment": "high_risk",
			"explanation": "Signals match the coached promise pattern.",
			"recommended_action": "manual_review",
			"confidence": 0.8,
			"regulatory_flags": [],
			"matched_patterns": ["Coached promise"]
		})),
		status: Some("in_review".to_string()),
		audit_thread_id: None,
		created_at: timestamp,
	}
}

#[tokio::test]
async fn short_question_is_rejected_without_contacting_providers() {
	let fakes = Fakes::new();

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let err = service.chat(request("hi")).await.unwrap_err();

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert_eq!(fakes.embedding.call_count(), 0);
	assert_eq!(fakes.generation.call_count(), 0);
}

#[tokio::test]
async fn empty_knowledge_base_is_not_ready() {
	let fakes = Fakes::new();
	let service = KeelService::with_deps(test_config(), fakes.deps());

	let err = service.chat(request("which fraud patterns exist?")).await.unwrap_err();

	assert!(matches!(err, Error::NotReady));
}

#[tokio::test]
async fn knowledge_question_returns_answer_with_cited_sources() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![chat_reply(
			"Per [fp_001], coached promises are a fraud-adjacent pattern.",
			&["fp_001"],
		)])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response =
		service.chat(request("which patterns involve coached promises?")).await.unwrap();

	assert!(response.answer.contains("fp_001"));
	assert!(response.sources.iter().any(|source| source.id == "fp_001"));
	assert!(response.sources.iter().all(|source| (0.0..=1.0).contains(&source.similarity)));
	assert_eq!(response.metadata.knowledge_docs_searched, 2);
	assert_eq!(response.metadata.calls_searched, 0);
	assert!(!response.metadata.direct_lookup);
}

#[tokio::test]
async fn exact_call_id_lookup_bypasses_vector_search_entirely() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![chat_reply(
			"call_2026_02_09_a1b2c3 was flagged for manual review.",
			&["call_2026_02_09_a1b2c3"],
		)])),
		..Fakes::new()
	};

	fakes.records.insert_direct(stored_call("call_2026_02_09_a1b2c3", datetime!(2026-02-09 10:00 UTC)));

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service
		.chat(ChatRequest {
			question: "what did call_2026_02_09_a1b2c3 conclude?".to_string(),
			conversation_history: vec![],
			filters: ChatFilters {
				search_knowledge: false,
				search_calls: true,
				..ChatFilters::default()
			},
		})
		.await
		.unwrap();

	// No embedding was needed: the identifier matcher short-circuited.
	assert_eq!(fakes.embedding.call_count(), 0);
	assert!(response.metadata.direct_lookup);
	assert_eq!(response.sources.len(), 1);
	assert_eq!(response.sources[0].source_type, SourceType::Call);
	assert_eq!(response.sources[0].id, "call_2026_02_09_a1b2c3");
	assert_eq!(response.sources[0].similarity, 1.0);
}

#[tokio::test]
async fn recency_lookup_fetches_newest_records_first() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![chat_reply(
			"The two most recent calls were both flagged.",
			&["call_2026_02_09_cccccc", "call_2026_02_08_bbbbbb"],
		)])),
		..Fakes::new()
	};

	fakes.records.insert_direct(stored_call("call_2026_02_07_aaaaaa", datetime!(2026-02-07 09:00 UTC)));
	fakes.records.insert_direct(stored_call("call_2026_02_08_bbbbbb", datetime!(2026-02-08 09:00 UTC)));
	fakes.records.insert_direct(stored_call("call_2026_02_09_cccccc", datetime!(2026-02-09 09:00 UTC)));

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service
		.chat(ChatRequest {
			question: "summarize the last 2 calls".to_string(),
			conversation_history: vec![],
			filters: ChatFilters {
				search_knowledge: false,
				search_calls: true,
				..ChatFilters::default()
			},
		})
		.await
		.unwrap();

	let ids: Vec<&str> = response.sources.iter().map(|source| source.id.as_str()).collect();

	assert_eq!(ids, vec!["call_2026_02_09_cccccc", "call_2026_02_08_bbbbbb"]);
}

#[tokio::test]
async fn no_evidence_yields_the_insufficient_information_answer() {
	let fakes = Fakes::new();

	seed_default_knowledge(&fakes.knowledge);
	// Force every category past the timeout so retrieval yields nothing.
	fakes.knowledge.set_delay(Some(Duration::from_millis(500)));

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service.chat(request("which fraud patterns exist?")).await.unwrap();

	assert!(response.answer.contains("enough information"));
	assert!(response.sources.is_empty());
	// The refusal is deterministic; no generation call happens.
	assert_eq!(fakes.generation.call_count(), 0);
}

#[tokio::test]
async fn unknown_call_id_yields_the_insufficient_information_answer() {
	let fakes = Fakes::new();
	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service
		.chat(ChatRequest {
			question: "what about call_2026_01_01_dddddd?".to_string(),
			conversation_history: vec![],
			filters: ChatFilters {
				search_knowledge: false,
				search_calls: true,
				..ChatFilters::default()
			},
		})
		.await
		.unwrap();

	assert!(response.answer.contains("enough information"));
	assert_eq!(fakes.generation.call_count(), 0);
}

#[tokio::test]
async fn history_is_truncated_to_the_newest_ten_turns() {
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![chat_reply(
			"Continuing from the recent turns.",
			&["fp_001"],
		)])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let history: Vec<ConversationTurn> = (0..14)
		.map(|index| ConversationTurn {
			role: if index % 2 == 0 { TurnRole::User } else { TurnRole::Assistant },
			content: format!("turn {index}"),
		})
		.collect();
	let service = KeelService::with_deps(test_config(), fakes.deps());

	service
		.chat(ChatRequest {
			question: "and what about coached promises?".to_string(),
			conversation_history: history,
			filters: ChatFilters::default(),
		})
		.await
		.unwrap();

	let seen = fakes.generation.seen_messages();
	let context = seen[0][1]["content"].as_str().unwrap().to_string();

	assert!(context.contains("turn 4"));
	assert!(context.contains("turn 13"));
	assert!(!context.contains("turn 3"));
}

#[tokio::test]
async fn uncited_sources_force_a_retry_then_degrade() {
	let invented = chat_reply("See [fp_999].", &["fp_999"]);
	let fakes = Fakes {
		generation: Arc::new(ScriptedGeneration::replying(vec![invented.clone(), invented])),
		..Fakes::new()
	};

	seed_default_knowledge(&fakes.knowledge);

	let service = KeelService::with_deps(test_config(), fakes.deps());
	let response = service.chat(request("which patterns exist?")).await.unwrap();

	assert_eq!(fakes.generation.call_count(), 2);
	assert!(response.answer.contains("temporarily unavailable"));
}

#[tokio::test]
async fn both_sources_disabled_is_invalid() {
	let fakes = Fakes::new();
	let service = KeelService::with_deps(test_config(), fakes.deps());
	let err = service
		.chat(ChatRequest {
			question: "anything at all?".to_string(),
			conversation_history: vec![],
			filters: ChatFilters {
				search_knowledge: false,
				search_calls: false,
				..ChatFilters::default()
			},
		})
		.await
		.unwrap_err();

	assert!(matches!(err, Error::InvalidRequest { .. }));
}
