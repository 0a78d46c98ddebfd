use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
	Error, KeelService, Result, chat_context, chat_reason,
	retrieval::{CategoryOutcome, CategoryPlan},
};
use keel_domain::{ConversationTurn, DirectLookup, KnowledgeCategory, conversation, lookup};
use keel_storage::models::{CallRecord, RetrievedCall, RetrievedDoc};

const LIMIT_MAX: u32 = 10;
const TITLE_PREVIEW_CHARS: usize = 80;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
	pub question: String,
	#[serde(default)]
	pub conversation_history: Vec<ConversationTurn>,
	#[serde(default)]
	pub filters: ChatFilters,
}

/// Which sources the engine searches, and how hard. Limits fall back to the
/// configured defaults when unset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatFilters {
	#[serde(default = "default_true")]
	pub search_knowledge: bool,
	#[serde(default)]
	pub search_calls: bool,
	#[serde(default = "default_categories")]
	pub categories: Vec<KnowledgeCategory>,
	#[serde(default)]
	pub knowledge_limit: Option<u32>,
	#[serde(default)]
	pub calls_limit: Option<u32>,
}

impl Default for ChatFilters {
	fn default() -> Self {
		Self {
			search_knowledge: true,
			search_calls: false,
			categories: default_categories(),
			knowledge_limit: None,
			calls_limit: None,
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_categories() -> Vec<KnowledgeCategory> {
	KnowledgeCategory::ANALYSIS_ORDER.to_vec()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
	Knowledge,
	Call,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatSource {
	#[serde(rename = "type")]
	pub source_type: SourceType,
	pub id: String,
	pub category: Option<String>,
	pub title: String,
	pub similarity: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMetadata {
	pub knowledge_docs_searched: usize,
	pub calls_searched: usize,
	pub direct_lookup: bool,
	pub model: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatResponse {
	pub answer: String,
	pub sources: Vec<ChatSource>,
	pub metadata: ChatMetadata,
}

/// Call evidence arrives through two paths: vector hits over stored summary
/// embeddings, or direct lookups that bypass vector search entirely.
pub(crate) enum CallEvidence {
	Hit(RetrievedCall),
	Direct(Box<CallRecord>),
}

impl CallEvidence {
	fn call_id(&self) -> &str {
		match self {
			Self::Hit(hit) => &hit.call_id,
			Self::Direct(record) => &record.call_id,
		}
	}

	fn summary(&self) -> &str {
		match self {
			Self::Hit(hit) => &hit.summary,
			Self::Direct(record) => &record.summary,
		}
	}

	fn similarity(&self) -> f32 {
		match self {
			Self::Hit(hit) => hit.similarity,
			// Direct lookups are exact matches, not nearest neighbors.
			Self::Direct(_) => 1.0,
		}
	}
}

impl KeelService {
	/// Free-text question answering over the knowledge base and historical
	/// records. Always resolves to a grounded answer, an explicit
	/// insufficient-information statement, or the degraded-mode answer.
	pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
		let question = req.question.trim().to_string();

		if question.chars().count() < self.cfg.chat.min_question_chars {
			return Err(Error::InvalidRequest {
				message: format!(
					"question must be at least {} characters",
					self.cfg.chat.min_question_chars
				),
				fields: vec!["question".to_string()],
			});
		}

		let filters = &req.filters;

		validate_filters(filters)?;

		if filters.search_knowledge && self.deps.knowledge.count().await? == 0 {
			return Err(Error::NotReady);
		}

		let knowledge_limit =
			u64::from(filters.knowledge_limit.unwrap_or(self.cfg.chat.knowledge_limit));
		let calls_limit = u64::from(filters.calls_limit.unwrap_or(self.cfg.chat.calls_limit));

		// A direct reference short-circuits vector search for the calls
		// source; embedding is skipped entirely when nothing needs it.
		let lookup = if filters.search_calls { lookup::detect(&question) } else { None };
		let need_embedding =
			filters.search_knowledge || (filters.search_calls && lookup.is_none());
		let query_vector = if need_embedding {
			Some(self.embed_with_retry(&question).await?)
		} else {
			None
		};

		let mut knowledge_docs = Vec::new();
		if filters.search_knowledge
			&& let Some(vector) = &query_vector
		{
			knowledge_docs =
				self.search_chat_knowledge(&filters.categories, vector, knowledge_limit).await;
		}

		let call_evidence =
			self.gather_call_evidence(filters, &lookup, &query_vector, calls_limit).await?;

		let metadata = ChatMetadata {
			knowledge_docs_searched: knowledge_docs.len(),
			calls_searched: call_evidence.len(),
			direct_lookup: lookup.is_some(),
			model: self.cfg.providers.llm.model.clone(),
		};

		if knowledge_docs.is_empty() && call_evidence.is_empty() {
			info!("No evidence retrieved; answering with the insufficient-information statement.");

			return Ok(ChatResponse {
				answer: chat_reason::INSUFFICIENT_INFORMATION.to_string(),
				sources: vec![],
				metadata,
			});
		}

		let history =
			conversation::truncated(&req.conversation_history, self.cfg.chat.history_turns);
		let context =
			chat_context::build_chat_context(&question, &knowledge_docs, &call_evidence, history);
		let allowed_ids: Vec<String> = knowledge_docs
			.iter()
			.map(|doc| doc.doc_id.clone())
			.chain(call_evidence.iter().map(|call| call.call_id().to_string()))
			.collect();
		let answer = self.run_chat_reasoning(&context, &allowed_ids).await;
		let sources = build_sources(&knowledge_docs, &call_evidence);

		Ok(ChatResponse { answer: answer.answer, sources, metadata })
	}

	/// Knowledge search for chat: the same per-category fan-out as analysis,
	/// then one merged list capped by descending similarity. The stable sort
	/// keeps equal-similarity hits in category priority order.
	async fn search_chat_knowledge(
		&self,
		categories: &[KnowledgeCategory],
		query_vector: &[f32],
		limit: u64,
	) -> Vec<RetrievedDoc> {
		let plans: Vec<CategoryPlan> =
			categories.iter().map(|category| CategoryPlan { category: *category, limit }).collect();
		let evidence = self.retrieve_categories(&plans, query_vector).await;
		let mut docs: Vec<RetrievedDoc> = evidence
			.into_iter()
			.flat_map(|entry| match entry.outcome {
				CategoryOutcome::Hits(docs) => docs,
				_ => vec![],
			})
			.collect();

		docs.sort_by(|a, b| {
			b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal)
		});
		docs.truncate(limit as usize);

		docs
	}

	async fn gather_call_evidence(
		&self,
		filters: &ChatFilters,
		lookup: &Option<DirectLookup>,
		query_vector: &Option<Vec<f32>>,
		calls_limit: u64,
	) -> Result<Vec<CallEvidence>> {
		if !filters.search_calls {
			return Ok(vec![]);
		}

		match lookup {
			Some(DirectLookup::CallId(call_id)) => {
				let record = self.deps.records.fetch(call_id).await?;

				Ok(record.map(|record| vec![CallEvidence::Direct(Box::new(record))]).unwrap_or_default())
			},
			Some(DirectLookup::Recent(count)) => {
				let capped = (*count).min(self.cfg.chat.recency_max as usize);
				let records = self.deps.records.recent(capped as i64).await?;

				Ok(records.into_iter().map(|record| CallEvidence::Direct(Box::new(record))).collect())
			},
			None => {
				let Some(vector) = query_vector else {
					return Ok(vec![]);
				};

				match self.deps.calls.search(vector.clone(), calls_limit).await {
					Ok(hits) => Ok(hits.into_iter().map(CallEvidence::Hit).collect()),
					Err(err) => {
						warn!(%err, "Historical call search failed; continuing without it.");

						Ok(vec![])
					},
				}
			},
		}
	}
}

fn validate_filters(filters: &ChatFilters) -> Result<()> {
	if filters.search_knowledge && filters.categories.is_empty() {
		return Err(Error::InvalidRequest {
			message: "categories must be non-empty when knowledge search is enabled".to_string(),
			fields: vec!["filters.categories".to_string()],
		});
	}
	if !filters.search_knowledge && !filters.search_calls {
		return Err(Error::InvalidRequest {
			message: "at least one source must be enabled".to_string(),
			fields: vec!["filters.search_knowledge".to_string(), "filters.search_calls".to_string()],
		});
	}

	for (name, limit) in [
		("filters.knowledge_limit", filters.knowledge_limit),
		("filters.calls_limit", filters.calls_limit),
	] {
		if let Some(limit) = limit
			&& !(1..=LIMIT_MAX).contains(&limit)
		{
			return Err(Error::InvalidRequest {
				message: format!("{name} must be in the range 1-{LIMIT_MAX}"),
				fields: vec![name.to_string()],
			});
		}
	}

	Ok(())
}

fn build_sources(knowledge_docs: &[RetrievedDoc], calls: &[CallEvidence]) -> Vec<ChatSource> {
	let knowledge = knowledge_docs.iter().map(|doc| ChatSource {
		source_type: SourceType::Knowledge,
		id: doc.doc_id.clone(),
		category: Some(doc.category.clone()),
		title: doc.title.clone(),
		similarity: doc.similarity,
	});
	let calls = calls.iter().map(|call| ChatSource {
		source_type: SourceType::Call,
		id: call.call_id().to_string(),
		category: None,
		title: preview(call.summary()),
		similarity: call.similarity(),
	});

	knowledge.chain(calls).collect()
}

fn preview(text: &str) -> String {
	if text.chars().count() <= TITLE_PREVIEW_CHARS {
		return text.to_string();
	}

	let truncated: String = text.chars().take(TITLE_PREVIEW_CHARS).collect();

	format!("{truncated}...")
}
