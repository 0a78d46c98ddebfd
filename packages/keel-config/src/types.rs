use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub context: Context,
	pub chat: Chat,
	pub status: StatusPolicy,
	pub audit: Option<Audit>,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub knowledge_collection: String,
	pub calls_collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

/// Per-category retrieval limits for the analysis path. Each category is
/// queried independently; there is no global top-K across categories.
#[derive(Debug, Deserialize)]
pub struct Retrieval {
	pub fraud_pattern_limit: u32,
	pub compliance_limit: u32,
	pub risk_heuristic_limit: u32,
	pub category_timeout_ms: u64,
	pub similarity_floor: f32,
}

#[derive(Debug, Deserialize)]
pub struct Context {
	pub max_chars: usize,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
	pub min_question_chars: usize,
	pub history_turns: usize,
	pub knowledge_limit: u32,
	pub calls_limit: u32,
	pub recency_max: u32,
}

/// Score-bucket boundaries for the fallback status policy. The action table
/// is the primary mapping; these buckets apply only when no action mapping
/// exists for an assessment.
#[derive(Debug, Deserialize)]
pub struct StatusPolicy {
	pub score_low_max: u8,
	pub score_medium_max: u8,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Audit {
	pub api_base: String,
	pub api_key: String,
	pub timeout_ms: u64,
}
