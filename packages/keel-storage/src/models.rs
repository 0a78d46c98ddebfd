use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// One row of `call_analyses`. `assessment` and `status` stay NULL until the
/// reasoning stage completes; they are written together, exactly once.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CallRecord {
	pub call_id: String,
	pub call_timestamp: OffsetDateTime,
	pub payload: Value,
	pub summary: String,
	pub assessment: Option<Value>,
	pub status: Option<String>,
	pub audit_thread_id: Option<String>,
	pub created_at: OffsetDateTime,
}

/// A curated knowledge document as supplied by the seeding process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeDoc {
	pub doc_id: String,
	pub category: String,
	pub title: String,
	pub content: String,
	#[serde(default)]
	pub metadata: Value,
}

/// A knowledge hit from nearest-neighbor search. Ephemeral, never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievedDoc {
	pub doc_id: String,
	pub category: String,
	pub title: String,
	pub content: String,
	pub similarity: f32,
}

/// A historical call hit from vector search over stored summary embeddings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievedCall {
	pub call_id: String,
	pub summary: String,
	pub risk_score: i64,
	pub fraud_likelihood: String,
	pub similarity: f32,
}
