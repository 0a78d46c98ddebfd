use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{
		Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter, PointStruct,
		SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder, value::Kind,
	},
};
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{KnowledgeDoc, RetrievedCall, RetrievedDoc},
};

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub knowledge_collection: String,
	pub calls_collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &keel_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			knowledge_collection: cfg.knowledge_collection.clone(),
			calls_collection: cfg.calls_collection.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	pub async fn ensure_collections(&self) -> Result<()> {
		for collection in [&self.knowledge_collection, &self.calls_collection] {
			if self.client.collection_exists(collection).await? {
				continue;
			}

			self.client
				.create_collection(
					CreateCollectionBuilder::new(collection).vectors_config(
						VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
					),
				)
				.await?;
		}

		Ok(())
	}

	pub async fn knowledge_count(&self) -> Result<u64> {
		let response = self
			.client
			.count(CountPointsBuilder::new(&self.knowledge_collection).exact(true))
			.await?;

		Ok(response.result.map(|result| result.count).unwrap_or(0))
	}

	pub async fn upsert_knowledge(&self, doc: &KnowledgeDoc, vector: Vec<f32>) -> Result<()> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"knowledge vector has {} dimensions, expected {}",
				vector.len(),
				self.vector_dim
			)));
		}

		let payload = Payload::try_from(serde_json::json!({
			"doc_id": doc.doc_id,
			"category": doc.category,
			"title": doc.title,
			"content": doc.content,
			"metadata": doc.metadata,
		}))
		.map_err(|err| Error::InvalidArgument(err.to_string()))?;
		let point = PointStruct::new(point_id(&doc.doc_id), vector, payload);

		self.client
			.upsert_points(UpsertPointsBuilder::new(&self.knowledge_collection, vec![point]))
			.await?;

		Ok(())
	}

	/// One similarity query scoped to a single category. Result order is the
	/// store's ranking, descending; callers rely on it being stable between
	/// identical runs.
	pub async fn search_knowledge(
		&self,
		category: &str,
		vector: Vec<f32>,
		limit: u64,
	) -> Result<Vec<RetrievedDoc>> {
		let response = self
			.client
			.search_points(
				SearchPointsBuilder::new(&self.knowledge_collection, vector, limit)
					.filter(Filter::must([Condition::matches(
						"category",
						category.to_string(),
					)]))
					.with_payload(true),
			)
			.await?;
		let docs = response
			.result
			.into_iter()
			.map(|point| RetrievedDoc {
				doc_id: payload_str(&point.payload, "doc_id"),
				category: payload_str(&point.payload, "category"),
				title: payload_str(&point.payload, "title"),
				content: payload_str(&point.payload, "content"),
				similarity: normalize_score(point.score),
			})
			.collect();

		Ok(docs)
	}

	pub async fn upsert_call(
		&self,
		call_id: &str,
		vector: Vec<f32>,
		summary: &str,
		risk_score: i64,
		fraud_likelihood: &str,
	) -> Result<()> {
		let payload = Payload::try_from(serde_json::json!({
			"call_id": call_id,
			"summary": summary,
			"risk_score": risk_score,
			"fraud_likelihood": fraud_likelihood,
		}))
		.map_err(|err| Error::InvalidArgument(err.to_string()))?;
		let point = PointStruct::new(point_id(call_id), vector, payload);

		self.client
			.upsert_points(UpsertPointsBuilder::new(&self.calls_collection, vec![point]))
			.await?;

		Ok(())
	}

	pub async fn search_calls(&self, vector: Vec<f32>, limit: u64) -> Result<Vec<RetrievedCall>> {
		let response = self
			.client
			.search_points(
				SearchPointsBuilder::new(&self.calls_collection, vector, limit).with_payload(true),
			)
			.await?;
		let calls = response
			.result
			.into_iter()
			.map(|point| RetrievedCall {
				call_id: payload_str(&point.payload, "call_id"),
				summary: payload_str(&point.payload, "summary"),
				risk_score: payload_i64(&point.payload, "risk_score"),
				fraud_likelihood: payload_str(&point.payload, "fraud_likelihood"),
				similarity: normalize_score(point.score),
			})
			.collect();

		Ok(calls)
	}
}

/// Stable point id derived from the external identifier, so re-seeding a
/// document overwrites its previous point instead of duplicating it.
fn point_id(external_id: &str) -> String {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, external_id.as_bytes()).to_string()
}

/// Cosine scores arrive in [-1, 1]; the retrieval contract is [0, 1].
pub fn normalize_score(score: f32) -> f32 {
	score.clamp(0.0, 1.0)
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> String {
	match payload.get(key).and_then(|value| value.kind.as_ref()) {
		Some(Kind::StringValue(raw)) => raw.clone(),
		_ => String::new(),
	}
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> i64 {
	match payload.get(key).and_then(|value| value.kind.as_ref()) {
		Some(Kind::IntegerValue(raw)) => *raw,
		_ => 0,
	}
}
