use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, KeelService, Result};
use keel_domain::KnowledgeCategory;
use keel_storage::models::KnowledgeDoc;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedRequest {
	pub documents: Vec<KnowledgeDoc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedReport {
	pub documents_processed: usize,
	pub by_category: BTreeMap<String, usize>,
	pub total_in_index: u64,
	pub errors: Vec<String>,
}

impl KeelService {
	/// Ingestion surface for the out-of-scope curation process: embeds each
	/// curated document and upserts it into the knowledge index. Per-document
	/// failures are reported, not fatal, so a partially valid batch still
	/// lands.
	pub async fn seed_knowledge(&self, req: SeedRequest) -> Result<SeedReport> {
		if req.documents.is_empty() {
			return Err(Error::InvalidRequest {
				message: "documents must be non-empty".to_string(),
				fields: vec!["documents".to_string()],
			});
		}

		let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
		let mut errors = Vec::new();
		let mut processed = 0usize;

		for doc in &req.documents {
			if serde_json::from_value::<KnowledgeCategory>(serde_json::Value::String(
				doc.category.clone(),
			))
			.is_err()
			{
				errors.push(format!("{}: unknown category {}", doc.doc_id, doc.category));

				continue;
			}

			let vector = match self.embed_with_retry(&doc.content).await {
				Ok(vector) => vector,
				Err(err) => {
					errors.push(format!("{}: embedding failed: {err}", doc.doc_id));

					continue;
				},
			};

			if let Err(err) = self.deps.knowledge.upsert(doc, vector).await {
				errors.push(format!("{}: upsert failed: {err}", doc.doc_id));

				continue;
			}

			info!(doc_id = doc.doc_id, category = doc.category, "Knowledge document seeded.");

			*by_category.entry(doc.category.clone()).or_default() += 1;
			processed += 1;
		}

		if !errors.is_empty() {
			warn!(failed = errors.len(), "Some knowledge documents failed to seed.");
		}

		let total_in_index = self.deps.knowledge.count().await?;

		Ok(SeedReport { documents_processed: processed, by_category, total_in_index, errors })
	}
}
