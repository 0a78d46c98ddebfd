use std::time::Duration;

use tracing::warn;

use crate::KeelService;
use keel_domain::KnowledgeCategory;
use keel_storage::models::RetrievedDoc;

/// One category's slice of the fan-out: which category and how many hits.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CategoryPlan {
	pub category: KnowledgeCategory,
	pub limit: u64,
}

/// Every fan-out branch resolves to one of these, so the join is total and
/// never raises. Timed-out and failed branches count as "no evidence".
#[derive(Debug)]
pub(crate) enum CategoryOutcome {
	Hits(Vec<RetrievedDoc>),
	Empty,
	TimedOut,
	Failed,
}

impl CategoryOutcome {
	pub fn docs(&self) -> &[RetrievedDoc] {
		match self {
			Self::Hits(docs) => docs,
			_ => &[],
		}
	}
}

#[derive(Debug)]
pub(crate) struct CategoryEvidence {
	pub category: KnowledgeCategory,
	pub outcome: CategoryOutcome,
}

impl KeelService {
	/// Fans out one independent similarity query per requested category and
	/// joins them. The join blocks on the slowest branch, bounded by the
	/// per-category timeout; a slow or failing branch degrades to no evidence
	/// instead of failing the request.
	pub(crate) async fn retrieve_categories(
		&self,
		plans: &[CategoryPlan],
		query_vector: &[f32],
	) -> Vec<CategoryEvidence> {
		let timeout = Duration::from_millis(self.cfg.retrieval.category_timeout_ms);
		let floor = self.cfg.retrieval.similarity_floor;
		let mut handles = Vec::with_capacity(plans.len());

		for plan in plans {
			let knowledge = self.deps.knowledge.clone();
			let vector = query_vector.to_vec();
			let CategoryPlan { category, limit } = *plan;

			handles.push(tokio::spawn(async move {
				match tokio::time::timeout(timeout, knowledge.search(category, vector, limit))
					.await
				{
					Ok(Ok(mut docs)) => {
						// Sub-floor hits are noise, not evidence.
						docs.retain(|doc| doc.similarity >= floor);

						if docs.is_empty() {
							CategoryOutcome::Empty
						} else {
							CategoryOutcome::Hits(docs)
						}
					},
					Ok(Err(err)) => {
						warn!(category = category.as_str(), %err, "Category retrieval failed.");

						CategoryOutcome::Failed
					},
					Err(_) => {
						warn!(category = category.as_str(), "Category retrieval timed out.");

						CategoryOutcome::TimedOut
					},
				}
			}));
		}

		let mut evidence = Vec::with_capacity(plans.len());
		for (plan, handle) in plans.iter().zip(handles) {
			let outcome = handle.await.unwrap_or(CategoryOutcome::Failed);

			evidence.push(CategoryEvidence { category: plan.category, outcome });
		}

		evidence
	}

	pub(crate) fn analysis_plans(&self) -> Vec<CategoryPlan> {
		let retrieval = &self.cfg.retrieval;

		KnowledgeCategory::ANALYSIS_ORDER
			.into_iter()
			.map(|category| {
				let limit = match category {
					KnowledgeCategory::FraudPattern => retrieval.fraud_pattern_limit,
					KnowledgeCategory::Compliance => retrieval.compliance_limit,
					KnowledgeCategory::RiskHeuristic => retrieval.risk_heuristic_limit,
				};

				CategoryPlan { category, limit: u64::from(limit) }
			})
			.collect()
	}
}

/// Titles the reasoner is allowed to cite: every title actually retrieved in
/// this request, across all categories.
pub(crate) fn shown_titles(evidence: &[CategoryEvidence]) -> Vec<String> {
	evidence
		.iter()
		.flat_map(|entry| entry.outcome.docs())
		.map(|doc| doc.title.clone())
		.collect()
}
