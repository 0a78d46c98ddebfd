use serde::{Deserialize, Serialize};

/// Closed partition of the curated knowledge base. Categories are queried
/// independently and never re-ranked against each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeCategory {
	FraudPattern,
	Compliance,
	RiskHeuristic,
}

impl KnowledgeCategory {
	/// Fixed priority order for context assembly. Fraud patterns lead because
	/// they anchor what the reasoner is most likely to cite first.
	pub const ANALYSIS_ORDER: [Self; 3] = [Self::FraudPattern, Self::Compliance, Self::RiskHeuristic];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::FraudPattern => "fraud_pattern",
			Self::Compliance => "compliance",
			Self::RiskHeuristic => "risk_heuristic",
		}
	}

	pub fn section_title(self) -> &'static str {
		match self {
			Self::FraudPattern => "MATCHED FRAUD PATTERNS",
			Self::Compliance => "COMPLIANCE GUIDANCE",
			Self::RiskHeuristic => "RISK HEURISTICS",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_wire_names() {
		for category in KnowledgeCategory::ANALYSIS_ORDER {
			let raw = serde_json::to_string(&category).unwrap();

			assert_eq!(raw, format!("\"{}\"", category.as_str()));
			assert_eq!(serde_json::from_str::<KnowledgeCategory>(&raw).unwrap(), category);
		}
	}
}
