use serde::{Deserialize, Serialize};

/// Accusatory vocabulary the reasoner must never emit. A generated
/// explanation containing any of these fails validation.
pub const FORBIDDEN_TERMS: [&str; 4] = ["fraudster", "liar", "criminal", "scammer"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLabel {
	HighRisk,
	MediumRisk,
	LowRisk,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
	AutoClear,
	FlagForReview,
	ManualReview,
	EscalateToCompliance,
}

/// The structured output contract of the grounded reasoning stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroundedAssessment {
	pub grounded_assessment: RiskLabel,
	pub explanation: String,
	pub recommended_action: RecommendedAction,
	pub confidence: f32,
	#[serde(default)]
	pub regulatory_flags: Vec<String>,
	#[serde(default)]
	pub matched_patterns: Vec<String>,
}

impl GroundedAssessment {
	/// Deterministic conservative result used when the generation provider
	/// cannot produce a valid structured output after retry.
	pub fn fallback() -> Self {
		Self {
			grounded_assessment: RiskLabel::HighRisk,
			explanation: "Automated grounding was unavailable. This call has been flagged for \
				manual review as a precaution; a human assessor should evaluate the risk signals \
				directly."
				.to_string(),
			recommended_action: RecommendedAction::ManualReview,
			confidence: 0.0,
			regulatory_flags: vec![],
			matched_patterns: vec![],
		}
	}

	/// Every matched pattern must name a title the reasoner was actually
	/// shown. Cited-but-unseen evidence fails the output contract.
	pub fn cites_only(&self, shown_titles: &[String]) -> bool {
		self.matched_patterns.iter().all(|pattern| shown_titles.iter().any(|t| t == pattern))
	}
}

pub fn contains_forbidden_term(text: &str) -> bool {
	let lowered = text.to_lowercase();

	FORBIDDEN_TERMS.iter().any(|term| lowered.contains(term))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fallback_is_conservative() {
		let fallback = GroundedAssessment::fallback();

		assert_eq!(fallback.recommended_action, RecommendedAction::ManualReview);
		assert_eq!(fallback.confidence, 0.0);
		assert!(fallback.matched_patterns.is_empty());
	}

	#[test]
	fn subset_check_rejects_unseen_titles() {
		let mut assessment = GroundedAssessment::fallback();
		assessment.matched_patterns = vec!["Third-party coaching".to_string()];

		let shown = vec!["Scripted payment promise".to_string()];

		assert!(!assessment.cites_only(&shown));
		assert!(assessment.cites_only(&[shown, vec!["Third-party coaching".to_string()]].concat()));
	}

	#[test]
	fn forbidden_terms_are_case_insensitive() {
		assert!(contains_forbidden_term("The caller is a FRAUDSTER."));
		assert!(!contains_forbidden_term("High-risk indicators require verification."));
	}

	#[test]
	fn parses_wire_shape() {
		let raw = r#"{
			"grounded_assessment": "medium_risk",
			"explanation": "Signals partially match a known pattern.",
			"recommended_action": "flag_for_review",
			"confidence": 0.72,
			"regulatory_flags": [],
			"matched_patterns": ["Scripted payment promise"]
		}"#;
		let parsed: GroundedAssessment = serde_json::from_str(raw).unwrap();

		assert_eq!(parsed.grounded_assessment, RiskLabel::MediumRisk);
		assert_eq!(parsed.recommended_action, RecommendedAction::FlagForReview);
	}

	#[test]
	fn rejects_unknown_action_label() {
		let raw = r#"{
			"grounded_assessment": "low_risk",
			"explanation": "ok",
			"recommended_action": "shrug",
			"confidence": 0.5
		}"#;

		assert!(serde_json::from_str::<GroundedAssessment>(raw).is_err());
	}
}
