use serde::{Deserialize, Serialize};

pub const MIN_SUMMARY_CHARS: usize = 10;

/// The fixed payload shape emitted by the upstream NLP producer. Validated
/// once at ingestion and passed through the pipeline opaquely afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallRiskInput {
	pub call_context: CallContext,
	pub speaker_analysis: SpeakerAnalysis,
	pub nlp_insights: NlpInsights,
	pub risk_signals: RiskSignals,
	pub risk_assessment: RiskAssessment,
	pub summary_for_rag: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallContext {
	pub call_language: String,
	pub call_quality: CallQuality,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallQuality {
	pub noise_level: Grade,
	pub call_stability: Grade,
	pub speech_naturalness: Naturalness,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpeakerAnalysis {
	pub customer_only_analysis: bool,
	pub agent_influence_detected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NlpInsights {
	pub intent: IntentInsight,
	pub sentiment: SentimentInsight,
	pub obligation_strength: ObligationStrength,
	pub entities: Entities,
	pub contradictions_detected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntentInsight {
	pub label: String,
	pub confidence: f32,
	pub conditionality: Grade,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SentimentInsight {
	pub label: String,
	pub confidence: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entities {
	pub payment_commitment: Option<String>,
	pub amount_mentioned: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RiskSignals {
	#[serde(default)]
	pub audio_trust_flags: Vec<String>,
	#[serde(default)]
	pub behavioral_flags: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RiskAssessment {
	pub risk_score: u8,
	pub fraud_likelihood: Grade,
	pub confidence: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
	Low,
	Medium,
	High,
}

impl Grade {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Low => "low",
			Self::Medium => "medium",
			Self::High => "high",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Naturalness {
	Natural,
	Suspicious,
}

impl Naturalness {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Natural => "natural",
			Self::Suspicious => "suspicious",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStrength {
	Strong,
	Moderate,
	Weak,
}

impl ObligationStrength {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Strong => "strong",
			Self::Moderate => "moderate",
			Self::Weak => "weak",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldViolation {
	pub field: String,
	pub message: String,
}

impl FieldViolation {
	fn new(field: &str, message: impl Into<String>) -> Self {
		Self { field: field.to_string(), message: message.into() }
	}
}

impl CallRiskInput {
	/// Range and length checks on top of the typed deserialization. Closed
	/// enumerations are already enforced by the types themselves.
	pub fn validate(&self) -> Result<(), Vec<FieldViolation>> {
		let mut violations = Vec::new();

		if self.call_context.call_language.trim().is_empty() {
			violations
				.push(FieldViolation::new("call_context.call_language", "must be non-empty"));
		}

		check_confidence(&mut violations, "nlp_insights.intent.confidence", self.nlp_insights.intent.confidence);
		check_confidence(
			&mut violations,
			"nlp_insights.sentiment.confidence",
			self.nlp_insights.sentiment.confidence,
		);
		check_confidence(
			&mut violations,
			"risk_assessment.confidence",
			self.risk_assessment.confidence,
		);

		if self.risk_assessment.risk_score > 100 {
			violations.push(FieldViolation::new(
				"risk_assessment.risk_score",
				"must be in the range 0-100",
			));
		}
		if let Some(amount) = self.nlp_insights.entities.amount_mentioned
			&& !(amount.is_finite() && amount >= 0.0)
		{
			violations.push(FieldViolation::new(
				"nlp_insights.entities.amount_mentioned",
				"must be a non-negative number",
			));
		}
		if self.summary_for_rag.chars().count() < MIN_SUMMARY_CHARS {
			violations.push(FieldViolation::new(
				"summary_for_rag",
				format!("must be at least {MIN_SUMMARY_CHARS} characters"),
			));
		}

		if violations.is_empty() { Ok(()) } else { Err(violations) }
	}
}

fn check_confidence(violations: &mut Vec<FieldViolation>, field: &str, value: f32) {
	if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
		violations.push(FieldViolation::new(field, "must be in the range 0.0-1.0"));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> CallRiskInput {
		CallRiskInput {
			call_context: CallContext {
				call_language: "en".to_string(),
				call_quality: CallQuality {
					noise_level: Grade::Low,
					call_stability: Grade::High,
					speech_naturalness: Naturalness::Natural,
				},
			},
			speaker_analysis: SpeakerAnalysis {
				customer_only_analysis: true,
				agent_influence_detected: false,
			},
			nlp_insights: NlpInsights {
				intent: IntentInsight {
					label: "payment_promise".to_string(),
					confidence: 0.91,
					conditionality: Grade::Low,
				},
				sentiment: SentimentInsight { label: "neutral".to_string(), confidence: 0.8 },
				obligation_strength: ObligationStrength::Strong,
				entities: Entities {
					payment_commitment: Some("full balance".to_string()),
					amount_mentioned: Some(120.0),
				},
				contradictions_detected: false,
			},
			risk_signals: RiskSignals { audio_trust_flags: vec![], behavioral_flags: vec![] },
			risk_assessment: RiskAssessment {
				risk_score: 12,
				fraud_likelihood: Grade::Low,
				confidence: 0.9,
			},
			summary_for_rag: "Customer commits to paying the full balance on Friday.".to_string(),
		}
	}

	#[test]
	fn accepts_valid_payload() {
		assert!(sample().validate().is_ok());
	}

	#[test]
	fn rejects_out_of_range_confidence() {
		let mut payload = sample();
		payload.nlp_insights.intent.confidence = 1.2;

		let violations = payload.validate().unwrap_err();

		assert_eq!(violations.len(), 1);
		assert_eq!(violations[0].field, "nlp_insights.intent.confidence");
	}

	#[test]
	fn rejects_short_summary() {
		let mut payload = sample();
		payload.summary_for_rag = "too".to_string();

		let violations = payload.validate().unwrap_err();

		assert_eq!(violations[0].field, "summary_for_rag");
	}

	#[test]
	fn collects_every_violation() {
		let mut payload = sample();
		payload.nlp_insights.sentiment.confidence = -0.5;
		payload.risk_assessment.confidence = f32::NAN;
		payload.summary_for_rag = "short".to_string();

		let violations = payload.validate().unwrap_err();

		assert_eq!(violations.len(), 3);
	}

	#[test]
	fn rejects_unknown_enum_value_at_deserialization() {
		let mut value = serde_json::to_value(sample()).unwrap();
		value["nlp_insights"]["obligation_strength"] = serde_json::json!("ironclad");

		assert!(serde_json::from_value::<CallRiskInput>(value).is_err());
	}
}
