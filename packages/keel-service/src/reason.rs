use serde_json::json;
use tracing::warn;

use crate::KeelService;
use keel_domain::{GroundedAssessment, assessment};

/// Instruction preamble for the grounding stage. Encodes the invariants the
/// downstream validation re-checks: no score changes, no new signals, cite
/// only shown patterns, closed label sets, neutral vocabulary, JSON only.
pub(crate) const GROUNDING_PREAMBLE: &str = "\
You are a financial risk grounding assistant. Your role is to interpret
call-level risk signals by grounding them against known fraud patterns,
compliance rules, and risk heuristics.

You MUST return a JSON object with:
- grounded_assessment: one of \"high_risk\", \"medium_risk\", \"low_risk\"
- explanation: human-readable, auditor-friendly narrative explaining WHY
  the signals match or don't match known patterns. Cite specific patterns.
- recommended_action: one of \"auto_clear\", \"flag_for_review\",
  \"manual_review\", \"escalate_to_compliance\"
- confidence: float 0.0-1.0 representing grounding confidence
- regulatory_flags: array of regulatory concerns (empty if none)
- matched_patterns: array of pattern titles that matched

RULES:
- You MUST NOT override the risk score from the upstream service
- You MUST NOT extract new intent, sentiment, or entities
- You MUST NOT use accusatory language (\"fraudster\", \"liar\", \"criminal\")
- You MUST use terms like: \"high-risk indicators\", \"unreliable commitment\",
  \"requires verification\", \"fraud-adjacent pattern\"
- matched_patterns may only contain titles present in the provided context
- If signals are ambiguous, say so and recommend manual review
- If no patterns match, state that clearly and lower confidence
- Base your reasoning ONLY on the provided signals and retrieved knowledge
- Return ONLY the JSON object, no markdown fencing or extra text";

const STRICT_RETRY_NOTE: &str = "\
Your previous reply violated the output contract. Return ONLY a JSON object
with exactly these fields: grounded_assessment (high_risk | medium_risk |
low_risk), explanation (string), recommended_action (auto_clear |
flag_for_review | manual_review | escalate_to_compliance), confidence (number
0.0-1.0), regulatory_flags (array of strings), matched_patterns (array of
strings drawn only from the pattern titles shown in the context). No markdown
fencing, no additional keys, no commentary.";

impl KeelService {
	/// Invokes the generation provider under the strict output contract. One
	/// retry with a stricter restatement on any provider or contract failure;
	/// a second failure yields the deterministic fallback. This stage never
	/// fails the request.
	pub(crate) async fn run_grounded_reasoning(
		&self,
		context: &str,
		shown_titles: &[String],
	) -> GroundedAssessment {
		let cfg = &self.cfg.providers.llm;
		let mut messages = vec![
			json!({ "role": "system", "content": GROUNDING_PREAMBLE }),
			json!({ "role": "user", "content": context }),
		];

		for attempt in 0..2u8 {
			match self.deps.generation.complete(cfg, &messages).await {
				Ok(raw) => match parse_assessment(&raw, shown_titles) {
					Ok(assessment) => return assessment,
					Err(reason) => {
						warn!(attempt, %reason, "Reasoner output rejected.");

						messages.push(json!({ "role": "assistant", "content": raw }));
						messages.push(json!({ "role": "user", "content": STRICT_RETRY_NOTE }));
					},
				},
				Err(err) => {
					warn!(attempt, %err, "Generation provider failed.");
				},
			}
		}

		warn!("Grounded reasoning degraded to the fallback assessment.");

		GroundedAssessment::fallback()
	}
}

/// Parses and validates one raw reply against the output contract. The closed
/// enumerations are enforced by the typed deserialization itself.
pub(crate) fn parse_assessment(
	raw: &str,
	shown_titles: &[String],
) -> Result<GroundedAssessment, String> {
	let assessment: GroundedAssessment =
		serde_json::from_str(raw).map_err(|err| format!("invalid JSON: {err}"))?;

	if !(assessment.confidence.is_finite() && (0.0..=1.0).contains(&assessment.confidence)) {
		return Err(format!("confidence {} is out of range", assessment.confidence));
	}
	if !assessment.cites_only(shown_titles) {
		return Err("matched_patterns cites evidence that was not shown".to_string());
	}
	if assessment::contains_forbidden_term(&assessment.explanation) {
		return Err("explanation uses forbidden vocabulary".to_string());
	}

	Ok(assessment)
}
