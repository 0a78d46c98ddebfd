use std::fmt::Write;

use crate::retrieval::CategoryEvidence;
use keel_domain::{CallRiskInput, category::KnowledgeCategory};
use keel_storage::models::RetrievedDoc;

/// Builds the grounding context: the signals section first, then each
/// knowledge category in its fixed priority order. The output is fully
/// deterministic for identical inputs; section order anchors which evidence
/// the reasoner is statistically most likely to cite first.
///
/// When the artifact exceeds `max_chars`, the lowest-similarity retrieved
/// item is dropped (later categories losing ties first) until it fits; the
/// signals section is never dropped.
pub(crate) fn build_grounding_context(
	payload: &CallRiskInput,
	evidence: &[CategoryEvidence],
	max_chars: usize,
) -> String {
	let mut per_category: Vec<(KnowledgeCategory, Vec<&RetrievedDoc>)> = evidence
		.iter()
		.map(|entry| (entry.category, entry.outcome.docs().iter().collect()))
		.collect();

	loop {
		let rendered = render(payload, &per_category);

		if rendered.chars().count() <= max_chars || !drop_lowest(&mut per_category) {
			return rendered;
		}
	}
}

fn render(payload: &CallRiskInput, per_category: &[(KnowledgeCategory, Vec<&RetrievedDoc>)]) -> String {
	let mut sections = vec![signals_section(payload)];

	for (category, docs) in per_category {
		sections.push(category_section(*category, docs));
	}

	sections.join("\n\n")
}

fn signals_section(payload: &CallRiskInput) -> String {
	let ctx = &payload.call_context;
	let quality = &ctx.call_quality;
	let speakers = &payload.speaker_analysis;
	let nlp = &payload.nlp_insights;
	let signals = &payload.risk_signals;
	let risk = &payload.risk_assessment;
	let amount = nlp
		.entities
		.amount_mentioned
		.map(|amount| amount.to_string())
		.unwrap_or_else(|| "none".to_string());

	let mut out = String::new();
	let _ = writeln!(out, "=== CALL SIGNALS ===");
	let _ = writeln!(out, "Summary: {}", payload.summary_for_rag);
	let _ = writeln!(out, "Call Language: {}", ctx.call_language);
	let _ = writeln!(
		out,
		"Call Quality: noise={}, stability={}, speech={}",
		quality.noise_level.as_str(),
		quality.call_stability.as_str(),
		quality.speech_naturalness.as_str()
	);
	let _ = writeln!(
		out,
		"Speaker Analysis: customer_only={}, agent_influence={}",
		speakers.customer_only_analysis, speakers.agent_influence_detected
	);
	let _ = writeln!(
		out,
		"Intent: {} (confidence: {:.2}, conditionality: {})",
		nlp.intent.label,
		nlp.intent.confidence,
		nlp.intent.conditionality.as_str()
	);
	let _ = writeln!(
		out,
		"Sentiment: {} (confidence: {:.2})",
		nlp.sentiment.label, nlp.sentiment.confidence
	);
	let _ = writeln!(out, "Obligation Strength: {}", nlp.obligation_strength.as_str());
	let _ = writeln!(
		out,
		"Entities: payment_commitment={}, amount_mentioned={amount}",
		nlp.entities.payment_commitment.as_deref().unwrap_or("none")
	);
	let _ = writeln!(
		out,
		"Contradictions Detected: {}",
		if nlp.contradictions_detected { "YES" } else { "NO" }
	);
	let _ = writeln!(out, "Audio Flags: {}", safe_join(&signals.audio_trust_flags));
	let _ = writeln!(out, "Behavioral Flags: {}", safe_join(&signals.behavioral_flags));
	let _ = write!(
		out,
		"Risk Score: {} | Fraud Likelihood: {} | Confidence: {:.2}",
		risk.risk_score,
		risk.fraud_likelihood.as_str(),
		risk.confidence
	);

	out
}

fn category_section(category: KnowledgeCategory, docs: &[&RetrievedDoc]) -> String {
	let mut out = format!("=== {} ===", category.section_title());

	if docs.is_empty() {
		let _ = write!(out, "\nNo matching documents in this category.");

		return out;
	}

	for (index, doc) in docs.iter().enumerate() {
		let _ = write!(out, "\n[{}] ({:.2}) {}", index + 1, doc.similarity, doc.title);
		let _ = write!(out, "\n    {}", doc.content);
	}

	out
}

/// Drops the single lowest-similarity item across all categories; later
/// categories lose ties first so the leading sections keep their anchors.
/// Returns false once nothing is left to drop.
fn drop_lowest(per_category: &mut [(KnowledgeCategory, Vec<&RetrievedDoc>)]) -> bool {
	let mut target: Option<(usize, usize, f32)> = None;

	for (section_idx, (_, docs)) in per_category.iter().enumerate().rev() {
		for (doc_idx, doc) in docs.iter().enumerate() {
			let better = match target {
				None => true,
				Some((_, _, lowest)) => doc.similarity < lowest,
			};

			if better {
				target = Some((section_idx, doc_idx, doc.similarity));
			}
		}
	}

	match target {
		Some((section_idx, doc_idx, _)) => {
			per_category[section_idx].1.remove(doc_idx);

			true
		},
		None => false,
	}
}

fn safe_join(items: &[String]) -> String {
	if items.is_empty() { "none".to_string() } else { items.join(", ") }
}
