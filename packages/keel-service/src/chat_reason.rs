use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::KeelService;

/// Deterministic refusal used when retrieval yields zero evidence; the
/// generation provider is not consulted in that case.
pub(crate) const INSUFFICIENT_INFORMATION: &str =
	"I don't have enough information in the knowledge base to answer that.";

/// Degraded-mode answer when the provider cannot produce a valid reply after
/// retry. Explicit by design: the engine never returns a silent empty answer.
pub(crate) const ASSISTANT_UNAVAILABLE: &str = "The knowledge assistant is temporarily \
	unavailable, so this question could not be grounded. Please try again in a moment.";

pub(crate) const CHAT_PREAMBLE: &str = "\
You are a financial compliance knowledge assistant. You answer questions
about fraud patterns, compliance rules, risk heuristics, and call analysis
data by grounding your answers in the retrieved documents provided.

RULES:
- Answer ONLY based on the provided retrieved knowledge and call data
- If the retrieved documents don't contain the answer, say \"I don't have
  enough information in the knowledge base to answer that.\"
- Cite specific document titles and ids (e.g. [fp_001]) when referencing
  knowledge; reference call records by their call id
- You may use the conversation history for continuity, but never invent
  prior turns that were not supplied
- Use clear, professional language appropriate for compliance teams
- Do NOT invent patterns or rules not present in the retrieved documents
- Do NOT use accusatory language (\"fraudster\", \"liar\", \"criminal\")
- Keep answers concise but thorough

You MUST return a JSON object with:
- answer: your grounded response text citing specific documents
- source_ids: array of doc_id or call_id strings you referenced in the answer

Return ONLY the JSON object, no markdown fencing or extra text.";

const STRICT_RETRY_NOTE: &str = "\
Your previous reply violated the output contract. Return ONLY a JSON object
with exactly two fields: answer (a non-empty string) and source_ids (an array
of strings, each one a doc_id or call_id that appears in the provided
context). No markdown fencing, no additional keys.";

#[derive(Debug)]
pub(crate) struct ChatAnswer {
	pub answer: String,
	pub source_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
	answer: String,
	#[serde(default)]
	source_ids: Vec<String>,
}

impl KeelService {
	/// Same discipline as the grounding reasoner: one retry with a stricter
	/// restatement, then the explicit degraded answer. Citations must name
	/// sources that were actually retrieved.
	pub(crate) async fn run_chat_reasoning(
		&self,
		context: &str,
		allowed_ids: &[String],
	) -> ChatAnswer {
		let cfg = &self.cfg.providers.llm;
		let mut messages = vec![
			json!({ "role": "system", "content": CHAT_PREAMBLE }),
			json!({ "role": "user", "content": context }),
		];

		for attempt in 0..2u8 {
			match self.deps.generation.complete(cfg, &messages).await {
				Ok(raw) => match parse_chat_answer(&raw, allowed_ids) {
					Ok(answer) => return answer,
					Err(reason) => {
						warn!(attempt, %reason, "Chat reasoner output rejected.");

						messages.push(json!({ "role": "assistant", "content": raw }));
						messages.push(json!({ "role": "user", "content": STRICT_RETRY_NOTE }));
					},
				},
				Err(err) => {
					warn!(attempt, %err, "Generation provider failed.");
				},
			}
		}

		warn!("Chat reasoning degraded to the unavailable answer.");

		ChatAnswer { answer: ASSISTANT_UNAVAILABLE.to_string(), source_ids: vec![] }
	}
}

pub(crate) fn parse_chat_answer(raw: &str, allowed_ids: &[String]) -> Result<ChatAnswer, String> {
	let reply: ChatReply =
		serde_json::from_str(raw).map_err(|err| format!("invalid JSON: {err}"))?;

	if reply.answer.trim().is_empty() {
		return Err("answer is empty".to_string());
	}
	if let Some(unknown) =
		reply.source_ids.iter().find(|id| !allowed_ids.iter().any(|allowed| allowed == *id))
	{
		return Err(format!("source id {unknown} was not retrieved"));
	}

	Ok(ChatAnswer { answer: reply.answer, source_ids: reply.source_ids })
}
