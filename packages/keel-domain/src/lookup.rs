use std::sync::LazyLock;

use regex::Regex;

static CALL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\bcall_\d{4}_\d{2}_\d{2}_[0-9a-f]{6}\b").expect("call id pattern must compile")
});
static LAST_N_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\blast\s+(\d{1,3})\s+(?:call|calls|analysis|analyses|record|records)\b")
		.expect("recency pattern must compile")
});
static LATEST_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(?:latest|most\s+recent|last)\s+(?:call|analysis|record)\b")
		.expect("latest pattern must compile")
});

/// A question reference that bypasses vector search for the calls source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectLookup {
	/// An exact record identifier appearing verbatim in the question.
	CallId(String),
	/// "last N calls" style recency reference; N is clamped by the caller.
	Recent(usize),
}

/// Recognizers are evaluated in this fixed priority order; the first match
/// wins. An identifier reference beats a recency phrase so a question naming
/// both fetches the named record.
pub fn detect(question: &str) -> Option<DirectLookup> {
	const MATCHERS: [fn(&str) -> Option<DirectLookup>; 3] =
		[match_call_id, match_last_n, match_latest];

	MATCHERS.iter().find_map(|matcher| matcher(question))
}

fn match_call_id(question: &str) -> Option<DirectLookup> {
	CALL_ID_RE.find(question).map(|m| DirectLookup::CallId(m.as_str().to_string()))
}

fn match_last_n(question: &str) -> Option<DirectLookup> {
	let captures = LAST_N_RE.captures(question)?;
	let count = captures.get(1)?.as_str().parse::<usize>().ok()?;

	if count == 0 { None } else { Some(DirectLookup::Recent(count)) }
}

fn match_latest(question: &str) -> Option<DirectLookup> {
	LATEST_RE.is_match(question).then_some(DirectLookup::Recent(1))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn matches_exact_call_id() {
		let lookup = detect("What did call_2026_02_09_a1b2c3 conclude?");

		assert_eq!(lookup, Some(DirectLookup::CallId("call_2026_02_09_a1b2c3".to_string())));
	}

	#[test]
	fn call_id_beats_recency_phrase() {
		let lookup = detect("Compare call_2026_02_09_a1b2c3 with the last 5 calls");

		assert_eq!(lookup, Some(DirectLookup::CallId("call_2026_02_09_a1b2c3".to_string())));
	}

	#[test]
	fn matches_last_n_phrases() {
		assert_eq!(detect("summarize the last 5 calls"), Some(DirectLookup::Recent(5)));
		assert_eq!(detect("Show the LAST 12 analyses"), Some(DirectLookup::Recent(12)));
	}

	#[test]
	fn matches_latest_without_a_number() {
		assert_eq!(detect("what happened on the latest call?"), Some(DirectLookup::Recent(1)));
		assert_eq!(detect("the most recent analysis, please"), Some(DirectLookup::Recent(1)));
	}

	#[test]
	fn ignores_semantic_questions() {
		assert_eq!(detect("which fraud patterns involve conditional promises?"), None);
		assert_eq!(detect("last week we saw odd behavior"), None);
	}

	#[test]
	fn rejects_zero_count() {
		assert_eq!(detect("the last 0 calls"), None);
	}
}
