use serde::{Deserialize, Serialize};

use crate::assessment::RecommendedAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
	Open,
	InReview,
	Escalated,
	Resolved,
}

impl CallStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Open => "open",
			Self::InReview => "in_review",
			Self::Escalated => "escalated",
			Self::Resolved => "resolved",
		}
	}
}

/// Action-to-status decision table, the primary mapping. Returns `None` for
/// actions without a mapping so the precedence rule over the score-bucket
/// fallback stays explicit; today the table is total.
pub fn action_status(action: RecommendedAction) -> Option<CallStatus> {
	match action {
		RecommendedAction::AutoClear => Some(CallStatus::Resolved),
		RecommendedAction::FlagForReview | RecommendedAction::ManualReview =>
			Some(CallStatus::InReview),
		RecommendedAction::EscalateToCompliance => Some(CallStatus::Escalated),
	}
}

/// Risk-score-bucket fallback. Boundaries are configurable because the
/// planning sources disagree on them; the policy only applies when no action
/// mapping exists.
pub fn score_bucket_status(score: u8, policy: &keel_config::StatusPolicy) -> CallStatus {
	if score <= policy.score_low_max {
		CallStatus::Resolved
	} else if score <= policy.score_medium_max {
		CallStatus::InReview
	} else {
		CallStatus::Escalated
	}
}

pub fn initial_status(
	action: RecommendedAction,
	risk_score: u8,
	policy: &keel_config::StatusPolicy,
) -> CallStatus {
	action_status(action).unwrap_or_else(|| score_bucket_status(risk_score, policy))
}
