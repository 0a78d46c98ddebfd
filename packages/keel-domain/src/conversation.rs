use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
	User,
	Assistant,
}

impl TurnRole {
	pub fn display_name(self) -> &'static str {
		match self {
			Self::User => "User",
			Self::Assistant => "Assistant",
		}
	}
}

/// One caller-supplied message of the running conversation. Never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
	pub role: TurnRole,
	pub content: String,
}

/// Keeps the newest `cap` turns, dropping the oldest first.
pub fn truncated(turns: &[ConversationTurn], cap: usize) -> &[ConversationTurn] {
	&turns[turns.len().saturating_sub(cap)..]
}
