pub mod assessment;
pub mod call_id;
pub mod category;
pub mod conversation;
pub mod lookup;
pub mod signal;
pub mod status;

pub use assessment::{GroundedAssessment, RecommendedAction, RiskLabel};
pub use category::KnowledgeCategory;
pub use conversation::{ConversationTurn, TurnRole};
pub use lookup::DirectLookup;
pub use signal::{CallRiskInput, FieldViolation};
pub use status::CallStatus;
