mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Audit, Chat, Config, Context, EmbeddingProviderConfig, LlmProviderConfig, Postgres, Providers,
	Qdrant, Retrieval, Service, StatusPolicy, Storage,
};

use std::{fs, path::Path};

const RETRIEVAL_LIMIT_MAX: u32 = 10;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation { message: "service.http_bind must be non-empty.".to_string() });
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}

	for (name, limit) in [
		("retrieval.fraud_pattern_limit", cfg.retrieval.fraud_pattern_limit),
		("retrieval.compliance_limit", cfg.retrieval.compliance_limit),
		("retrieval.risk_heuristic_limit", cfg.retrieval.risk_heuristic_limit),
		("chat.knowledge_limit", cfg.chat.knowledge_limit),
		("chat.calls_limit", cfg.chat.calls_limit),
	] {
		if limit == 0 || limit > RETRIEVAL_LIMIT_MAX {
			return Err(Error::Validation {
				message: format!("{name} must be in the range 1-{RETRIEVAL_LIMIT_MAX}."),
			});
		}
	}

	if cfg.retrieval.category_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "retrieval.category_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.retrieval.similarity_floor) {
		return Err(Error::Validation {
			message: "retrieval.similarity_floor must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.context.max_chars == 0 {
		return Err(Error::Validation {
			message: "context.max_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chat.min_question_chars == 0 {
		return Err(Error::Validation {
			message: "chat.min_question_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chat.history_turns == 0 {
		return Err(Error::Validation {
			message: "chat.history_turns must be greater than zero.".to_string(),
		});
	}
	if cfg.chat.recency_max == 0 {
		return Err(Error::Validation {
			message: "chat.recency_max must be greater than zero.".to_string(),
		});
	}
	if cfg.status.score_low_max >= cfg.status.score_medium_max {
		return Err(Error::Validation {
			message: "status.score_low_max must be below status.score_medium_max.".to_string(),
		});
	}
	if cfg.status.score_medium_max >= 100 {
		return Err(Error::Validation {
			message: "status.score_medium_max must be below 100.".to_string(),
		});
	}

	if let Some(audit) = &cfg.audit {
		if audit.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "audit.api_base must be non-empty when [audit] is present.".to_string(),
			});
		}
		if audit.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "audit.timeout_ms must be greater than zero.".to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	// An [audit] section with a blank key is treated as absent so operators can
	// keep the section in place while credentials are unset.
	if cfg.audit.as_ref().map(|audit| audit.api_key.trim().is_empty()).unwrap_or(false) {
		cfg.audit = None;
	}
}
