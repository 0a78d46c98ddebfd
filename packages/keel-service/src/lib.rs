pub mod admin;
pub mod analyze;
pub mod chat;
pub mod records;
pub mod time_serde;

mod audit;
mod chat_context;
mod chat_reason;
mod context;
mod reason;
mod retrieval;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

pub use admin::{SeedReport, SeedRequest};
pub use analyze::AnalyzeResponse;
pub use chat::{ChatFilters, ChatMetadata, ChatRequest, ChatResponse, ChatSource, SourceType};
pub use records::{CallView, StatusUpdateResponse};

use keel_config::{Audit, Config, EmbeddingProviderConfig, LlmProviderConfig};
use keel_domain::KnowledgeCategory;
use keel_providers::{audit as audit_client, embedding, generation};
use keel_storage::{
	db::Db,
	models::{CallRecord, KnowledgeDoc, RetrievedCall, RetrievedDoc},
	qdrant::QdrantStore,
	queries,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String, fields: Vec<String> },
	#[error("Dependency failure: {message}")]
	Dependency { message: String },
	#[error("Knowledge base is not seeded yet.")]
	NotReady,
	#[error("Not found: {message}")]
	NotFound { message: String },
}

impl From<keel_storage::Error> for Error {
	fn from(err: keel_storage::Error) -> Self {
		match err {
			keel_storage::Error::NotFound(message) => Self::NotFound { message },
			keel_storage::Error::InvalidArgument(message) =>
				Self::InvalidRequest { message, fields: vec![] },
			other => Self::Dependency { message: other.to_string() },
		}
	}
}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Dependency { message: err.to_string() }
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Dependency { message: err.to_string() }
	}
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait AuditSink
where
	Self: Send + Sync,
{
	fn create_thread<'a>(&'a self, call_id: &'a str) -> BoxFuture<'a, color_eyre::Result<String>>;
	fn append<'a>(
		&'a self,
		thread_id: &'a str,
		label: &'a str,
		content: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>>;
	fn fetch<'a>(&'a self, thread_id: &'a str) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

pub trait RecordStore
where
	Self: Send + Sync,
{
	fn insert<'a>(&'a self, record: &'a CallRecord) -> BoxFuture<'a, keel_storage::Result<()>>;
	fn fetch<'a>(
		&'a self,
		call_id: &'a str,
	) -> BoxFuture<'a, keel_storage::Result<Option<CallRecord>>>;
	fn set_assessment<'a>(
		&'a self,
		call_id: &'a str,
		assessment: &'a Value,
		status: &'a str,
	) -> BoxFuture<'a, keel_storage::Result<()>>;
	fn set_audit_thread<'a>(
		&'a self,
		call_id: &'a str,
		thread_id: &'a str,
	) -> BoxFuture<'a, keel_storage::Result<()>>;
	fn update_status<'a>(
		&'a self,
		call_id: &'a str,
		status: &'a str,
	) -> BoxFuture<'a, keel_storage::Result<()>>;
	fn recent<'a>(&'a self, limit: i64) -> BoxFuture<'a, keel_storage::Result<Vec<CallRecord>>>;
}

pub trait KnowledgeIndex
where
	Self: Send + Sync,
{
	fn count<'a>(&'a self) -> BoxFuture<'a, keel_storage::Result<u64>>;
	fn upsert<'a>(
		&'a self,
		doc: &'a KnowledgeDoc,
		vector: Vec<f32>,
	) -> BoxFuture<'a, keel_storage::Result<()>>;
	fn search<'a>(
		&'a self,
		category: KnowledgeCategory,
		vector: Vec<f32>,
		limit: u64,
	) -> BoxFuture<'a, keel_storage::Result<Vec<RetrievedDoc>>>;
}

pub trait CallIndex
where
	Self: Send + Sync,
{
	fn upsert<'a>(
		&'a self,
		call_id: &'a str,
		vector: Vec<f32>,
		summary: &'a str,
		risk_score: i64,
		fraud_likelihood: &'a str,
	) -> BoxFuture<'a, keel_storage::Result<()>>;
	fn search<'a>(
		&'a self,
		vector: Vec<f32>,
		limit: u64,
	) -> BoxFuture<'a, keel_storage::Result<Vec<RetrievedCall>>>;
}

/// Every external dependency behind one injection seam. Handles are read-only
/// after construction and shared across concurrent requests.
#[derive(Clone)]
pub struct Deps {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
	pub records: Arc<dyn RecordStore>,
	pub knowledge: Arc<dyn KnowledgeIndex>,
	pub calls: Arc<dyn CallIndex>,
	pub audit: Option<Arc<dyn AuditSink>>,
}

pub struct KeelService {
	pub cfg: Config,
	pub deps: Deps,
}

impl KeelService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		let provider = Arc::new(DefaultProviders);
		let qdrant = Arc::new(qdrant);
		let audit: Option<Arc<dyn AuditSink>> = cfg
			.audit
			.clone()
			.map(|audit_cfg| Arc::new(DefaultAudit { cfg: audit_cfg }) as Arc<dyn AuditSink>);
		let deps = Deps {
			embedding: provider.clone(),
			generation: provider,
			records: Arc::new(db),
			knowledge: qdrant.clone(),
			calls: qdrant,
			audit,
		};

		Self { cfg, deps }
	}

	pub fn with_deps(cfg: Config, deps: Deps) -> Self {
		Self { cfg, deps }
	}

	/// Embedding with the pipeline-wide retry policy: exactly one retry, then
	/// the failure surfaces. Never fabricates a vector.
	pub(crate) async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>> {
		let cfg = &self.cfg.providers.embedding;

		match self.deps.embedding.embed(cfg, text).await {
			Ok(vector) => check_dimensions(vector, cfg.dimensions),
			Err(err) => {
				tracing::warn!(%err, "Embedding attempt failed, retrying once.");

				match self.deps.embedding.embed(cfg, text).await {
					Ok(vector) => check_dimensions(vector, cfg.dimensions),
					Err(err) => Err(Error::Dependency {
						message: format!("embedding failed after retry: {err}"),
					}),
				}
			},
		}
	}
}

fn check_dimensions(vector: Vec<f32>, dimensions: u32) -> Result<Vec<f32>> {
	if vector.len() == dimensions as usize {
		Ok(vector)
	} else {
		Err(Error::Dependency {
			message: format!("embedding has {} dimensions, expected {dimensions}", vector.len()),
		})
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(embedding::embed(cfg, text))
	}
}

impl GenerationProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(generation::complete(cfg, messages))
	}
}

struct DefaultAudit {
	cfg: Audit,
}

impl AuditSink for DefaultAudit {
	fn create_thread<'a>(&'a self, call_id: &'a str) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(audit_client::create_thread(&self.cfg, call_id))
	}

	fn append<'a>(
		&'a self,
		thread_id: &'a str,
		label: &'a str,
		content: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(audit_client::append(&self.cfg, thread_id, label, content))
	}

	fn fetch<'a>(&'a self, thread_id: &'a str) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(audit_client::fetch(&self.cfg, thread_id))
	}
}

impl RecordStore for Db {
	fn insert<'a>(&'a self, record: &'a CallRecord) -> BoxFuture<'a, keel_storage::Result<()>> {
		Box::pin(queries::insert_call(self, record))
	}

	fn fetch<'a>(
		&'a self,
		call_id: &'a str,
	) -> BoxFuture<'a, keel_storage::Result<Option<CallRecord>>> {
		Box::pin(queries::fetch_call(self, call_id))
	}

	fn set_assessment<'a>(
		&'a self,
		call_id: &'a str,
		assessment: &'a Value,
		status: &'a str,
	) -> BoxFuture<'a, keel_storage::Result<()>> {
		Box::pin(queries::set_assessment(self, call_id, assessment, status))
	}

	fn set_audit_thread<'a>(
		&'a self,
		call_id: &'a str,
		thread_id: &'a str,
	) -> BoxFuture<'a, keel_storage::Result<()>> {
		Box::pin(queries::set_audit_thread(self, call_id, thread_id))
	}

	fn update_status<'a>(
		&'a self,
		call_id: &'a str,
		status: &'a str,
	) -> BoxFuture<'a, keel_storage::Result<()>> {
		Box::pin(queries::update_status(self, call_id, status))
	}

	fn recent<'a>(&'a self, limit: i64) -> BoxFuture<'a, keel_storage::Result<Vec<CallRecord>>> {
		Box::pin(queries::recent_calls(self, limit))
	}
}

impl KnowledgeIndex for QdrantStore {
	fn count<'a>(&'a self) -> BoxFuture<'a, keel_storage::Result<u64>> {
		Box::pin(self.knowledge_count())
	}

	fn upsert<'a>(
		&'a self,
		doc: &'a KnowledgeDoc,
		vector: Vec<f32>,
	) -> BoxFuture<'a, keel_storage::Result<()>> {
		Box::pin(self.upsert_knowledge(doc, vector))
	}

	fn search<'a>(
		&'a self,
		category: KnowledgeCategory,
		vector: Vec<f32>,
		limit: u64,
	) -> BoxFuture<'a, keel_storage::Result<Vec<RetrievedDoc>>> {
		Box::pin(self.search_knowledge(category.as_str(), vector, limit))
	}
}

impl CallIndex for QdrantStore {
	fn upsert<'a>(
		&'a self,
		call_id: &'a str,
		vector: Vec<f32>,
		summary: &'a str,
		risk_score: i64,
		fraud_likelihood: &'a str,
	) -> BoxFuture<'a, keel_storage::Result<()>> {
		Box::pin(self.upsert_call(call_id, vector, summary, risk_score, fraud_likelihood))
	}

	fn search<'a>(
		&'a self,
		vector: Vec<f32>,
		limit: u64,
	) -> BoxFuture<'a, keel_storage::Result<Vec<RetrievedCall>>> {
		Box::pin(self.search_calls(vector, limit))
	}
}
