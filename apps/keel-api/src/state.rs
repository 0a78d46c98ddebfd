use std::sync::Arc;

use keel_service::KeelService;
use keel_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<KeelService>,
}
impl AppState {
	pub async fn new(config: keel_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collections().await?;

		let service = KeelService::new(config, db, qdrant);

		Ok(Self { service: Arc::new(service) })
	}

	pub fn from_service(service: KeelService) -> Self {
		Self { service: Arc::new(service) }
	}
}
