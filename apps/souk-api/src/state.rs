use std::sync::Arc;

use souk_service::SoukService;
use souk_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SoukService>,
}
impl AppState {
	pub async fn new(config: souk_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let service = SoukService::new(config, db);

		Ok(Self { service: Arc::new(service) })
	}
}
