pub mod cache;
pub mod interest;
pub mod recommend;
pub mod sections;

use std::{
	collections::{HashMap, HashSet},
	future::Future,
	pin::Pin,
	sync::Arc,
	time::Duration,
};

use serde_json::Value;

pub use cache::{CacheKey, MemoryRecsCache, TtlPolicy};
pub use interest::{CHECKOUT_WEIGHT, LIKE_WEIGHT, VIEW_WEIGHT};
pub use recommend::RecommendResponse;
pub use sections::{HomeSection, HomeSectionsResponse};
use souk_config::Config;
use souk_domain::{
	CategoryId, ProductId, UserId,
	scoring::{InterestSignal, SignalWeights},
};
use souk_storage::{catalog, db::Db, signals};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read access to the product catalog, scoped to the queries the
/// recommendation pipeline needs. The Postgres implementation is the default
/// collaborator; tests substitute an in-memory fixture.
pub trait CatalogSource
where
	Self: Send + Sync,
{
	fn categories_for<'a>(
		&'a self,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, Option<CategoryId>>>>;

	fn in_stock_ids<'a>(
		&'a self,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<HashSet<ProductId>>>;

	fn seed_categories<'a>(
		&'a self,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<Vec<CategoryId>>>;

	fn popular_categories<'a>(
		&'a self,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<CategoryId>>>;

	fn in_categories<'a>(
		&'a self,
		categories: &'a [CategoryId],
		exclude: &'a [ProductId],
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>>;

	fn top_selling<'a>(
		&'a self,
		exclude: &'a [ProductId],
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>>;

	fn newest<'a>(
		&'a self,
		exclude: &'a [ProductId],
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>>;
}

/// Read/write access to the behavioral facts: interest rows, likes, and the
/// order/cart aggregates.
pub trait SignalSource
where
	Self: Send + Sync,
{
	fn interest_rows<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<InterestSignal>>>;

	fn interest_seed_ids<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>>;

	fn liked_ids<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>>;

	fn liked_among<'a>(
		&'a self,
		user_id: UserId,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>>;

	fn purchased_quantities<'a>(
		&'a self,
		user_id: UserId,
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, i64>>>;

	fn cancelled_quantities<'a>(
		&'a self,
		user_id: UserId,
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, i64>>>;

	fn cart_quantities<'a>(
		&'a self,
		user_id: UserId,
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, i64>>>;

	fn cart_product_ids<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>>;

	fn similar_users<'a>(
		&'a self,
		seed_ids: &'a [ProductId],
		exclude_user: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<UserId>>>;

	fn co_purchased<'a>(
		&'a self,
		user_ids: &'a [UserId],
		exclude: &'a [ProductId],
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>>;

	fn add_interest<'a>(
		&'a self,
		user_id: UserId,
		product_ids: &'a [ProductId],
		delta: i64,
	) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn toggle_like<'a>(
		&'a self,
		user_id: UserId,
		product_id: ProductId,
	) -> BoxFuture<'a, color_eyre::Result<bool>>;
}

/// The result cache. Failures on this boundary are always recoverable: a
/// failed read is a miss, a failed write is a skipped store, a failed
/// invalidation is logged. None of them surface to the caller.
pub trait RecsCache
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, color_eyre::Result<Option<Value>>>;

	fn put<'a>(
		&'a self,
		key: &'a CacheKey,
		value: Value,
		ttl: Duration,
	) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn invalidate_user<'a>(&'a self, user_id: UserId) -> BoxFuture<'a, color_eyre::Result<()>>;
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	Storage { message: String },
}

#[derive(Clone)]
pub struct Sources {
	pub catalog: Arc<dyn CatalogSource>,
	pub signals: Arc<dyn SignalSource>,
	pub cache: Arc<dyn RecsCache>,
}

pub struct SoukService {
	pub cfg: Config,
	pub sources: Sources,
}

struct PgSources {
	db: Db,
}

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::Storage { message } => write!(f, "Storage error: {message}"),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<sqlx::Error> for ServiceError {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<souk_storage::Error> for ServiceError {
	fn from(err: souk_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl CatalogSource for PgSources {
	fn categories_for<'a>(
		&'a self,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, Option<CategoryId>>>> {
		Box::pin(async move { Ok(catalog::categories_for(&self.db, ids).await?) })
	}

	fn in_stock_ids<'a>(
		&'a self,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<HashSet<ProductId>>> {
		Box::pin(async move { Ok(catalog::in_stock_ids(&self.db, ids).await?) })
	}

	fn seed_categories<'a>(
		&'a self,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<Vec<CategoryId>>> {
		Box::pin(async move { Ok(catalog::seed_categories(&self.db, ids).await?) })
	}

	fn popular_categories<'a>(
		&'a self,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<CategoryId>>> {
		Box::pin(async move { Ok(catalog::popular_categories(&self.db, cap).await?) })
	}

	fn in_categories<'a>(
		&'a self,
		categories: &'a [CategoryId],
		exclude: &'a [ProductId],
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move { Ok(catalog::in_categories(&self.db, categories, exclude, limit).await?) })
	}

	fn top_selling<'a>(
		&'a self,
		exclude: &'a [ProductId],
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move { Ok(catalog::top_selling(&self.db, exclude, limit).await?) })
	}

	fn newest<'a>(
		&'a self,
		exclude: &'a [ProductId],
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move { Ok(catalog::newest(&self.db, exclude, limit).await?) })
	}
}

impl SignalSource for PgSources {
	fn interest_rows<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<InterestSignal>>> {
		Box::pin(async move { Ok(signals::interest_rows(&self.db, user_id, cap).await?) })
	}

	fn interest_seed_ids<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move { Ok(signals::interest_seed_ids(&self.db, user_id, cap).await?) })
	}

	fn liked_ids<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move { Ok(signals::liked_ids(&self.db, user_id, cap).await?) })
	}

	fn liked_among<'a>(
		&'a self,
		user_id: UserId,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move { Ok(signals::liked_among(&self.db, user_id, ids).await?) })
	}

	fn purchased_quantities<'a>(
		&'a self,
		user_id: UserId,
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, i64>>> {
		Box::pin(async move { Ok(signals::purchased_quantities(&self.db, user_id).await?) })
	}

	fn cancelled_quantities<'a>(
		&'a self,
		user_id: UserId,
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, i64>>> {
		Box::pin(async move { Ok(signals::cancelled_quantities(&self.db, user_id).await?) })
	}

	fn cart_quantities<'a>(
		&'a self,
		user_id: UserId,
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, i64>>> {
		Box::pin(async move { Ok(signals::cart_quantities(&self.db, user_id).await?) })
	}

	fn cart_product_ids<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move { Ok(signals::cart_product_ids(&self.db, user_id, cap).await?) })
	}

	fn similar_users<'a>(
		&'a self,
		seed_ids: &'a [ProductId],
		exclude_user: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<UserId>>> {
		Box::pin(
			async move { Ok(signals::similar_users(&self.db, seed_ids, exclude_user, cap).await?) },
		)
	}

	fn co_purchased<'a>(
		&'a self,
		user_ids: &'a [UserId],
		exclude: &'a [ProductId],
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move { Ok(signals::co_purchased(&self.db, user_ids, exclude, cap).await?) })
	}

	fn add_interest<'a>(
		&'a self,
		user_id: UserId,
		product_ids: &'a [ProductId],
		delta: i64,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move { Ok(signals::add_interest(&self.db, user_id, product_ids, delta).await?) })
	}

	fn toggle_like<'a>(
		&'a self,
		user_id: UserId,
		product_id: ProductId,
	) -> BoxFuture<'a, color_eyre::Result<bool>> {
		Box::pin(async move { Ok(signals::toggle_like(&self.db, user_id, product_id).await?) })
	}
}

impl Sources {
	pub fn new(
		catalog: Arc<dyn CatalogSource>,
		signals: Arc<dyn SignalSource>,
		cache: Arc<dyn RecsCache>,
	) -> Self {
		Self { catalog, signals, cache }
	}

	/// The default wiring: Postgres for facts and catalog, an in-process map
	/// for the result cache.
	pub fn postgres(db: Db) -> Self {
		let pg = Arc::new(PgSources { db });

		Self { catalog: pg.clone(), signals: pg, cache: Arc::new(MemoryRecsCache::new()) }
	}
}

impl SoukService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, sources: Sources::postgres(db) }
	}

	pub fn with_sources(cfg: Config, sources: Sources) -> Self {
		Self { cfg, sources }
	}

	pub(crate) fn weights(&self) -> SignalWeights {
		SignalWeights {
			like: self.cfg.recs.like_weight,
			purchase: self.cfg.recs.purchase_weight,
			cart: self.cfg.recs.cart_weight,
			cancelled: self.cfg.recs.cancelled_weight,
		}
	}

	pub(crate) fn ttl_policy(&self) -> TtlPolicy {
		TtlPolicy::from_config(&self.cfg.recs.cache)
	}

	/// Evicts every cached entry for a user. Best effort: a cache that
	/// cannot invalidate degrades to TTL expiry.
	pub(crate) async fn invalidate_subject(&self, user_id: UserId) {
		if let Err(err) = self.sources.cache.invalidate_user(user_id).await {
			tracing::warn!(user_id, error = %err, "Failed to invalidate cached recommendations.");
		}
	}
}
