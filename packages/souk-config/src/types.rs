use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub recs: Recs,
	#[serde(default)]
	pub observability: Observability,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// Weights and caps for the recommendation pipeline. Defaults mirror the
/// production tuning: likes are the strongest single signal, purchases
/// outweigh cart intent, cancellations subtract.
#[derive(Debug, Clone, Deserialize)]
pub struct Recs {
	#[serde(default = "default_half_life_days")]
	pub half_life_days: f64,
	#[serde(default = "default_like_weight")]
	pub like_weight: f64,
	#[serde(default = "default_purchase_weight")]
	pub purchase_weight: f64,
	#[serde(default = "default_cart_weight")]
	pub cart_weight: f64,
	#[serde(default = "default_cancelled_weight")]
	pub cancelled_weight: f64,
	#[serde(default = "default_max_per_category")]
	pub max_per_category: u32,
	#[serde(default = "default_interest_rows_cap")]
	pub interest_rows_cap: u32,
	#[serde(default = "default_liked_cap")]
	pub liked_cap: u32,
	#[serde(default = "default_similar_users_cap")]
	pub similar_users_cap: u32,
	#[serde(default)]
	pub cache: RecsCacheTtl,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecsCacheTtl {
	#[serde(default = "default_user_ttl_secs")]
	pub user_ttl_secs: u64,
	#[serde(default = "default_anon_ttl_secs")]
	pub anon_ttl_secs: u64,
	#[serde(default = "default_section_ttl_secs")]
	pub section_ttl_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Observability {
	/// Emits per-stage pipeline diagnostics when true. Purely additive; never
	/// changes control flow or output.
	#[serde(default)]
	pub recs_obs: bool,
}

impl Default for RecsCacheTtl {
	fn default() -> Self {
		Self {
			user_ttl_secs: default_user_ttl_secs(),
			anon_ttl_secs: default_anon_ttl_secs(),
			section_ttl_secs: default_section_ttl_secs(),
		}
	}
}

fn default_half_life_days() -> f64 {
	14.0
}

fn default_like_weight() -> f64 {
	8.0
}

fn default_purchase_weight() -> f64 {
	5.0
}

fn default_cart_weight() -> f64 {
	2.0
}

fn default_cancelled_weight() -> f64 {
	3.0
}

fn default_max_per_category() -> u32 {
	2
}

fn default_interest_rows_cap() -> u32 {
	200
}

fn default_liked_cap() -> u32 {
	500
}

fn default_similar_users_cap() -> u32 {
	200
}

fn default_user_ttl_secs() -> u64 {
	600
}

fn default_anon_ttl_secs() -> u64 {
	300
}

fn default_section_ttl_secs() -> u64 {
	120
}
