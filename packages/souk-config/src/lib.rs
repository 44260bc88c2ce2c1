mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Observability, Postgres, Recs, RecsCacheTtl, Service, Storage};

use std::{fs, path::Path};

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
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if !cfg.recs.half_life_days.is_finite() || cfg.recs.half_life_days <= 0.0 {
		return Err(Error::Validation {
			message: "recs.half_life_days must be a positive finite number.".to_string(),
		});
	}

	for (label, weight) in [
		("like_weight", cfg.recs.like_weight),
		("purchase_weight", cfg.recs.purchase_weight),
		("cart_weight", cfg.recs.cart_weight),
		("cancelled_weight", cfg.recs.cancelled_weight),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("recs.{label} must be a finite number."),
			});
		}
		if weight < 0.0 {
			return Err(Error::Validation {
				message: format!("recs.{label} must be zero or greater."),
			});
		}
	}

	if cfg.recs.max_per_category == 0 {
		return Err(Error::Validation {
			message: "recs.max_per_category must be greater than zero.".to_string(),
		});
	}

	for (label, cap) in [
		("interest_rows_cap", cfg.recs.interest_rows_cap),
		("liked_cap", cfg.recs.liked_cap),
		("similar_users_cap", cfg.recs.similar_users_cap),
	] {
		if cap == 0 {
			return Err(Error::Validation {
				message: format!("recs.{label} must be greater than zero."),
			});
		}
	}

	for (label, ttl) in [
		("user_ttl_secs", cfg.recs.cache.user_ttl_secs),
		("anon_ttl_secs", cfg.recs.cache.anon_ttl_secs),
		("section_ttl_secs", cfg.recs.cache.section_ttl_secs),
	] {
		if ttl == 0 {
			return Err(Error::Validation {
				message: format!("recs.cache.{label} must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
