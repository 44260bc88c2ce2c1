use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use souk_config::Error;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with<F>(mutate: F) -> String
where
	F: FnOnce(&mut toml::Table),
{
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let root = value.as_table_mut().expect("Template config must be a table.");

	mutate(root);

	toml::to_string(&value).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("souk_config_test_{pid}_{nanos}_{ordinal}.toml"));
	fs::write(&path, payload).expect("Failed to write temp config.");

	path
}

fn recs_table(root: &mut toml::Table) -> &mut toml::Table {
	root.get_mut("recs")
		.and_then(Value::as_table_mut)
		.expect("Template config must include [recs].")
}

#[test]
fn loads_sample_config() {
	let path = write_temp_config(sample_toml_with(|_| {}));
	let cfg = souk_config::load(&path).expect("Sample config must load.");

	assert_eq!(cfg.recs.half_life_days, 14.0);
	assert_eq!(cfg.recs.like_weight, 8.0);
	assert_eq!(cfg.recs.max_per_category, 2);
	assert_eq!(cfg.recs.cache.user_ttl_secs, 600);
	assert_eq!(cfg.recs.cache.anon_ttl_secs, 300);
	assert_eq!(cfg.recs.cache.section_ttl_secs, 120);
	assert!(!cfg.observability.recs_obs);

	let _ = fs::remove_file(path);
}

#[test]
fn defaults_fill_missing_recs_fields() {
	let path = write_temp_config(sample_toml_with(|root| {
		root.remove("recs");
		root.insert("recs".to_string(), Value::Table(toml::Table::new()));
	}));
	let cfg = souk_config::load(&path).expect("Config with empty [recs] must load.");

	assert_eq!(cfg.recs.purchase_weight, 5.0);
	assert_eq!(cfg.recs.cart_weight, 2.0);
	assert_eq!(cfg.recs.interest_rows_cap, 200);
	assert_eq!(cfg.recs.liked_cap, 500);
	assert_eq!(cfg.recs.cache.section_ttl_secs, 120);

	let _ = fs::remove_file(path);
}

#[test]
fn rejects_zero_half_life() {
	let path = write_temp_config(sample_toml_with(|root| {
		recs_table(root).insert("half_life_days".to_string(), Value::Float(0.0));
	}));
	let err = souk_config::load(&path).expect_err("Zero half-life must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));

	let _ = fs::remove_file(path);
}

#[test]
fn rejects_negative_weight() {
	let path = write_temp_config(sample_toml_with(|root| {
		recs_table(root).insert("cancelled_weight".to_string(), Value::Float(-1.0));
	}));
	let err = souk_config::load(&path).expect_err("Negative weight must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));

	let _ = fs::remove_file(path);
}

#[test]
fn rejects_zero_diversity_cap() {
	let path = write_temp_config(sample_toml_with(|root| {
		recs_table(root).insert("max_per_category".to_string(), Value::Integer(0));
	}));
	let err = souk_config::load(&path).expect_err("Zero diversity cap must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));

	let _ = fs::remove_file(path);
}

#[test]
fn rejects_zero_cache_ttl() {
	let path = write_temp_config(sample_toml_with(|root| {
		let cache = recs_table(root)
			.get_mut("cache")
			.and_then(Value::as_table_mut)
			.expect("Template config must include [recs.cache].");

		cache.insert("anon_ttl_secs".to_string(), Value::Integer(0));
	}));
	let err = souk_config::load(&path).expect_err("Zero cache TTL must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));

	let _ = fs::remove_file(path);
}

#[test]
fn rejects_empty_dsn() {
	let path = write_temp_config(sample_toml_with(|root| {
		let postgres = root
			.get_mut("storage")
			.and_then(Value::as_table_mut)
			.and_then(|storage| storage.get_mut("postgres"))
			.and_then(Value::as_table_mut)
			.expect("Template config must include [storage.postgres].");

		postgres.insert("dsn".to_string(), Value::String(String::new()));
	}));
	let err = souk_config::load(&path).expect_err("Empty DSN must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));

	let _ = fs::remove_file(path);
}

#[test]
fn normalizes_blank_log_level() {
	let path = write_temp_config(sample_toml_with(|root| {
		let service = root
			.get_mut("service")
			.and_then(Value::as_table_mut)
			.expect("Template config must include [service].");

		service.insert("log_level".to_string(), Value::String("  ".to_string()));
	}));
	let cfg = souk_config::load(&path).expect("Blank log level must normalize.");

	assert_eq!(cfg.service.log_level, "info");

	let _ = fs::remove_file(path);
}
