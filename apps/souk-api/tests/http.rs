use axum::{
	body::{self, Body},
	http::{Request, StatusCode},
};
use tower::util::ServiceExt;

use souk_api::{routes, state::AppState};
use souk_config::{Config, Observability, Postgres, Recs, RecsCacheTtl, Service, Storage};
use souk_testkit::TestDatabase;

fn test_config(dsn: String) -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage { postgres: Postgres { dsn, pool_max_conns: 2 } },
		recs: Recs {
			half_life_days: 14.0,
			like_weight: 8.0,
			purchase_weight: 5.0,
			cart_weight: 2.0,
			cancelled_weight: 3.0,
			max_per_category: 2,
			interest_rows_cap: 200,
			liked_cap: 500,
			similar_users_cap: 200,
			cache: RecsCacheTtl { user_ttl_secs: 600, anon_ttl_secs: 300, section_ttl_secs: 120 },
		},
		observability: Observability::default(),
	}
}

async fn test_env() -> Option<TestDatabase> {
	let base_dsn = match souk_testkit::env_dsn() {
		Some(value) => value,
		None => {
			eprintln!("Skipping HTTP tests; set SOUK_PG_DSN to run this test.");

			return None;
		},
	};

	Some(TestDatabase::new(&base_dsn).await.expect("Failed to create test database."))
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SOUK_PG_DSN to run."]
async fn health_ok() {
	let Some(test_db) = test_env().await else {
		return;
	};
	let config = test_config(test_db.dsn().to_string());
	let state = AppState::new(config).await.expect("Failed to initialize app state.");
	let app = routes::router(state);
	let response = app
		.oneshot(
			Request::builder()
				.uri("/health")
				.body(Body::empty())
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SOUK_PG_DSN to run."]
async fn anonymous_recommendations_over_a_seeded_catalog() {
	let Some(test_db) = test_env().await else {
		return;
	};
	let config = test_config(test_db.dsn().to_string());
	let state = AppState::new(config).await.expect("Failed to initialize app state.");

	sqlx::query(
		"\
INSERT INTO products (id, name, slug, quantity, category_id)
VALUES
	(1, 'Kettle', 'kettle', 5, NULL),
	(2, 'Lamp', 'lamp', 3, NULL),
	(3, 'Mug', 'mug', 0, NULL)",
	)
	.execute(&sqlx::PgPool::connect(test_db.dsn()).await.expect("Failed to connect."))
	.await
	.expect("Failed to seed products.");

	let app = routes::router(state);
	let response = app
		.oneshot(
			Request::builder()
				.uri("/v1/recommendations?n=5")
				.body(Body::empty())
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /v1/recommendations.");

	assert_eq!(response.status(), StatusCode::OK);

	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let value: serde_json::Value =
		serde_json::from_slice(&bytes).expect("Response is not valid JSON.");
	let ids: Vec<i64> = value["ids"]
		.as_array()
		.expect("ids must be an array.")
		.iter()
		.map(|id| id.as_i64().expect("ids must be integers."))
		.collect();

	assert!(!ids.is_empty());
	assert!(!ids.contains(&3), "out-of-stock product returned: {ids:?}");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SOUK_PG_DSN to run."]
async fn anonymous_like_toggle_is_rejected() {
	let Some(test_db) = test_env().await else {
		return;
	};
	let config = test_config(test_db.dsn().to_string());
	let state = AppState::new(config).await.expect("Failed to initialize app state.");
	let app = routes::router(state);
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/v1/likes/toggle")
				.header("content-type", "application/json")
				.body(Body::from(r#"{"product_id":1}"#))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /v1/likes/toggle.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let value: serde_json::Value =
		serde_json::from_slice(&bytes).expect("Response is not valid JSON.");

	assert_eq!(value["error_code"], "invalid_request");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SOUK_PG_DSN to run."]
async fn authenticated_like_toggle_round_trips() {
	let Some(test_db) = test_env().await else {
		return;
	};
	let config = test_config(test_db.dsn().to_string());
	let state = AppState::new(config).await.expect("Failed to initialize app state.");

	sqlx::query("INSERT INTO products (id, name, slug, quantity) VALUES (1, 'Kettle', 'kettle', 5)")
		.execute(&sqlx::PgPool::connect(test_db.dsn()).await.expect("Failed to connect."))
		.await
		.expect("Failed to seed products.");

	let app = routes::router(state);

	for expected in [true, false] {
		let response = app
			.clone()
			.oneshot(
				Request::builder()
					.method("POST")
					.uri("/v1/likes/toggle")
					.header("content-type", "application/json")
					.header(routes::USER_ID_HEADER, "7")
					.body(Body::from(r#"{"product_id":1}"#))
					.expect("Failed to build request."),
			)
			.await
			.expect("Failed to call /v1/likes/toggle.");

		assert_eq!(response.status(), StatusCode::OK);

		let bytes = body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("Failed to read response body.");
		let value: serde_json::Value =
			serde_json::from_slice(&bytes).expect("Response is not valid JSON.");

		assert_eq!(value["liked"], expected);
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
