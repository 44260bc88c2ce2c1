//! Behavioral signal queries and the two fact mutations this subsystem owns:
//! interest increments and like toggles. Quantity aggregates are computed at
//! read time from order and cart line rows.

use std::collections::HashMap;

use souk_domain::{ProductId, UserId, scoring::InterestSignal};

use crate::{Result, db::Db, models::ProductInterest};

/// The subject's most recently updated interest rows, in-stock scope.
pub async fn interest_rows(db: &Db, user_id: UserId, cap: i64) -> Result<Vec<InterestSignal>> {
	let rows: Vec<ProductInterest> = sqlx::query_as(
		"\
SELECT pi.user_id, pi.product_id, pi.score, pi.updated_at
FROM product_interests pi
JOIN products p ON p.id = pi.product_id
WHERE pi.user_id = $1
	AND p.quantity > 0
ORDER BY pi.updated_at DESC
LIMIT $2",
	)
	.bind(user_id)
	.bind(cap)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows
		.into_iter()
		.map(|row| InterestSignal {
			product_id: row.product_id,
			score: row.score,
			updated_at: row.updated_at,
		})
		.collect())
}

/// Interest rows ranked by raw score then recency, used for seeding
/// home-page sections rather than the weighted pipeline.
pub async fn interest_seed_ids(db: &Db, user_id: UserId, cap: i64) -> Result<Vec<ProductId>> {
	let rows: Vec<ProductId> = sqlx::query_scalar(
		"\
SELECT product_id
FROM product_interests
WHERE user_id = $1
ORDER BY score DESC, updated_at DESC
LIMIT $2",
	)
	.bind(user_id)
	.bind(cap)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn liked_ids(db: &Db, user_id: UserId, cap: i64) -> Result<Vec<ProductId>> {
	let rows: Vec<ProductId> = sqlx::query_scalar(
		"\
SELECT lp.product_id
FROM liked_products lp
JOIN products p ON p.id = lp.product_id
WHERE lp.user_id = $1
	AND p.quantity > 0
ORDER BY lp.created_at DESC
LIMIT $2",
	)
	.bind(user_id)
	.bind(cap)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Like-set membership filter for a page's product ids.
pub async fn liked_among(
	db: &Db,
	user_id: UserId,
	ids: &[ProductId],
) -> Result<Vec<ProductId>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<ProductId> = sqlx::query_scalar(
		"\
SELECT product_id
FROM liked_products
WHERE user_id = $1
	AND product_id = ANY($2)",
	)
	.bind(user_id)
	.bind(ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn purchased_quantities(
	db: &Db,
	user_id: UserId,
) -> Result<HashMap<ProductId, i64>> {
	quantities_by_status(db, user_id, None).await
}

/// Cancelled-order line quantities; these feed the avoid set.
pub async fn cancelled_quantities(
	db: &Db,
	user_id: UserId,
) -> Result<HashMap<ProductId, i64>> {
	quantities_by_status(db, user_id, Some("CANCELLED")).await
}

pub async fn cart_quantities(db: &Db, user_id: UserId) -> Result<HashMap<ProductId, i64>> {
	let rows: Vec<(ProductId, i64)> = sqlx::query_as(
		"\
SELECT ci.product_id, COALESCE(SUM(ci.quantity), 0)::bigint
FROM cart_items ci
JOIN products p ON p.id = ci.product_id
WHERE ci.user_id = $1
	AND p.quantity > 0
GROUP BY ci.product_id",
	)
	.bind(user_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().collect())
}

/// Distinct product ids currently in the subject's cart, most recently added
/// first.
pub async fn cart_product_ids(db: &Db, user_id: UserId, cap: i64) -> Result<Vec<ProductId>> {
	let rows: Vec<ProductId> = sqlx::query_scalar(
		"\
SELECT product_id
FROM cart_items
WHERE user_id = $1
GROUP BY product_id
ORDER BY MAX(added_at) DESC
LIMIT $2",
	)
	.bind(user_id)
	.bind(cap)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Other subjects who purchased any seed product, ranked by total shared
/// quantity, then by how many distinct seeds they share.
pub async fn similar_users(
	db: &Db,
	seed_ids: &[ProductId],
	exclude_user: UserId,
	cap: i64,
) -> Result<Vec<UserId>> {
	if seed_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<UserId> = sqlx::query_scalar(
		"\
SELECT o.user_id
FROM order_items oi
JOIN orders o ON o.id = oi.order_id
WHERE oi.product_id = ANY($1)
	AND o.user_id IS NOT NULL
	AND o.user_id <> $2
GROUP BY o.user_id
ORDER BY COALESCE(SUM(oi.quantity), 0) DESC, COUNT(DISTINCT oi.product_id) DESC
LIMIT $3",
	)
	.bind(seed_ids)
	.bind(exclude_user)
	.bind(cap)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Products the similar users bought, by raw co-purchase volume. No
/// similarity normalization; one aggregate pass over the order lines.
pub async fn co_purchased(
	db: &Db,
	user_ids: &[UserId],
	exclude: &[ProductId],
	cap: i64,
) -> Result<Vec<ProductId>> {
	if user_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<ProductId> = sqlx::query_scalar(
		"\
SELECT oi.product_id
FROM order_items oi
JOIN orders o ON o.id = oi.order_id
JOIN products p ON p.id = oi.product_id
WHERE o.user_id = ANY($1)
	AND p.quantity > 0
	AND NOT (oi.product_id = ANY($2))
GROUP BY oi.product_id
ORDER BY COALESCE(SUM(oi.quantity), 0) DESC
LIMIT $3",
	)
	.bind(user_ids)
	.bind(exclude)
	.bind(cap)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Ensures an interest row exists per (user, product) and atomically adds
/// `delta` to each score. A single upsert keeps concurrent callers from
/// racing: duplicate inserts collapse into the conflict arm, and the add is
/// a relative update inside the statement, never read-modify-write.
pub async fn add_interest(
	db: &Db,
	user_id: UserId,
	product_ids: &[ProductId],
	delta: i64,
) -> Result<()> {
	if product_ids.is_empty() {
		return Ok(());
	}

	sqlx::query(
		"\
INSERT INTO product_interests (user_id, product_id, score, updated_at)
SELECT $1, unnest($2::bigint[]), $3, now()
ON CONFLICT (user_id, product_id) DO UPDATE
SET
	score = product_interests.score + EXCLUDED.score,
	updated_at = now()",
	)
	.bind(user_id)
	.bind(product_ids)
	.bind(delta)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Flips like-set membership. Returns true when the product is liked after
/// the call. The insert-first shape tolerates a concurrent toggle: whichever
/// racer loses the insert falls through to the delete arm.
pub async fn toggle_like(db: &Db, user_id: UserId, product_id: ProductId) -> Result<bool> {
	let inserted = sqlx::query(
		"\
INSERT INTO liked_products (user_id, product_id)
VALUES ($1, $2)
ON CONFLICT (user_id, product_id) DO NOTHING",
	)
	.bind(user_id)
	.bind(product_id)
	.execute(&db.pool)
	.await?;

	if inserted.rows_affected() > 0 {
		return Ok(true);
	}

	sqlx::query(
		"\
DELETE FROM liked_products
WHERE user_id = $1
	AND product_id = $2",
	)
	.bind(user_id)
	.bind(product_id)
	.execute(&db.pool)
	.await?;

	Ok(false)
}

async fn quantities_by_status(
	db: &Db,
	user_id: UserId,
	status: Option<&str>,
) -> Result<HashMap<ProductId, i64>> {
	let rows: Vec<(ProductId, i64)> = sqlx::query_as(
		"\
SELECT oi.product_id, COALESCE(SUM(oi.quantity), 0)::bigint
FROM order_items oi
JOIN orders o ON o.id = oi.order_id
JOIN products p ON p.id = oi.product_id
WHERE o.user_id = $1
	AND p.quantity > 0
	AND ($2::text IS NULL OR o.status = $2)
GROUP BY oi.product_id",
	)
	.bind(user_id)
	.bind(status)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().collect())
}
