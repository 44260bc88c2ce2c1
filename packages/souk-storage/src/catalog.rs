//! Catalog-side read queries. Every query here is scoped to in-stock
//! products (`quantity > 0`); out-of-stock items never reach a
//! recommendation list.

use std::collections::{HashMap, HashSet};

use souk_domain::{CategoryId, ProductId};

use crate::{Result, db::Db};

/// Category id per product, for the diversity filter. Looks up all ids, in
/// or out of stock; stock filtering happens separately.
pub async fn categories_for(
	db: &Db,
	ids: &[ProductId],
) -> Result<HashMap<ProductId, Option<CategoryId>>> {
	if ids.is_empty() {
		return Ok(HashMap::new());
	}

	let rows: Vec<(ProductId, Option<CategoryId>)> = sqlx::query_as(
		"\
SELECT id, category_id
FROM products
WHERE id = ANY($1)",
	)
	.bind(ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().collect())
}

/// The subset of `ids` that is currently in stock.
pub async fn in_stock_ids(db: &Db, ids: &[ProductId]) -> Result<HashSet<ProductId>> {
	if ids.is_empty() {
		return Ok(HashSet::new());
	}

	let rows: Vec<ProductId> = sqlx::query_scalar(
		"\
SELECT id
FROM products
WHERE id = ANY($1)
	AND quantity > 0",
	)
	.bind(ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().collect())
}

/// Distinct non-null category ids across the given products.
pub async fn seed_categories(db: &Db, ids: &[ProductId]) -> Result<Vec<CategoryId>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<CategoryId> = sqlx::query_scalar(
		"\
SELECT DISTINCT category_id
FROM products
WHERE id = ANY($1)
	AND category_id IS NOT NULL",
	)
	.bind(ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Non-empty categories ranked by product count, busiest first, recency of
/// the category row as the tiebreak. Backs the home-section filler.
pub async fn popular_categories(db: &Db, cap: i64) -> Result<Vec<CategoryId>> {
	if cap <= 0 {
		return Ok(Vec::new());
	}

	let rows: Vec<CategoryId> = sqlx::query_scalar(
		"\
SELECT c.id
FROM categories c
JOIN products p ON p.category_id = c.id
GROUP BY c.id, c.updated_at
ORDER BY COUNT(p.id) DESC, c.updated_at DESC
LIMIT $1",
	)
	.bind(cap)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// In-stock products in the given categories, most recently updated first.
pub async fn in_categories(
	db: &Db,
	categories: &[CategoryId],
	exclude: &[ProductId],
	limit: i64,
) -> Result<Vec<ProductId>> {
	if categories.is_empty() || limit <= 0 {
		return Ok(Vec::new());
	}

	let rows: Vec<ProductId> = sqlx::query_scalar(
		"\
SELECT id
FROM products
WHERE category_id = ANY($1)
	AND quantity > 0
	AND NOT (id = ANY($2))
ORDER BY updated_at DESC
LIMIT $3",
	)
	.bind(categories)
	.bind(exclude)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// In-stock products by total sold quantity descending, recency as the
/// tiebreak. Products never ordered still appear, with zero sold.
pub async fn top_selling(db: &Db, exclude: &[ProductId], limit: i64) -> Result<Vec<ProductId>> {
	if limit <= 0 {
		return Ok(Vec::new());
	}

	let rows: Vec<ProductId> = sqlx::query_scalar(
		"\
SELECT p.id
FROM products p
LEFT JOIN order_items oi ON oi.product_id = p.id
WHERE p.quantity > 0
	AND NOT (p.id = ANY($1))
GROUP BY p.id
ORDER BY COALESCE(SUM(oi.quantity), 0) DESC, p.updated_at DESC
LIMIT $2",
	)
	.bind(exclude)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// In-stock products by creation recency.
pub async fn newest(db: &Db, exclude: &[ProductId], limit: i64) -> Result<Vec<ProductId>> {
	if limit <= 0 {
		return Ok(Vec::new());
	}

	let rows: Vec<ProductId> = sqlx::query_scalar(
		"\
SELECT id
FROM products
WHERE quantity > 0
	AND NOT (id = ANY($1))
ORDER BY created_at DESC
LIMIT $2",
	)
	.bind(exclude)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
