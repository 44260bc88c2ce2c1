use std::{
	collections::{HashMap, HashSet},
	time::Instant,
};

use uuid::Uuid;

use souk_domain::{
	CategoryId, ProductId, Subject, UserId,
	decay::{age_in_days, decayed_score},
	diversity::{NO_CATEGORY, cap_per_category},
	interleave::interleave_pools,
	scoring::SeedScores,
};

use crate::{CacheKey, ServiceResult, SoukService};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RecommendResponse {
	pub request_id: Uuid,
	pub ids: Vec<ProductId>,
}

/// Per-request diagnostics. Collected unconditionally (the counters are
/// cheap) and emitted only when `observability.recs_obs` is set; never feeds
/// back into control flow or output.
pub(crate) struct Obs {
	pub(crate) enabled: bool,
	pub(crate) request_id: Uuid,
	started: Instant,
	pub(crate) queries: u32,
}
impl Obs {
	pub(crate) fn new(enabled: bool, request_id: Uuid) -> Self {
		Self { enabled, request_id, started: Instant::now(), queries: 0 }
	}

	pub(crate) fn elapsed_ms(&self) -> u128 {
		self.started.elapsed().as_millis()
	}
}

impl SoukService {
	/// Up to `n` recommended product ids for the subject, best first.
	///
	/// Cache check, then signal pull, decay, seed scoring, collaborative and
	/// category expansion, global backfill, diversity cap, one more backfill
	/// round if short, cache store. Anonymous subjects skip straight to the
	/// global fallback. Every stage degrades to the next on empty output;
	/// only storage unavailability is an error.
	pub async fn recommendations(
		&self,
		subject: Subject,
		n: usize,
	) -> ServiceResult<RecommendResponse> {
		let request_id = Uuid::new_v4();

		if n == 0 {
			return Ok(RecommendResponse { request_id, ids: Vec::new() });
		}

		let mut obs = Obs::new(self.cfg.observability.recs_obs, request_id);
		let key = CacheKey::Recommendations { subject, size: n };

		if let Some(cached) = self.cached_ids(&key).await {
			// A non-empty stored list short-circuits the pipeline; only the
			// stock check runs again so delisted items never resurface.
			let ids = self.still_in_stock(cached, n, &mut obs).await?;

			if obs.enabled {
				tracing::info!(
					request_id = %obs.request_id,
					?subject,
					n,
					count = ids.len(),
					elapsed_ms = obs.elapsed_ms(),
					queries = obs.queries,
					"recs cache hit",
				);
			}

			return Ok(RecommendResponse { request_id, ids });
		}

		if obs.enabled {
			tracing::info!(request_id = %obs.request_id, ?subject, n, "recs cache miss");
		}

		let ids = match subject {
			Subject::Anonymous => self.compute_anonymous(n, &mut obs).await?,
			Subject::User(user_id) => self.compute_user(user_id, n, &mut obs).await?,
		};

		// The store happens only here, after the full pipeline; a run that
		// errors out earlier never writes a partial result.
		self.store_ids(&key, &ids).await;

		if obs.enabled {
			self.log_summary(subject, n, &ids, &mut obs).await;
		}

		Ok(RecommendResponse { request_id, ids })
	}

	/// Global popularity/recency pipeline: interleave, diversity cap, one
	/// backfill round if the cap left the list short.
	async fn compute_anonymous(&self, n: usize, obs: &mut Obs) -> ServiceResult<Vec<ProductId>> {
		let pool = self.global_fallback(n * 3, &HashSet::new(), obs).await?;
		let mut ids = self.diversified(pool, n, obs).await?;

		if ids.len() < n {
			ids = self.backfill_round(ids, n, obs).await?;
		}

		Ok(ids)
	}

	async fn compute_user(
		&self,
		user_id: UserId,
		n: usize,
		obs: &mut Obs,
	) -> ServiceResult<Vec<ProductId>> {
		let recs = &self.cfg.recs;
		let signals = &self.sources.signals;
		let interest = signals.interest_rows(user_id, recs.interest_rows_cap as i64).await?;
		let liked = signals.liked_ids(user_id, recs.liked_cap as i64).await?;
		let purchased = signals.purchased_quantities(user_id).await?;
		let cart = signals.cart_quantities(user_id).await?;
		let cancelled = signals.cancelled_quantities(user_id).await?;

		obs.queries += 5;

		if obs.enabled {
			tracing::info!(
				request_id = %obs.request_id,
				user_id,
				likes = liked.len(),
				purchases = purchased.len(),
				cart = cart.len(),
				interest = interest.len(),
				cancelled = cancelled.len(),
				"recs signal counts",
			);
		}

		let now = time::OffsetDateTime::now_utc();
		let weights = self.weights();
		let mut scores = SeedScores::new();

		for product_id in liked {
			scores.add_like(product_id, &weights);
		}
		for (product_id, qty) in &purchased {
			scores.add_purchase(*product_id, *qty, &weights);
		}
		for row in &interest {
			let age = age_in_days(now, row.updated_at);

			scores.add_interest(
				row.product_id,
				decayed_score(row.score as f64, age, recs.half_life_days),
			);
		}
		for (product_id, qty) in &cart {
			scores.add_cart(*product_id, *qty, &weights);
		}
		for (product_id, qty) in &cancelled {
			scores.add_cancelled(*product_id, *qty, &weights);
		}

		let seeds = scores.ranked_seeds(n * 10);

		if obs.enabled {
			tracing::info!(
				request_id = %obs.request_id,
				user_id,
				seeds = seeds.len(),
				scored = scores.signal_count(),
				"recs seed count",
			);
		}

		// Cold start: no usable seeds puts the subject on the same path as
		// an anonymous visitor.
		if seeds.is_empty() {
			return self.compute_anonymous(n, obs).await;
		}

		let similar =
			signals.similar_users(&seeds, user_id, recs.similar_users_cap as i64).await?;
		let mut exclude: Vec<ProductId> = seeds.clone();

		exclude.extend(scores.avoid().iter().copied());

		let co_purchased = signals.co_purchased(&similar, &exclude, (n * 5) as i64).await?;
		let seed_categories = self.sources.catalog.seed_categories(&seeds).await?;
		let mut category_exclude = exclude.clone();

		category_exclude.extend(co_purchased.iter().copied());

		let category_pool = self
			.sources
			.catalog
			.in_categories(&seed_categories, &category_exclude, (n * 5) as i64)
			.await?;

		obs.queries += 4;

		if obs.enabled {
			tracing::info!(
				request_id = %obs.request_id,
				user_id,
				similar_users = similar.len(),
				co_purchased = co_purchased.len(),
				category_pool = category_pool.len(),
				"recs pool counts",
			);
		}

		// Merge: collaborative first, then category, deduplicating against
		// the seeds and avoid set throughout.
		let mut ordered = Vec::with_capacity(n);
		let mut seen: HashSet<ProductId> = exclude.iter().copied().collect();

		'merge: for pool in [&co_purchased, &category_pool] {
			for product_id in pool {
				if !seen.insert(*product_id) {
					continue;
				}

				ordered.push(*product_id);

				if ordered.len() >= n {
					break 'merge;
				}
			}
		}

		if ordered.len() < n {
			let fill = self.global_fallback((n - ordered.len()) * 3, &seen, obs).await?;

			ordered.extend(fill);
		}

		let mut ids = self.diversified(ordered, n, obs).await?;

		if ids.len() < n {
			ids = self.backfill_round(ids, n, obs).await?;
		}

		Ok(ids)
	}

	/// One extra fallback round after the diversity cap came up short:
	/// append global candidates (excluding everything already chosen) and
	/// re-apply the cap.
	async fn backfill_round(
		&self,
		chosen: Vec<ProductId>,
		n: usize,
		obs: &mut Obs,
	) -> ServiceResult<Vec<ProductId>> {
		let exclude: HashSet<ProductId> = chosen.iter().copied().collect();
		let fill = self.global_fallback((n - chosen.len()) * 5, &exclude, obs).await?;

		if fill.is_empty() {
			return Ok(chosen);
		}

		let mut combined = chosen;

		combined.extend(fill);

		self.diversified(combined, n, obs).await
	}

	/// Interleaves the top-selling and most-recent pools, alternating picks,
	/// skipping excluded ids, until `limit` gathered or both pools run dry.
	async fn global_fallback(
		&self,
		limit: usize,
		exclude: &HashSet<ProductId>,
		obs: &mut Obs,
	) -> ServiceResult<Vec<ProductId>> {
		if limit == 0 {
			return Ok(Vec::new());
		}

		let exclude_ids: Vec<ProductId> = exclude.iter().copied().collect();
		let pool_cap = (limit * 2) as i64;
		let top_selling = self.sources.catalog.top_selling(&exclude_ids, pool_cap).await?;
		let newest = self.sources.catalog.newest(&exclude_ids, pool_cap).await?;

		obs.queries += 2;

		Ok(interleave_pools(&top_selling, &newest, exclude, limit))
	}

	/// Applies the per-category cap to an ordered candidate list.
	async fn diversified(
		&self,
		ordered: Vec<ProductId>,
		limit: usize,
		obs: &mut Obs,
	) -> ServiceResult<Vec<ProductId>> {
		if ordered.is_empty() {
			return Ok(ordered);
		}

		let categories = self.category_map(&ordered, obs).await?;

		Ok(cap_per_category(
			&ordered,
			&categories,
			self.cfg.recs.max_per_category as usize,
			limit,
		))
	}

	async fn category_map(
		&self,
		ids: &[ProductId],
		obs: &mut Obs,
	) -> ServiceResult<HashMap<ProductId, CategoryId>> {
		let raw = self.sources.catalog.categories_for(ids).await?;

		obs.queries += 1;

		Ok(raw
			.into_iter()
			.map(|(product_id, category)| (product_id, category.unwrap_or(NO_CATEGORY)))
			.collect())
	}

	/// Drops ids that have gone out of stock since the list was cached,
	/// preserving order.
	async fn still_in_stock(
		&self,
		ids: Vec<ProductId>,
		n: usize,
		obs: &mut Obs,
	) -> ServiceResult<Vec<ProductId>> {
		let in_stock = self.sources.catalog.in_stock_ids(&ids).await?;

		obs.queries += 1;

		Ok(ids.into_iter().filter(|id| in_stock.contains(id)).take(n).collect())
	}

	/// A cache read that fails or holds an undecodable or empty payload is a
	/// miss.
	async fn cached_ids(&self, key: &CacheKey) -> Option<Vec<ProductId>> {
		let value = match self.sources.cache.get(key).await {
			Ok(value) => value?,
			Err(err) => {
				tracing::warn!(error = %err, "Recommendation cache read failed; recomputing.");

				return None;
			},
		};
		let ids: Vec<ProductId> = serde_json::from_value(value).ok()?;

		if ids.is_empty() { None } else { Some(ids) }
	}

	async fn store_ids(&self, key: &CacheKey, ids: &[ProductId]) {
		let ttl = self.ttl_policy().ttl_for(key);

		if let Err(err) = self.sources.cache.put(key, serde_json::json!(ids), ttl).await {
			tracing::warn!(error = %err, "Recommendation cache write failed; skipping store.");
		}
	}

	async fn log_summary(&self, subject: Subject, n: usize, ids: &[ProductId], obs: &mut Obs) {
		let coverage = match self.category_map(ids, obs).await {
			Ok(categories) => {
				let mut counts: HashMap<CategoryId, usize> = HashMap::new();

				for category in categories.values() {
					*counts.entry(*category).or_insert(0) += 1;
				}

				format!("{counts:?}")
			},
			Err(_) => "unavailable".to_string(),
		};

		tracing::info!(
			request_id = %obs.request_id,
			?subject,
			n,
			count = ids.len(),
			category_coverage = %coverage,
			elapsed_ms = obs.elapsed_ms(),
			queries = obs.queries,
			"recs summary",
		);

		if ids.is_empty() {
			tracing::warn!(request_id = %obs.request_id, ?subject, n, "recs came back empty");
		}
	}
}
