use std::collections::HashSet;

use souk_domain::{CategoryId, ProductId, Subject};

use crate::{CacheKey, ServiceResult, SoukService};

/// Seed candidates inspected per source before giving up on a section.
const SEED_SCAN_CAP: usize = 30;
const MAX_SECTIONS: usize = 2;
/// Busiest categories considered when padding out missing sections.
const POPULAR_CATEGORY_CAP: i64 = 20;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HomeSection {
	pub title: String,
	pub seed_product_id: ProductId,
	pub category_id: CategoryId,
	pub product_ids: Vec<ProductId>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HomeSectionsResponse {
	pub sections: Vec<HomeSection>,
}

impl SoukService {
	/// Up to two "similar to" category sections for the home page, each
	/// seeded by a product the subject has shown intent for (cart first,
	/// then watchlist and interest, then the recommended list itself) and
	/// filled with in-stock same-category products by recency. Anonymous
	/// subjects seed from the recommended list and its rotation. Subjects
	/// whose seeds carry no category get the slots padded from the busiest
	/// categories instead.
	pub async fn home_sections(
		&self,
		subject: Subject,
		n: usize,
		per_section: usize,
	) -> ServiceResult<HomeSectionsResponse> {
		if per_section == 0 {
			return Ok(HomeSectionsResponse { sections: Vec::new() });
		}

		let key = CacheKey::HomeSections { subject };

		if let Some(sections) = self.cached_sections(&key).await {
			return Ok(HomeSectionsResponse { sections: self.restock_sections(sections).await? });
		}

		let recommended = self.recommendations(subject, n).await?.ids;
		let seed_sources = self.seed_sources(subject, &recommended).await?;
		let mut seeds = self.pick_seeds(&seed_sources).await?;

		if seeds.len() < MAX_SECTIONS {
			self.pad_with_popular(&mut seeds, &recommended).await?;
		}

		let mut sections = Vec::with_capacity(seeds.len());
		let mut used: HashSet<ProductId> = recommended.iter().copied().collect();

		for (title, seed_product_id, category_id) in seeds {
			used.insert(seed_product_id);

			let exclude: Vec<ProductId> = used.iter().copied().collect();
			let product_ids = self
				.sources
				.catalog
				.in_categories(&[category_id], &exclude, per_section as i64)
				.await?;

			used.extend(product_ids.iter().copied());
			sections.push(HomeSection { title, seed_product_id, category_id, product_ids });
		}

		self.store_sections(&key, &sections).await;

		Ok(HomeSectionsResponse { sections })
	}

	/// The ordered seed pools, strongest intent first. Only non-empty pools
	/// participate; an authenticated subject with no cart or watchlist falls
	/// back to its recommended list.
	async fn seed_sources(
		&self,
		subject: Subject,
		recommended: &[ProductId],
	) -> ServiceResult<Vec<(String, Vec<ProductId>)>> {
		let Some(user_id) = subject.user_id() else {
			let mut rotated = recommended.to_vec();

			if !rotated.is_empty() {
				rotated.rotate_left(1);
			}

			return Ok(vec![
				("Trending".to_string(), recommended.to_vec()),
				("Trending".to_string(), rotated),
			]);
		};
		let mut sources = Vec::new();
		let cart = self.sources.signals.cart_product_ids(user_id, 20).await?;

		if !cart.is_empty() {
			sources.push(("From your cart".to_string(), cart));
		}

		let watchlist = self.sources.signals.liked_ids(user_id, 20).await?;
		let interest = self.sources.signals.interest_seed_ids(user_id, 30).await?;
		let mut watch_and_activity = Vec::new();
		let mut seen = HashSet::new();

		for product_id in watchlist.into_iter().chain(interest) {
			if !seen.insert(product_id) {
				continue;
			}

			watch_and_activity.push(product_id);

			if watch_and_activity.len() >= SEED_SCAN_CAP {
				break;
			}
		}

		if !watch_and_activity.is_empty() {
			sources.push(("From your watchlist & activity".to_string(), watch_and_activity));
		}
		if sources.is_empty() {
			sources.push(("Recommended".to_string(), recommended.to_vec()));
		}

		Ok(sources)
	}

	/// Walks the seed pools in order and keeps the first products that carry
	/// a category, up to [`MAX_SECTIONS`].
	async fn pick_seeds(
		&self,
		sources: &[(String, Vec<ProductId>)],
	) -> ServiceResult<Vec<(String, ProductId, CategoryId)>> {
		let candidate_ids: Vec<ProductId> =
			sources.iter().flat_map(|(_, ids)| ids.iter().copied()).collect();
		let categories = self.sources.catalog.categories_for(&candidate_ids).await?;
		let mut seeds = Vec::with_capacity(MAX_SECTIONS);
		let mut seen = HashSet::new();

		'outer: for (title, ids) in sources {
			for product_id in ids {
				if !seen.insert(*product_id) {
					continue;
				}

				// Seeds without a category cannot anchor a category section.
				let Some(Some(category_id)) = categories.get(product_id) else {
					continue;
				};

				seeds.push((title.clone(), *product_id, *category_id));

				if seeds.len() >= MAX_SECTIONS {
					break 'outer;
				}
			}
		}

		Ok(seeds)
	}

	/// Fills remaining section slots from the busiest categories when the
	/// subject's own seeds carry no category. Each pad section anchors on
	/// the most recent in-stock product of an unused category, excluding
	/// anything already recommended or seeding another section.
	async fn pad_with_popular(
		&self,
		seeds: &mut Vec<(String, ProductId, CategoryId)>,
		recommended: &[ProductId],
	) -> ServiceResult<()> {
		let categories = self.sources.catalog.popular_categories(POPULAR_CATEGORY_CAP).await?;
		let taken: HashSet<CategoryId> =
			seeds.iter().map(|(_, _, category_id)| *category_id).collect();
		let mut exclude: Vec<ProductId> = recommended.to_vec();

		exclude.extend(seeds.iter().map(|(_, seed_product_id, _)| *seed_product_id));

		for category_id in categories {
			if seeds.len() >= MAX_SECTIONS {
				break;
			}
			if taken.contains(&category_id) {
				continue;
			}

			let anchor = self.sources.catalog.in_categories(&[category_id], &exclude, 1).await?;
			let Some(seed_product_id) = anchor.first().copied() else {
				continue;
			};

			exclude.push(seed_product_id);
			seeds.push(("Popular".to_string(), seed_product_id, category_id));
		}

		Ok(())
	}

	async fn cached_sections(&self, key: &CacheKey) -> Option<Vec<HomeSection>> {
		let value = match self.sources.cache.get(key).await {
			Ok(value) => value?,
			Err(err) => {
				tracing::warn!(error = %err, "Section cache read failed; recomputing.");

				return None;
			},
		};

		serde_json::from_value(value).ok()
	}

	async fn store_sections(&self, key: &CacheKey, sections: &[HomeSection]) {
		let value = match serde_json::to_value(sections) {
			Ok(value) => value,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to encode sections; skipping store.");

				return;
			},
		};
		let ttl = self.ttl_policy().ttl_for(key);

		if let Err(err) = self.sources.cache.put(key, value, ttl).await {
			tracing::warn!(error = %err, "Section cache write failed; skipping store.");
		}
	}

	/// Re-checks stock on cached section contents so delisted items never
	/// resurface within the TTL window.
	async fn restock_sections(
		&self,
		sections: Vec<HomeSection>,
	) -> ServiceResult<Vec<HomeSection>> {
		let all_ids: Vec<ProductId> =
			sections.iter().flat_map(|section| section.product_ids.iter().copied()).collect();

		if all_ids.is_empty() {
			return Ok(sections);
		}

		let in_stock = self.sources.catalog.in_stock_ids(&all_ids).await?;

		Ok(sections
			.into_iter()
			.map(|mut section| {
				section.product_ids.retain(|id| in_stock.contains(id));

				section
			})
			.collect())
	}
}
