//! In-memory stand-in for the Postgres catalog and signal store. Mirrors the
//! ordering and scoping rules of the real queries (stock filters, recency
//! tiebreaks, aggregate ranking) so pipeline tests exercise the same
//! semantics without a database.

use std::{
	collections::{HashMap, HashSet},
	sync::Mutex,
};

use time::{Duration, OffsetDateTime};

use souk_domain::{CategoryId, ProductId, UserId, scoring::InterestSignal};
use souk_service::{BoxFuture, CatalogSource, SignalSource};

#[derive(Clone, Copy)]
struct ProductRow {
	id: ProductId,
	category_id: Option<CategoryId>,
	quantity: i64,
	created_at: OffsetDateTime,
	updated_at: OffsetDateTime,
}

#[derive(Clone)]
struct OrderRow {
	user_id: Option<UserId>,
	cancelled: bool,
	items: Vec<(ProductId, i64)>,
}

#[derive(Clone, Copy)]
struct CartRow {
	user_id: UserId,
	product_id: ProductId,
	quantity: i64,
	added_at: OffsetDateTime,
}

struct Inner {
	clock: OffsetDateTime,
	products: Vec<ProductRow>,
	orders: Vec<OrderRow>,
	cart: Vec<CartRow>,
	interests: HashMap<(UserId, ProductId), (i64, OffsetDateTime)>,
	likes: HashMap<(UserId, ProductId), OffsetDateTime>,
}
impl Inner {
	/// Monotonic stamp; each call is one second later, so insertion order
	/// doubles as recency order.
	fn tick(&mut self) -> OffsetDateTime {
		self.clock += Duration::seconds(1);

		self.clock
	}

	fn product(&self, id: ProductId) -> Option<&ProductRow> {
		self.products.iter().find(|row| row.id == id)
	}

	fn in_stock(&self, id: ProductId) -> bool {
		self.product(id).is_some_and(|row| row.quantity > 0)
	}
}

pub struct FixtureStore {
	inner: Mutex<Inner>,
}
impl FixtureStore {
	pub fn new() -> Self {
		Self {
			inner: Mutex::new(Inner {
				clock: OffsetDateTime::now_utc() - Duration::hours(1),
				products: Vec::new(),
				orders: Vec::new(),
				cart: Vec::new(),
				interests: HashMap::new(),
				likes: HashMap::new(),
			}),
		}
	}

	/// Registers a product. Later additions stamp later timestamps, so the
	/// last product added is the newest and most recently updated.
	pub fn add_product(&self, id: ProductId, category_id: Option<CategoryId>, quantity: i64) {
		let mut inner = self.lock();
		let stamp = inner.tick();

		inner.products.push(ProductRow {
			id,
			category_id,
			quantity,
			created_at: stamp,
			updated_at: stamp,
		});
	}

	pub fn set_quantity(&self, id: ProductId, quantity: i64) {
		let mut inner = self.lock();

		if let Some(row) = inner.products.iter_mut().find(|row| row.id == id) {
			row.quantity = quantity;
		}
	}

	pub fn add_order(&self, user_id: Option<UserId>, cancelled: bool, items: &[(ProductId, i64)]) {
		self.lock().orders.push(OrderRow { user_id, cancelled, items: items.to_vec() });
	}

	pub fn add_cart_item(&self, user_id: UserId, product_id: ProductId, quantity: i64) {
		let mut inner = self.lock();
		let added_at = inner.tick();

		inner.cart.push(CartRow { user_id, product_id, quantity, added_at });
	}

	pub fn add_like(&self, user_id: UserId, product_id: ProductId) {
		let mut inner = self.lock();
		let created_at = inner.tick();

		inner.likes.insert((user_id, product_id), created_at);
	}

	/// Seeds a stored interest row whose `updated_at` lies `age_days` in the
	/// past, for exercising the read-time decay.
	pub fn seed_interest(&self, user_id: UserId, product_id: ProductId, score: i64, age_days: f64) {
		let updated_at =
			OffsetDateTime::now_utc() - Duration::seconds((age_days * 86_400.0) as i64);

		self.lock().interests.insert((user_id, product_id), (score, updated_at));
	}

	/// The stored raw score, for asserting on increment behavior.
	pub fn interest_score(&self, user_id: UserId, product_id: ProductId) -> Option<i64> {
		self.lock().interests.get(&(user_id, product_id)).map(|(score, _)| *score)
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(|err| err.into_inner())
	}
}

fn cap_len(cap: i64) -> usize {
	cap.max(0) as usize
}

impl CatalogSource for FixtureStore {
	fn categories_for<'a>(
		&'a self,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, Option<CategoryId>>>> {
		Box::pin(async move {
			let inner = self.lock();

			Ok(ids
				.iter()
				.filter_map(|id| inner.product(*id).map(|row| (row.id, row.category_id)))
				.collect())
		})
	}

	fn in_stock_ids<'a>(
		&'a self,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<HashSet<ProductId>>> {
		Box::pin(async move {
			let inner = self.lock();

			Ok(ids.iter().copied().filter(|id| inner.in_stock(*id)).collect())
		})
	}

	fn seed_categories<'a>(
		&'a self,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<Vec<CategoryId>>> {
		Box::pin(async move {
			let inner = self.lock();
			let mut categories: Vec<CategoryId> = ids
				.iter()
				.filter_map(|id| inner.product(*id).and_then(|row| row.category_id))
				.collect();

			categories.sort_unstable();
			categories.dedup();

			Ok(categories)
		})
	}

	fn popular_categories<'a>(
		&'a self,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<CategoryId>>> {
		Box::pin(async move {
			let inner = self.lock();
			let mut counts: HashMap<CategoryId, usize> = HashMap::new();

			for row in &inner.products {
				if let Some(category_id) = row.category_id {
					*counts.entry(category_id).or_insert(0) += 1;
				}
			}

			let mut categories: Vec<(CategoryId, usize)> = counts.into_iter().collect();

			categories.sort_by(|lhs, rhs| rhs.1.cmp(&lhs.1).then(lhs.0.cmp(&rhs.0)));
			categories.truncate(cap_len(cap));

			Ok(categories.into_iter().map(|(category_id, _)| category_id).collect())
		})
	}

	fn in_categories<'a>(
		&'a self,
		categories: &'a [CategoryId],
		exclude: &'a [ProductId],
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move {
			let inner = self.lock();
			let wanted: HashSet<CategoryId> = categories.iter().copied().collect();
			let excluded: HashSet<ProductId> = exclude.iter().copied().collect();
			let mut rows: Vec<&ProductRow> = inner
				.products
				.iter()
				.filter(|row| {
					row.quantity > 0
						&& !excluded.contains(&row.id)
						&& row.category_id.is_some_and(|category| wanted.contains(&category))
				})
				.collect();

			rows.sort_by(|lhs, rhs| {
				rhs.updated_at.cmp(&lhs.updated_at).then(rhs.id.cmp(&lhs.id))
			});

			Ok(rows.into_iter().map(|row| row.id).take(cap_len(limit)).collect())
		})
	}

	fn top_selling<'a>(
		&'a self,
		exclude: &'a [ProductId],
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move {
			let inner = self.lock();
			let excluded: HashSet<ProductId> = exclude.iter().copied().collect();
			let mut sold: HashMap<ProductId, i64> = HashMap::new();

			for order in &inner.orders {
				for (product_id, qty) in &order.items {
					*sold.entry(*product_id).or_insert(0) += qty;
				}
			}

			let mut rows: Vec<&ProductRow> = inner
				.products
				.iter()
				.filter(|row| row.quantity > 0 && !excluded.contains(&row.id))
				.collect();

			rows.sort_by(|lhs, rhs| {
				let lhs_sold = sold.get(&lhs.id).copied().unwrap_or(0);
				let rhs_sold = sold.get(&rhs.id).copied().unwrap_or(0);

				rhs_sold
					.cmp(&lhs_sold)
					.then(rhs.updated_at.cmp(&lhs.updated_at))
					.then(rhs.id.cmp(&lhs.id))
			});

			Ok(rows.into_iter().map(|row| row.id).take(cap_len(limit)).collect())
		})
	}

	fn newest<'a>(
		&'a self,
		exclude: &'a [ProductId],
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move {
			let inner = self.lock();
			let excluded: HashSet<ProductId> = exclude.iter().copied().collect();
			let mut rows: Vec<&ProductRow> = inner
				.products
				.iter()
				.filter(|row| row.quantity > 0 && !excluded.contains(&row.id))
				.collect();

			rows.sort_by(|lhs, rhs| {
				rhs.created_at.cmp(&lhs.created_at).then(rhs.id.cmp(&lhs.id))
			});

			Ok(rows.into_iter().map(|row| row.id).take(cap_len(limit)).collect())
		})
	}
}

impl SignalSource for FixtureStore {
	fn interest_rows<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<InterestSignal>>> {
		Box::pin(async move {
			let inner = self.lock();
			let mut rows: Vec<InterestSignal> = inner
				.interests
				.iter()
				.filter(|((owner, product_id), _)| {
					*owner == user_id && inner.in_stock(*product_id)
				})
				.map(|((_, product_id), (score, updated_at))| InterestSignal {
					product_id: *product_id,
					score: *score,
					updated_at: *updated_at,
				})
				.collect();

			rows.sort_by(|lhs, rhs| {
				rhs.updated_at.cmp(&lhs.updated_at).then(lhs.product_id.cmp(&rhs.product_id))
			});
			rows.truncate(cap_len(cap));

			Ok(rows)
		})
	}

	fn interest_seed_ids<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move {
			let inner = self.lock();
			let mut rows: Vec<(ProductId, i64, OffsetDateTime)> = inner
				.interests
				.iter()
				.filter(|((owner, _), _)| *owner == user_id)
				.map(|((_, product_id), (score, updated_at))| (*product_id, *score, *updated_at))
				.collect();

			rows.sort_by(|lhs, rhs| rhs.1.cmp(&lhs.1).then(rhs.2.cmp(&lhs.2)));
			rows.truncate(cap_len(cap));

			Ok(rows.into_iter().map(|(product_id, ..)| product_id).collect())
		})
	}

	fn liked_ids<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move {
			let inner = self.lock();
			let mut rows: Vec<(ProductId, OffsetDateTime)> = inner
				.likes
				.iter()
				.filter(|((owner, product_id), _)| {
					*owner == user_id && inner.in_stock(*product_id)
				})
				.map(|((_, product_id), created_at)| (*product_id, *created_at))
				.collect();

			rows.sort_by(|lhs, rhs| rhs.1.cmp(&lhs.1));
			rows.truncate(cap_len(cap));

			Ok(rows.into_iter().map(|(product_id, _)| product_id).collect())
		})
	}

	fn liked_among<'a>(
		&'a self,
		user_id: UserId,
		ids: &'a [ProductId],
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move {
			let inner = self.lock();

			Ok(ids
				.iter()
				.copied()
				.filter(|product_id| inner.likes.contains_key(&(user_id, *product_id)))
				.collect())
		})
	}

	fn purchased_quantities<'a>(
		&'a self,
		user_id: UserId,
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, i64>>> {
		Box::pin(async move { Ok(self.order_quantities(user_id, None)) })
	}

	fn cancelled_quantities<'a>(
		&'a self,
		user_id: UserId,
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, i64>>> {
		Box::pin(async move { Ok(self.order_quantities(user_id, Some(true))) })
	}

	fn cart_quantities<'a>(
		&'a self,
		user_id: UserId,
	) -> BoxFuture<'a, color_eyre::Result<HashMap<ProductId, i64>>> {
		Box::pin(async move {
			let inner = self.lock();
			let mut quantities = HashMap::new();

			for row in &inner.cart {
				if row.user_id == user_id && inner.in_stock(row.product_id) {
					*quantities.entry(row.product_id).or_insert(0) += row.quantity;
				}
			}

			Ok(quantities)
		})
	}

	fn cart_product_ids<'a>(
		&'a self,
		user_id: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move {
			let inner = self.lock();
			let mut latest: HashMap<ProductId, OffsetDateTime> = HashMap::new();

			for row in &inner.cart {
				if row.user_id != user_id {
					continue;
				}

				latest
					.entry(row.product_id)
					.and_modify(|stamp| *stamp = (*stamp).max(row.added_at))
					.or_insert(row.added_at);
			}

			let mut rows: Vec<(ProductId, OffsetDateTime)> = latest.into_iter().collect();

			rows.sort_by(|lhs, rhs| rhs.1.cmp(&lhs.1));
			rows.truncate(cap_len(cap));

			Ok(rows.into_iter().map(|(product_id, _)| product_id).collect())
		})
	}

	fn similar_users<'a>(
		&'a self,
		seed_ids: &'a [ProductId],
		exclude_user: UserId,
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<UserId>>> {
		Box::pin(async move {
			let inner = self.lock();
			let seeds: HashSet<ProductId> = seed_ids.iter().copied().collect();
			let mut shared_qty: HashMap<UserId, i64> = HashMap::new();
			let mut shared_products: HashMap<UserId, HashSet<ProductId>> = HashMap::new();

			for order in &inner.orders {
				let Some(owner) = order.user_id else {
					continue;
				};

				if owner == exclude_user {
					continue;
				}

				for (product_id, qty) in &order.items {
					if !seeds.contains(product_id) {
						continue;
					}

					*shared_qty.entry(owner).or_insert(0) += qty;
					shared_products.entry(owner).or_default().insert(*product_id);
				}
			}

			let mut users: Vec<UserId> = shared_qty.keys().copied().collect();

			users.sort_by(|lhs, rhs| {
				let lhs_distinct = shared_products.get(lhs).map_or(0, HashSet::len);
				let rhs_distinct = shared_products.get(rhs).map_or(0, HashSet::len);

				shared_qty[rhs]
					.cmp(&shared_qty[lhs])
					.then(rhs_distinct.cmp(&lhs_distinct))
					.then(lhs.cmp(rhs))
			});
			users.truncate(cap_len(cap));

			Ok(users)
		})
	}

	fn co_purchased<'a>(
		&'a self,
		user_ids: &'a [UserId],
		exclude: &'a [ProductId],
		cap: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ProductId>>> {
		Box::pin(async move {
			let inner = self.lock();
			let users: HashSet<UserId> = user_ids.iter().copied().collect();
			let excluded: HashSet<ProductId> = exclude.iter().copied().collect();
			let mut volume: HashMap<ProductId, i64> = HashMap::new();

			for order in &inner.orders {
				if !order.user_id.is_some_and(|owner| users.contains(&owner)) {
					continue;
				}

				for (product_id, qty) in &order.items {
					if excluded.contains(product_id) || !inner.in_stock(*product_id) {
						continue;
					}

					*volume.entry(*product_id).or_insert(0) += qty;
				}
			}

			let mut rows: Vec<(ProductId, i64)> = volume.into_iter().collect();

			rows.sort_by(|lhs, rhs| rhs.1.cmp(&lhs.1).then(lhs.0.cmp(&rhs.0)));
			rows.truncate(cap_len(cap));

			Ok(rows.into_iter().map(|(product_id, _)| product_id).collect())
		})
	}

	fn add_interest<'a>(
		&'a self,
		user_id: UserId,
		product_ids: &'a [ProductId],
		delta: i64,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let mut inner = self.lock();
			let stamp = inner.tick();

			for product_id in product_ids {
				let entry = inner.interests.entry((user_id, *product_id)).or_insert((0, stamp));

				entry.0 += delta;
				entry.1 = stamp;
			}

			Ok(())
		})
	}

	fn toggle_like<'a>(
		&'a self,
		user_id: UserId,
		product_id: ProductId,
	) -> BoxFuture<'a, color_eyre::Result<bool>> {
		Box::pin(async move {
			let mut inner = self.lock();

			if inner.likes.remove(&(user_id, product_id)).is_some() {
				return Ok(false);
			}

			let created_at = inner.tick();

			inner.likes.insert((user_id, product_id), created_at);

			Ok(true)
		})
	}
}

impl FixtureStore {
	fn order_quantities(
		&self,
		user_id: UserId,
		cancelled: Option<bool>,
	) -> HashMap<ProductId, i64> {
		let inner = self.lock();
		let mut quantities = HashMap::new();

		for order in &inner.orders {
			if order.user_id != Some(user_id) {
				continue;
			}
			if cancelled.is_some_and(|wanted| order.cancelled != wanted) {
				continue;
			}

			for (product_id, qty) in &order.items {
				if inner.in_stock(*product_id) {
					*quantities.entry(*product_id).or_insert(0) += qty;
				}
			}
		}

		quantities
	}
}
