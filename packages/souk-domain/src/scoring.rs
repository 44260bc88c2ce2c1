use std::collections::{HashMap, HashSet};

use time::OffsetDateTime;

use crate::ProductId;

/// One stored interest row, as read from the signal store. The raw score is
/// monotonically incremented on write; its effective weight decays with
/// `updated_at` age at read time.
#[derive(Clone, Copy, Debug)]
pub struct InterestSignal {
	pub product_id: ProductId,
	pub score: i64,
	pub updated_at: OffsetDateTime,
}

/// Multipliers applied to each behavioral signal when scoring seeds.
/// `cancelled` is a magnitude; it is subtracted in [`ScoreBreakdown::total`].
#[derive(Clone, Copy, Debug)]
pub struct SignalWeights {
	pub like: f64,
	pub purchase: f64,
	pub cart: f64,
	pub cancelled: f64,
}
impl Default for SignalWeights {
	fn default() -> Self {
		Self { like: 8.0, purchase: 5.0, cart: 2.0, cancelled: 3.0 }
	}
}

/// Fixed-shape per-product accumulator. Keeping the named contributions
/// separate makes the scoring formula auditable stage by stage instead of a
/// single opaque float.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreBreakdown {
	pub like: f64,
	pub purchase: f64,
	pub interest: f64,
	pub cart: f64,
	pub cancelled: f64,
}
impl ScoreBreakdown {
	pub fn total(&self) -> f64 {
		self.like + self.purchase + self.interest + self.cart - self.cancelled
	}
}

#[derive(Debug, Default)]
pub struct SeedScores {
	scores: HashMap<ProductId, ScoreBreakdown>,
	avoid: HashSet<ProductId>,
}
impl SeedScores {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_like(&mut self, product_id: ProductId, weights: &SignalWeights) {
		self.entry(product_id).like += weights.like;
	}

	pub fn add_purchase(&mut self, product_id: ProductId, qty: i64, weights: &SignalWeights) {
		self.entry(product_id).purchase += qty as f64 * weights.purchase;
	}

	pub fn add_interest(&mut self, product_id: ProductId, decayed: f64) {
		if decayed <= 0.0 {
			return;
		}

		self.entry(product_id).interest += decayed;
	}

	pub fn add_cart(&mut self, product_id: ProductId, qty: i64, weights: &SignalWeights) {
		self.entry(product_id).cart += qty as f64 * weights.cart;
	}

	/// Cancellations both subtract points and place the product on the avoid
	/// set. The avoid set wins over any positive contribution.
	pub fn add_cancelled(&mut self, product_id: ProductId, qty: i64, weights: &SignalWeights) {
		self.entry(product_id).cancelled += qty as f64 * weights.cancelled;

		if qty > 0 {
			self.avoid.insert(product_id);
		}
	}

	pub fn avoid(&self) -> &HashSet<ProductId> {
		&self.avoid
	}

	pub fn breakdown(&self, product_id: ProductId) -> Option<&ScoreBreakdown> {
		self.scores.get(&product_id)
	}

	pub fn signal_count(&self) -> usize {
		self.scores.len()
	}

	/// Products with a positive total, outside the avoid set, ordered by
	/// total descending. Equal totals fall back to product id ascending; the
	/// tie-break is implementation-defined and exists only for determinism.
	pub fn ranked_seeds(&self, cap: usize) -> Vec<ProductId> {
		let mut ranked: Vec<(ProductId, f64)> = self
			.scores
			.iter()
			.filter(|(product_id, breakdown)| {
				breakdown.total() > 0.0 && !self.avoid.contains(product_id)
			})
			.map(|(product_id, breakdown)| (*product_id, breakdown.total()))
			.collect();

		ranked.sort_by(|(lhs_id, lhs_score), (rhs_id, rhs_score)| {
			rhs_score.total_cmp(lhs_score).then_with(|| lhs_id.cmp(rhs_id))
		});
		ranked.truncate(cap);

		ranked.into_iter().map(|(product_id, _)| product_id).collect()
	}

	fn entry(&mut self, product_id: ProductId) -> &mut ScoreBreakdown {
		self.scores.entry(product_id).or_default()
	}
}
