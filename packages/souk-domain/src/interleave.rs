use std::collections::HashSet;

use crate::ProductId;

/// Alternates picks from two ranked pools (position 0 of each, then position
/// 1, ...), skipping duplicates and excluded ids, until `limit` ids are
/// gathered or both pools are exhausted. Used for the global
/// popularity/recency fallback, where `primary` is the top-selling pool and
/// `secondary` the most recently created.
pub fn interleave_pools(
	primary: &[ProductId],
	secondary: &[ProductId],
	exclude: &HashSet<ProductId>,
	limit: usize,
) -> Vec<ProductId> {
	if limit == 0 {
		return Vec::new();
	}

	let mut out = Vec::with_capacity(limit);
	let mut seen: HashSet<ProductId> = exclude.clone();

	for i in 0..primary.len().max(secondary.len()) {
		for pool in [primary, secondary] {
			let Some(product_id) = pool.get(i) else {
				continue;
			};

			if !seen.insert(*product_id) {
				continue;
			}

			out.push(*product_id);

			if out.len() >= limit {
				return out;
			}
		}
	}

	out
}
