use std::collections::HashMap;

use crate::{CategoryId, ProductId};

/// Bucket for products without a category. They still count toward a cap so
/// a page cannot fill up with uncategorized items either.
pub const NO_CATEGORY: CategoryId = -1;

/// Caps how many results may share one category while preserving the input
/// order. A stable single pass, not a re-sort: a product is kept only while
/// its category's running count is below `max_per_category`, and the output
/// stops at `limit`.
pub fn cap_per_category(
	ordered: &[ProductId],
	categories: &HashMap<ProductId, CategoryId>,
	max_per_category: usize,
	limit: usize,
) -> Vec<ProductId> {
	if ordered.is_empty() || limit == 0 || max_per_category == 0 {
		return Vec::new();
	}

	let mut per_category: HashMap<CategoryId, usize> = HashMap::new();
	let mut out = Vec::with_capacity(limit.min(ordered.len()));

	for product_id in ordered {
		let category = categories.get(product_id).copied().unwrap_or(NO_CATEGORY);
		let count = per_category.entry(category).or_insert(0);

		if *count >= max_per_category {
			continue;
		}

		*count += 1;

		out.push(*product_id);

		if out.len() >= limit {
			break;
		}
	}

	out
}
