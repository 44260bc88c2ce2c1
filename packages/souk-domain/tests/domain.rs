use std::collections::{HashMap, HashSet};

use time::OffsetDateTime;

use souk_domain::{
	Subject,
	decay::{DEFAULT_HALF_LIFE_DAYS, age_in_days, decayed_score},
	diversity::cap_per_category,
	interleave::interleave_pools,
	scoring::{ScoreBreakdown, SeedScores, SignalWeights},
};

#[test]
fn decay_is_identity_at_age_zero() {
	assert_eq!(decayed_score(100.0, 0.0, DEFAULT_HALF_LIFE_DAYS), 100.0);
}

#[test]
fn decay_halves_at_one_half_life() {
	let half = decayed_score(100.0, 14.0, 14.0);

	assert!((half - 50.0).abs() < 1e-9);
}

#[test]
fn decay_tends_to_zero_and_never_goes_negative() {
	let ancient = decayed_score(100.0, 10_000.0, 14.0);

	assert!(ancient >= 0.0);
	assert!(ancient < 1e-6);
}

#[test]
fn decay_clamps_future_timestamps_to_age_zero() {
	assert_eq!(decayed_score(42.0, -3.0, 14.0), 42.0);

	let now = OffsetDateTime::from_unix_timestamp(1_000_000).unwrap();
	let future = now + time::Duration::days(2);

	assert_eq!(age_in_days(now, future), 0.0);
}

#[test]
fn age_in_days_is_fractional() {
	let then = OffsetDateTime::from_unix_timestamp(0).unwrap();
	let now = then + time::Duration::hours(36);

	assert!((age_in_days(now, then) - 1.5).abs() < 1e-9);
}

#[test]
fn breakdown_total_subtracts_cancellations() {
	let breakdown =
		ScoreBreakdown { like: 8.0, purchase: 10.0, interest: 1.5, cart: 4.0, cancelled: 6.0 };

	assert!((breakdown.total() - 17.5).abs() < 1e-9);
}

#[test]
fn seeds_rank_by_total_score_descending() {
	let weights = SignalWeights::default();
	let mut scores = SeedScores::new();

	scores.add_like(1, &weights);
	scores.add_purchase(2, 3, &weights);
	scores.add_cart(3, 1, &weights);

	assert_eq!(scores.ranked_seeds(10), vec![2, 1, 3]);
}

#[test]
fn seeds_tie_break_on_product_id_ascending() {
	let weights = SignalWeights::default();
	let mut scores = SeedScores::new();

	scores.add_like(9, &weights);
	scores.add_like(4, &weights);
	scores.add_like(7, &weights);

	assert_eq!(scores.ranked_seeds(10), vec![4, 7, 9]);
}

#[test]
fn cancelled_products_are_avoided_despite_positive_signals() {
	let weights = SignalWeights::default();
	let mut scores = SeedScores::new();

	scores.add_like(5, &weights);
	scores.add_purchase(5, 10, &weights);
	scores.add_cancelled(5, 1, &weights);

	assert!(scores.avoid().contains(&5));
	assert!(scores.ranked_seeds(10).is_empty());
}

#[test]
fn non_positive_totals_are_filtered() {
	let weights = SignalWeights::default();
	let mut scores = SeedScores::new();

	// Negative-only contribution on one product, zero decayed interest on
	// another.
	scores.add_cancelled(1, 2, &weights);
	scores.add_interest(2, 0.0);

	assert!(scores.ranked_seeds(10).is_empty());
}

#[test]
fn seed_cap_truncates() {
	let weights = SignalWeights::default();
	let mut scores = SeedScores::new();

	for product_id in 1..=20 {
		scores.add_like(product_id, &weights);
	}

	assert_eq!(scores.ranked_seeds(5).len(), 5);
}

#[test]
fn diversity_caps_each_category_and_preserves_order() {
	let ordered = vec![1, 2, 3, 4, 5, 6];
	let categories: HashMap<_, _> =
		[(1, 10), (2, 10), (3, 10), (4, 20), (5, 20), (6, 30)].into_iter().collect();
	let kept = cap_per_category(&ordered, &categories, 2, 10);

	assert_eq!(kept, vec![1, 2, 4, 5, 6]);
}

#[test]
fn diversity_counts_uncategorized_against_one_bucket() {
	let ordered = vec![1, 2, 3];
	let categories = HashMap::new();
	let kept = cap_per_category(&ordered, &categories, 2, 10);

	assert_eq!(kept, vec![1, 2]);
}

#[test]
fn diversity_respects_limit() {
	let ordered = vec![1, 2, 3, 4];
	let categories: HashMap<_, _> =
		[(1, 1), (2, 2), (3, 3), (4, 4)].into_iter().collect();

	assert_eq!(cap_per_category(&ordered, &categories, 2, 3), vec![1, 2, 3]);
	assert!(cap_per_category(&ordered, &categories, 2, 0).is_empty());
}

#[test]
fn interleave_alternates_pools() {
	let primary = vec![1, 2, 3];
	let secondary = vec![4, 5, 6];
	let out = interleave_pools(&primary, &secondary, &HashSet::new(), 6);

	assert_eq!(out, vec![1, 4, 2, 5, 3, 6]);
}

#[test]
fn interleave_skips_duplicates_and_excluded() {
	let primary = vec![1, 2, 3];
	let secondary = vec![2, 1, 4];
	let exclude: HashSet<_> = [3].into_iter().collect();
	let out = interleave_pools(&primary, &secondary, &exclude, 10);

	assert_eq!(out, vec![1, 2, 4]);
}

#[test]
fn interleave_stops_at_limit() {
	let primary = vec![1, 2, 3, 4];
	let secondary = vec![5, 6, 7, 8];

	assert_eq!(interleave_pools(&primary, &secondary, &HashSet::new(), 3), vec![1, 5, 2]);
}

#[test]
fn subject_resolution_collapses_invalid_ids() {
	assert_eq!(Subject::from_user_id(Some(7)), Subject::User(7));
	assert_eq!(Subject::from_user_id(Some(0)), Subject::Anonymous);
	assert_eq!(Subject::from_user_id(Some(-1)), Subject::Anonymous);
	assert_eq!(Subject::from_user_id(None), Subject::Anonymous);
	assert!(Subject::Anonymous.is_anonymous());
	assert_eq!(Subject::User(7).user_id(), Some(7));
}
