/// Default half-life for interest signals, in days.
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 14.0;

/// Exponential half-life decay of a raw signal score.
///
/// Age is clamped to >= 0 so rows stamped in the future contribute at full
/// weight. The result is clamped to >= 0; a contribution never turns
/// negative through decay alone.
pub fn decayed_score(raw: f64, age_days: f64, half_life_days: f64) -> f64 {
	if half_life_days <= 0.0 {
		return raw.max(0.0);
	}

	let age = age_days.max(0.0);
	let lambda = std::f64::consts::LN_2 / half_life_days;

	(raw * (-lambda * age).exp()).max(0.0)
}

/// Age in fractional days between two timestamps, clamped to >= 0.
pub fn age_in_days(now: time::OffsetDateTime, then: time::OffsetDateTime) -> f64 {
	((now - then).as_seconds_f64() / 86_400.0).max(0.0)
}
