use souk_domain::{ProductId, Subject};

use crate::{ServiceError, ServiceResult, SoukService};

/// Interest weights by originating event.
pub const VIEW_WEIGHT: i64 = 1;
pub const CHECKOUT_WEIGHT: i64 = 2;
pub const LIKE_WEIGHT: i64 = 3;

/// Upper bound on distinct cart products swept in one cart-interest pass.
const CART_SWEEP_CAP: i64 = 500;

impl SoukService {
	/// Adds `max(1, weight)` to the (subject, product) interest score and
	/// evicts the subject's cached recommendations. A no-op for anonymous
	/// subjects; they carry no signal.
	pub async fn record_product_interest(
		&self,
		subject: Subject,
		product_id: ProductId,
		weight: i64,
	) -> ServiceResult<()> {
		let Some(user_id) = subject.user_id() else {
			return Ok(());
		};

		if product_id <= 0 {
			return Err(ServiceError::InvalidRequest {
				message: "product_id must be positive.".to_string(),
			});
		}

		self.sources.signals.add_interest(user_id, &[product_id], weight.max(1)).await?;
		self.invalidate_subject(user_id).await;

		Ok(())
	}

	/// Sweeps the subject's current cart and adds `max(1, weight)` interest
	/// to every distinct product in it. The upsert tolerates concurrent
	/// sweeps; duplicate-insert races resolve to one row per product.
	pub async fn record_cart_interest(&self, subject: Subject, weight: i64) -> ServiceResult<()> {
		let Some(user_id) = subject.user_id() else {
			return Ok(());
		};
		let product_ids = self.sources.signals.cart_product_ids(user_id, CART_SWEEP_CAP).await?;

		if product_ids.is_empty() {
			return Ok(());
		}

		self.sources.signals.add_interest(user_id, &product_ids, weight.max(1)).await?;
		self.invalidate_subject(user_id).await;

		Ok(())
	}

	/// Flips like-set membership and returns the new state. Creating a like
	/// also records a strong interest signal; removing one only evicts the
	/// cache. Requires an authenticated subject.
	pub async fn toggle_like(&self, subject: Subject, product_id: ProductId) -> ServiceResult<bool> {
		let Some(user_id) = subject.user_id() else {
			return Err(ServiceError::InvalidRequest {
				message: "Toggling a like requires an authenticated subject.".to_string(),
			});
		};

		if product_id <= 0 {
			return Err(ServiceError::InvalidRequest {
				message: "product_id must be positive.".to_string(),
			});
		}

		let liked = self.sources.signals.toggle_like(user_id, product_id).await?;

		if liked {
			self.sources.signals.add_interest(user_id, &[product_id], LIKE_WEIGHT).await?;
		}

		self.invalidate_subject(user_id).await;

		Ok(liked)
	}

	/// The subset of `ids` the subject has liked, for page assembly. Always
	/// empty for anonymous subjects.
	pub async fn liked_among(
		&self,
		subject: Subject,
		ids: &[ProductId],
	) -> ServiceResult<Vec<ProductId>> {
		let Some(user_id) = subject.user_id() else {
			return Ok(Vec::new());
		};

		Ok(self.sources.signals.liked_among(user_id, ids).await?)
	}
}
