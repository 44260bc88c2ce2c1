use time::OffsetDateTime;

use souk_domain::{ProductId, UserId};

#[derive(Debug, sqlx::FromRow)]
pub struct ProductInterest {
	pub user_id: UserId,
	pub product_id: ProductId,
	pub score: i64,
	pub updated_at: OffsetDateTime,
}
