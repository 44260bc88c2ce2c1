pub mod decay;
pub mod diversity;
pub mod interleave;
pub mod scoring;

use serde::{Deserialize, Serialize};

pub type ProductId = i64;
pub type CategoryId = i64;
pub type UserId = i64;

/// The unit of personalization. Anything that cannot be resolved to an
/// authenticated user id collapses to `Anonymous`; an inconsistent identity
/// is never an error on the recommendation path.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Subject {
	User(UserId),
	Anonymous,
}
impl Subject {
	pub fn from_user_id(user_id: Option<UserId>) -> Self {
		match user_id {
			Some(id) if id > 0 => Self::User(id),
			_ => Self::Anonymous,
		}
	}

	pub fn user_id(&self) -> Option<UserId> {
		match self {
			Self::User(id) => Some(*id),
			Self::Anonymous => None,
		}
	}

	pub fn is_anonymous(&self) -> bool {
		matches!(self, Self::Anonymous)
	}
}
