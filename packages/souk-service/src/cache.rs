use std::{collections::HashMap, sync::Mutex, time::Duration};

use serde_json::Value;
use tokio::time::Instant;

use souk_config::RecsCacheTtl;
use souk_domain::{Subject, UserId};

use crate::{BoxFuture, RecsCache};

/// Typed cache key. Every key renders to a stable string so invalidation can
/// match all entries belonging to one user by prefix, whatever the cached
/// sizes in use.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CacheKey {
	Recommendations { subject: Subject, size: usize },
	HomeSections { subject: Subject },
}
impl CacheKey {
	pub fn render(&self) -> String {
		match self {
			Self::Recommendations { subject: Subject::User(id), size } => {
				format!("recs:u:{id}:{size}")
			},
			Self::Recommendations { subject: Subject::Anonymous, size } => {
				format!("recs:anon:{size}")
			},
			Self::HomeSections { subject: Subject::User(id) } => format!("sections:u:{id}"),
			Self::HomeSections { subject: Subject::Anonymous } => "sections:anon".to_string(),
		}
	}
}

/// TTL per subject kind: authenticated lists live longest, anonymous lists
/// are shared and refresh faster, home sections fastest.
#[derive(Clone, Copy, Debug)]
pub struct TtlPolicy {
	pub user: Duration,
	pub anon: Duration,
	pub sections: Duration,
}
impl TtlPolicy {
	pub fn from_config(cfg: &RecsCacheTtl) -> Self {
		Self {
			user: Duration::from_secs(cfg.user_ttl_secs),
			anon: Duration::from_secs(cfg.anon_ttl_secs),
			sections: Duration::from_secs(cfg.section_ttl_secs),
		}
	}

	pub fn ttl_for(&self, key: &CacheKey) -> Duration {
		match key {
			CacheKey::Recommendations { subject, .. } =>
				if subject.is_anonymous() { self.anon } else { self.user },
			CacheKey::HomeSections { .. } => self.sections,
		}
	}
}

pub(crate) fn user_key_prefixes(user_id: UserId) -> [String; 2] {
	[format!("recs:u:{user_id}:"), format!("sections:u:{user_id}")]
}

struct Entry {
	value: Value,
	deadline: Instant,
}

/// In-process result cache. Entries are immutable once written and replaced
/// wholesale; an expired entry is dropped on the read that finds it.
#[derive(Default)]
pub struct MemoryRecsCache {
	entries: Mutex<HashMap<String, Entry>>,
}
impl MemoryRecsCache {
	pub fn new() -> Self {
		Self::default()
	}
}
impl RecsCache for MemoryRecsCache {
	fn get<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, color_eyre::Result<Option<Value>>> {
		Box::pin(async move {
			let rendered = key.render();
			let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
			let Some(entry) = entries.get(&rendered) else {
				return Ok(None);
			};

			if entry.deadline <= Instant::now() {
				entries.remove(&rendered);

				return Ok(None);
			}

			Ok(Some(entry.value.clone()))
		})
	}

	fn put<'a>(
		&'a self,
		key: &'a CacheKey,
		value: Value,
		ttl: Duration,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

			entries.insert(key.render(), Entry { value, deadline: Instant::now() + ttl });

			Ok(())
		})
	}

	fn invalidate_user<'a>(&'a self, user_id: UserId) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let prefixes = user_key_prefixes(user_id);
			let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

			entries.retain(|rendered, _| !prefixes.iter().any(|prefix| rendered.starts_with(prefix)));

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keys_render_per_subject_and_size() {
		assert_eq!(
			CacheKey::Recommendations { subject: Subject::User(7), size: 5 }.render(),
			"recs:u:7:5"
		);
		assert_eq!(
			CacheKey::Recommendations { subject: Subject::Anonymous, size: 5 }.render(),
			"recs:anon:5"
		);
		assert_eq!(CacheKey::HomeSections { subject: Subject::User(7) }.render(), "sections:u:7");
		assert_eq!(CacheKey::HomeSections { subject: Subject::Anonymous }.render(), "sections:anon");
	}

	#[tokio::test]
	async fn invalidation_removes_every_size_for_the_user() {
		let cache = MemoryRecsCache::new();
		let ttl = Duration::from_secs(60);

		for size in [5, 8] {
			let key = CacheKey::Recommendations { subject: Subject::User(7), size };

			cache.put(&key, serde_json::json!([1, 2]), ttl).await.unwrap();
		}

		let sections = CacheKey::HomeSections { subject: Subject::User(7) };
		let anon = CacheKey::Recommendations { subject: Subject::Anonymous, size: 5 };

		cache.put(&sections, serde_json::json!([]), ttl).await.unwrap();
		cache.put(&anon, serde_json::json!([3]), ttl).await.unwrap();
		cache.invalidate_user(7).await.unwrap();

		for size in [5, 8] {
			let key = CacheKey::Recommendations { subject: Subject::User(7), size };

			assert!(cache.get(&key).await.unwrap().is_none());
		}

		assert!(cache.get(&sections).await.unwrap().is_none());
		assert!(cache.get(&anon).await.unwrap().is_some());
	}

	#[tokio::test(start_paused = true)]
	async fn entries_expire_at_their_deadline() {
		let cache = MemoryRecsCache::new();
		let key = CacheKey::Recommendations { subject: Subject::Anonymous, size: 5 };

		cache.put(&key, serde_json::json!([1]), Duration::from_secs(300)).await.unwrap();

		assert!(cache.get(&key).await.unwrap().is_some());

		tokio::time::advance(Duration::from_secs(301)).await;

		assert!(cache.get(&key).await.unwrap().is_none());
	}
}
