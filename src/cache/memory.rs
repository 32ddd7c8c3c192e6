//! Thread-safe in-process [`CacheClient`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	cache::{CacheClient, CacheFuture},
};

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	expires_at: OffsetDateTime,
}

type EntryMap = Arc<RwLock<HashMap<String, Entry>>>;

/// In-process cache that honors per-entry TTLs, for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(EntryMap);
impl MemoryCache {
	fn get_now(map: EntryMap, key: String) -> Option<String> {
		let guard = map.read();
		let entry = guard.get(&key)?;

		if OffsetDateTime::now_utc() >= entry.expires_at {
			return None;
		}

		Some(entry.value.clone())
	}

	fn set_now(map: EntryMap, key: String, value: String, ttl: Duration) {
		let entry = Entry { value, expires_at: OffsetDateTime::now_utc() + ttl };

		map.write().insert(key, entry);
	}

	fn delete_now(map: EntryMap, key: String) {
		map.write().remove(&key);
	}
}
impl CacheClient for MemoryCache {
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Ok(Self::get_now(map, key)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			Self::set_now(map, key, value, ttl);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			Self::delete_now(map, key);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn set_then_get_round_trips() {
		let cache = MemoryCache::default();

		cache
			.set("alpha", "one".into(), Duration::minutes(5))
			.await
			.expect("Memory cache set should succeed.");

		let value = cache.get("alpha").await.expect("Memory cache get should succeed.");

		assert_eq!(value.as_deref(), Some("one"));
	}

	#[tokio::test]
	async fn expired_entries_read_as_absent() {
		let cache = MemoryCache::default();

		cache
			.set("beta", "two".into(), Duration::seconds(-1))
			.await
			.expect("Memory cache set should succeed.");

		let value = cache.get("beta").await.expect("Memory cache get should succeed.");

		assert_eq!(value, None);
	}

	#[tokio::test]
	async fn delete_removes_the_entry() {
		let cache = MemoryCache::default();

		cache
			.set("gamma", "three".into(), Duration::minutes(5))
			.await
			.expect("Memory cache set should succeed.");
		cache.delete("gamma").await.expect("Memory cache delete should succeed.");

		let value = cache.get("gamma").await.expect("Memory cache get should succeed.");

		assert_eq!(value, None);
	}
}
