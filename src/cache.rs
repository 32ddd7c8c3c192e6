//! Cache client port and the built-in in-process implementation.
//!
//! The broker treats the cache as the single source of truth shared across
//! service instances. Production deployments plug a distributed backend (the
//! original deployment used Memcached) in behind [`CacheClient`]; tests and
//! local development use [`MemoryCache`].

pub mod memory;

pub use memory::MemoryCache;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CacheClient`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Key/value store contract consumed by the token store.
///
/// Values are opaque strings (the token store serializes JSON into them) and
/// every entry carries its own TTL. Implementations must be shareable behind
/// `Arc<dyn CacheClient>`.
pub trait CacheClient
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if present and not expired.
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

	/// Stores `value` under `key` with the provided time-to-live.
	fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()>;

	/// Removes the entry stored under `key`, if any.
	fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()>;
}

/// Error type produced by [`CacheClient`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// The backend could not be reached.
	#[error("Cache connection failed: {message}.")]
	Connection {
		/// Human-readable error payload.
		message: String,
	},
	/// A single operation failed on an otherwise healthy connection.
	#[error("Cache {operation} failed for key `{key}`: {message}.")]
	Operation {
		/// Operation label (`get`, `set`, `delete`).
		operation: String,
		/// Key the operation targeted.
		key: String,
		/// Human-readable error payload.
		message: String,
	},
	/// The key is not acceptable to the backend (length, characters).
	#[error("Cache key `{key}` is invalid: {reason}.")]
	InvalidKey {
		/// Offending key.
		key: String,
		/// Validation failure description.
		reason: String,
	},
}
