//! Cache-backed persistence for the current token and its expiry metadata.
//!
//! The store owns the two well-known cache keys shared by every service
//! instance: one JSON [`TokenMetadata`] record for the access token and a
//! separate, longer-lived entry holding only the refresh token so a refresh
//! remains possible after the metadata entry has expired from cache. Reads
//! never fail: cache outages and unparsable entries degrade to "absent" so
//! callers fall back to a fresh login instead of crashing.

// self
use crate::{
	_prelude::*,
	auth::{Token, TokenMetadata},
	cache::{CacheClient, CacheError},
	obs,
};

/// Cache key holding the JSON-serialized [`TokenMetadata`] record.
pub const TOKEN_METADATA_KEY: &str = "factus_token_metadata";
/// Cache key holding the bare refresh token string.
pub const REFRESH_TOKEN_KEY: &str = "factus_refresh_token";

/// Slack added to the metadata TTL past the token's own lifetime, so the
/// entry outlives the token it describes.
const METADATA_TTL_SLACK: Duration = Duration::seconds(60);
/// Fixed TTL for the refresh-token entry, independent of the access token's.
const REFRESH_TOKEN_TTL: Duration = Duration::seconds(3600);

/// Shared-across-instances persistence of the current token and its expiry.
#[derive(Clone)]
pub struct TokenStore {
	cache: Arc<dyn CacheClient>,
}
impl TokenStore {
	/// Creates a store on top of the provided cache client.
	pub fn new(cache: Arc<dyn CacheClient>) -> Self {
		Self { cache }
	}

	/// Persists a freshly issued token.
	///
	/// Stamps issuance/expiry instants, writes the metadata record with
	/// TTL = lifetime + 60 s, and, when the token carries a refresh token,
	/// writes it separately under its fixed longer TTL.
	pub async fn save(&self, token: &Token) -> Result<(), CacheError> {
		let metadata = TokenMetadata::issue(token.clone(), OffsetDateTime::now_utc());
		let serialized = serde_json::to_string(&metadata).map_err(|err| CacheError::Operation {
			operation: "set".into(),
			key: TOKEN_METADATA_KEY.into(),
			message: err.to_string(),
		})?;
		let ttl = Duration::seconds(token.lifetime_seconds() as i64) + METADATA_TTL_SLACK;

		self.cache.set(TOKEN_METADATA_KEY, serialized, ttl).await?;

		if let Some(refresh) = token.refresh_token.as_ref() {
			self.cache.set(REFRESH_TOKEN_KEY, refresh.expose().to_owned(), REFRESH_TOKEN_TTL).await?;
		}

		Ok(())
	}

	/// Returns the cached token when more than `refresh_buffer` of its
	/// lifetime remains, `None` otherwise.
	///
	/// The buffer proactively treats a token as invalid ahead of literal
	/// expiry so outbound calls never race the provider's clock.
	pub async fn read_valid(&self, refresh_buffer: Duration) -> Option<Token> {
		let metadata = self.read_metadata().await?;
		let remaining = metadata.remaining_at(OffsetDateTime::now_utc());

		if Duration::seconds(remaining as i64) <= refresh_buffer {
			return None;
		}

		Some(metadata.token)
	}

	/// Seconds left before the cached token expires; 0 when absent or unreadable.
	pub async fn remaining_seconds(&self) -> u64 {
		match self.read_metadata().await {
			Some(metadata) => metadata.remaining_at(OffsetDateTime::now_utc()),
			None => 0,
		}
	}

	/// Reads the stored refresh token, `None` on absence or cache failure.
	pub async fn refresh_token(&self) -> Option<String> {
		match self.cache.get(REFRESH_TOKEN_KEY).await {
			Ok(value) => value,
			Err(err) => {
				obs::warn_degraded("refresh token read", &err);

				None
			},
		}
	}

	/// Deletes the refresh-token entry so the next fetch performs a full login.
	pub async fn clear_refresh_token(&self) {
		if let Err(err) = self.cache.delete(REFRESH_TOKEN_KEY).await {
			obs::warn_degraded("refresh token delete", &err);
		}
	}

	async fn read_metadata(&self) -> Option<TokenMetadata> {
		let raw = match self.cache.get(TOKEN_METADATA_KEY).await {
			Ok(value) => value?,
			Err(err) => {
				obs::warn_degraded("metadata read", &err);

				return None;
			},
		};

		match serde_json::from_str(&raw) {
			Ok(metadata) => Some(metadata),
			Err(err) => {
				obs::warn_degraded("metadata parse", &err);

				None
			},
		}
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenStore")
			.field("metadata_key", &TOKEN_METADATA_KEY)
			.field("refresh_key", &REFRESH_TOKEN_KEY)
			.finish()
	}
}
