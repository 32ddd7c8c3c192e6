//! Issued token model and the cache-side metadata that tracks its expiry.

// self
use crate::{_prelude::*, auth::secret::TokenSecret};

/// Bearer token issued by the identity provider.
///
/// Immutable once issued; a refresh or login produces a replacement value,
/// never a mutation. Field names follow the provider's wire format.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the provider (typically `Bearer`).
	#[serde(default)]
	pub token_type: String,
	/// Lifetime in seconds as reported at issuance.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<u64>,
}
impl Token {
	/// Lifetime assumed when the provider omits `expires_in`.
	pub const DEFAULT_LIFETIME_SECS: u64 = 3600;

	/// Returns the effective lifetime in seconds, defaulting when unreported.
	pub fn lifetime_seconds(&self) -> u64 {
		self.expires_in.unwrap_or(Self::DEFAULT_LIFETIME_SECS)
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Cache record wrapping a [`Token`] with issuance and expiry instants.
///
/// Stored JSON-serialized under a fixed cache key; replaced wholesale on every
/// successful exchange. Invariant: `expires_at > cached_at`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
	/// The issued token.
	pub token: Token,
	/// Issuance instant, epoch seconds.
	pub cached_at: i64,
	/// Expiry instant, epoch seconds (`cached_at` plus the token lifetime).
	pub expires_at: i64,
}
impl TokenMetadata {
	/// Stamps a freshly issued token with its issuance and expiry instants.
	pub fn issue(token: Token, now: OffsetDateTime) -> Self {
		let cached_at = now.unix_timestamp();
		let expires_at = cached_at + token.lifetime_seconds() as i64;

		Self { token, cached_at, expires_at }
	}

	/// Seconds left before expiry at the provided instant, clamped at zero.
	pub fn remaining_at(&self, now: OffsetDateTime) -> u64 {
		(self.expires_at - now.unix_timestamp()).max(0) as u64
	}
}
