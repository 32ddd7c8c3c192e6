//! Redacting wrapper for access and refresh token material.

// self
use crate::_prelude::*;

/// Placeholder rendered by every formatter instead of the wrapped value.
const PLACEHOLDER: &str = "<redacted>";

/// Token material that must never appear in logs or debug output.
///
/// Serialization is transparent so cached entries stay plain strings; every
/// other way of reading the value back is an explicit [`expose`](Self::expose)
/// call at the few places that put the token on the wire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps token material.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Grants access to the wrapped value for wire use (authorization headers,
	/// cache writes, grant bodies).
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self(value.into())
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&PLACEHOLDER).finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(PLACEHOLDER)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::from("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn secret_serializes_as_a_plain_string() {
		let secret = TokenSecret::new("cacheable");
		let json = serde_json::to_string(&secret).expect("Secret should serialize to JSON.");

		assert_eq!(json, "\"cacheable\"");

		let parsed: TokenSecret =
			serde_json::from_str(&json).expect("Plain string should deserialize into a secret.");

		assert_eq!(parsed.expose(), "cacheable");
	}
}
