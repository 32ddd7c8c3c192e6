//! Crate-level error types shared across the broker, the token store, and the API client.

// self
use crate::{_prelude::*, provider::GrantType};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token acquisition failed after exhausting cache, refresh, and login.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Cache-layer failure surfaced through the [`CacheClient`](crate::cache::CacheClient) port.
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		crate::cache::CacheError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Provider rejected an API call with a recognized (or catch-all) error payload.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Transport failure (DNS, TCP, TLS) on the API call path.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Successful response whose payload does not match the expected shape.
	#[error("API response payload could not be decoded: {message}.")]
	Decode {
		/// Parse failure description, including the offending JSON path.
		message: String,
	},
}

/// Token-acquisition failure, terminal for a single
/// [`fetch_token`](crate::broker::TokenBroker::fetch_token) call.
///
/// The type is `Clone` so a single failed exchange can be delivered to every
/// caller coalesced onto it.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// The identity provider rejected the grant exchange.
	#[error("Identity provider rejected the {grant} grant: {message}.")]
	Rejected {
		/// Grant that was being exchanged when the provider refused.
		grant: GrantType,
		/// HTTP status returned by the token endpoint, when available.
		status: Option<u16>,
		/// Provider-supplied failure message.
		message: String,
	},
	/// The token endpoint could not be reached.
	#[error("Network error while calling the token endpoint: {message}.")]
	Network {
		/// Flattened transport failure description.
		message: String,
	},
	/// The token endpoint answered with a payload that is not a token.
	#[error("Token endpoint returned a malformed payload: {message}.")]
	MalformedResponse {
		/// Parse failure description, including the offending JSON path.
		message: String,
	},
}

/// Configuration and validation failures raised during wiring.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Provider base URL cannot be parsed into a token endpoint.
	#[error("Provider base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A request path does not combine with the base URL into a valid URL.
	#[error("Request path `{path}` is invalid.")]
	InvalidRequestPath {
		/// Path that failed to combine with the base URL.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A required credential is missing or empty.
	#[error("Required credential `{field}` is missing or empty.")]
	MissingCredential {
		/// Name of the offending option field.
		field: &'static str,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures on the business-call path (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the invoicing API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Typed rejection reported by the invoicing API's error payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("{kind}: {message}.")]
pub struct ApiError {
	/// Classified rejection kind.
	pub kind: ApiErrorKind,
	/// Error code string extracted from the payload.
	pub error_code: String,
	/// Joined detail list forming a human-readable message.
	pub message: String,
	/// Individual detail entries reported by the provider.
	pub details: Vec<String>,
}
impl ApiError {
	/// Builds an error from a payload error code, classifying unrecognized codes
	/// as [`ApiErrorKind::UnhandledStatus`].
	pub fn from_payload(error_code: String, message: String, details: Vec<String>) -> Self {
		let kind = error_code
			.parse::<u16>()
			.ok()
			.and_then(ApiErrorKind::from_code)
			.unwrap_or(ApiErrorKind::UnhandledStatus);
		let message = if matches!(kind, ApiErrorKind::UnhandledStatus) {
			format!("Unknown error: {message}")
		} else {
			message
		};

		Self { kind, error_code, message, details }
	}
}

/// Classified API rejection kinds, one per provider error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorKind {
	/// Provider code 502.
	BadGateway,
	/// Provider code 403.
	Forbidden,
	/// Provider code 504.
	GatewayTimeout,
	/// Provider code 410.
	Gone,
	/// Provider code 400.
	InvalidRequest,
	/// Provider code 404.
	NotFound,
	/// Provider code 503.
	ServiceUnavailable,
	/// Provider code 401.
	Unauthorized,
	/// Catch-all for codes outside the recognized set.
	UnhandledStatus,
}
impl ApiErrorKind {
	/// Maps a numeric provider error code onto a kind, when recognized.
	pub fn from_code(code: u16) -> Option<Self> {
		match code {
			400 => Some(Self::InvalidRequest),
			401 => Some(Self::Unauthorized),
			403 => Some(Self::Forbidden),
			404 => Some(Self::NotFound),
			410 => Some(Self::Gone),
			502 => Some(Self::BadGateway),
			503 => Some(Self::ServiceUnavailable),
			504 => Some(Self::GatewayTimeout),
			_ => None,
		}
	}

	/// Returns the numeric code backing the kind, if it has one.
	pub fn code(self) -> Option<u16> {
		match self {
			Self::InvalidRequest => Some(400),
			Self::Unauthorized => Some(401),
			Self::Forbidden => Some(403),
			Self::NotFound => Some(404),
			Self::Gone => Some(410),
			Self::BadGateway => Some(502),
			Self::ServiceUnavailable => Some(503),
			Self::GatewayTimeout => Some(504),
			Self::UnhandledStatus => None,
		}
	}

	/// Returns a stable label suitable for logs and messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::BadGateway => "bad gateway",
			Self::Forbidden => "forbidden",
			Self::GatewayTimeout => "gateway timeout",
			Self::Gone => "gone",
			Self::InvalidRequest => "invalid request",
			Self::NotFound => "not found",
			Self::ServiceUnavailable => "service unavailable",
			Self::Unauthorized => "unauthorized",
			Self::UnhandledStatus => "unhandled status",
		}
	}
}
impl Display for ApiErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn error_code_mapping_covers_the_taxonomy() {
		assert_eq!(ApiErrorKind::from_code(400), Some(ApiErrorKind::InvalidRequest));
		assert_eq!(ApiErrorKind::from_code(401), Some(ApiErrorKind::Unauthorized));
		assert_eq!(ApiErrorKind::from_code(403), Some(ApiErrorKind::Forbidden));
		assert_eq!(ApiErrorKind::from_code(404), Some(ApiErrorKind::NotFound));
		assert_eq!(ApiErrorKind::from_code(410), Some(ApiErrorKind::Gone));
		assert_eq!(ApiErrorKind::from_code(502), Some(ApiErrorKind::BadGateway));
		assert_eq!(ApiErrorKind::from_code(503), Some(ApiErrorKind::ServiceUnavailable));
		assert_eq!(ApiErrorKind::from_code(504), Some(ApiErrorKind::GatewayTimeout));
		assert_eq!(ApiErrorKind::from_code(418), None);
	}

	#[test]
	fn unrecognized_codes_fall_back_to_unhandled_status() {
		let err = ApiError::from_payload("E-9000".into(), "boom".into(), vec!["boom".into()]);

		assert_eq!(err.kind, ApiErrorKind::UnhandledStatus);
		assert_eq!(err.error_code, "E-9000");
		assert_eq!(err.message, "Unknown error: boom");

		let err = ApiError::from_payload("401".into(), "expired".into(), vec!["expired".into()]);

		assert_eq!(err.kind, ApiErrorKind::Unauthorized);
		assert_eq!(err.message, "expired");
	}

	#[test]
	fn auth_error_clones_carry_the_same_rejection() {
		let err = AuthError::Rejected {
			grant: GrantType::Password,
			status: Some(401),
			message: "bad credentials".into(),
		};

		assert_eq!(err.clone(), err);
		assert!(err.to_string().contains("password"));
	}
}
