//! Identity-provider configuration and the token-endpoint exchange client.
//!
//! [`ProviderOptions`] carries the validated credential set and the derived
//! token endpoint. [`TokenExchanger`] is the seam between the broker and the
//! HTTP stack: the broker only ever asks for a login or a refresh exchange,
//! so alternative transports (or test doubles) plug in without touching the
//! broker itself. [`ProviderClient`] is the default reqwest-backed
//! implementation speaking the provider's JSON-bodied grant requests.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::Token,
	error::{AuthError, ConfigError},
};

/// Path of the provider's token endpoint, relative to the base URL.
const TOKEN_ENDPOINT_PATH: &str = "/oauth/token";
/// Default bound on a single token exchange.
const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// OAuth 2.0 grant types exchanged against the provider's token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Resource Owner Password grant used for full logins.
	Password,
	/// Refresh Token grant for renewing an issued token.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::Password => "password",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Validated provider configuration consumed by the exchange client.
#[derive(Clone)]
pub struct ProviderOptions {
	/// Provider base URL outbound API calls are resolved against.
	pub base_url: Url,
	/// Token endpoint derived from the base URL.
	pub token_endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: String,
	/// Resource-owner username for the password grant.
	pub username: String,
	/// Resource-owner password for the password grant.
	pub password: String,
	/// Bound on a single token exchange.
	pub timeout: StdDuration,
}
impl ProviderOptions {
	/// Builds an option set, validating that every credential is present and
	/// that the base URL yields a parsable token endpoint.
	pub fn new(
		base_url: impl AsRef<str>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let client_id = require("client_id", client_id.into())?;
		let client_secret = require("client_secret", client_secret.into())?;
		let username = require("username", username.into())?;
		let password = require("password", password.into())?;
		let raw_base = base_url.as_ref().trim_end_matches('/');
		let base_url =
			Url::parse(raw_base).map_err(|source| ConfigError::InvalidBaseUrl { source })?;
		let token_endpoint = Url::parse(&format!("{raw_base}{TOKEN_ENDPOINT_PATH}"))
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		Ok(Self {
			base_url,
			token_endpoint,
			client_id,
			client_secret,
			username,
			password,
			timeout: DEFAULT_TIMEOUT,
		})
	}

	/// Overrides the exchange timeout (defaults to 30 seconds).
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}
}
impl Debug for ProviderOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderOptions")
			.field("base_url", &self.base_url.as_str())
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret_set", &!self.client_secret.is_empty())
			.field("username", &self.username)
			.field("password_set", &!self.password.is_empty())
			.field("timeout", &self.timeout)
			.finish()
	}
}

fn require(field: &'static str, value: String) -> Result<String, ConfigError> {
	if value.trim().is_empty() { Err(ConfigError::MissingCredential { field }) } else { Ok(value) }
}

/// Boxed future returned by [`TokenExchanger`] operations.
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<Token, AuthError>> + 'a + Send>>;

/// Token-endpoint exchange contract consumed by the broker.
pub trait TokenExchanger
where
	Self: 'static + Send + Sync,
{
	/// Performs a password-grant login with the configured credentials.
	fn login(&self) -> ExchangeFuture<'_>;

	/// Exchanges a refresh token for a replacement token.
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> ExchangeFuture<'a>;
}

/// JSON body sent to the token endpoint for both grants.
#[cfg(any(feature = "reqwest", test))]
#[derive(Serialize)]
struct TokenRequest<'a> {
	grant_type: GrantType,
	client_id: &'a str,
	client_secret: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	username: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	password: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	refresh_token: Option<&'a str>,
}

#[cfg(feature = "reqwest")]
/// Reqwest-backed token-endpoint client.
///
/// Token requests do not follow redirects, matching OAuth 2.0 guidance that
/// token endpoints return results directly instead of delegating to another
/// URI.
#[derive(Clone, Debug)]
pub struct ProviderClient {
	http: ReqwestClient,
	options: ProviderOptions,
}
#[cfg(feature = "reqwest")]
impl ProviderClient {
	/// Builds a client with its own transport honoring the options' timeout.
	pub fn new(options: ProviderOptions) -> Result<Self, ConfigError> {
		let http = ReqwestClient::builder()
			.timeout(options.timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self { http, options })
	}

	/// Wraps an existing [`ReqwestClient`]; the caller keeps responsibility
	/// for timeout and redirect policy.
	pub fn with_client(http: ReqwestClient, options: ProviderOptions) -> Self {
		Self { http, options }
	}

	/// Returns the options the client was built from.
	pub fn options(&self) -> &ProviderOptions {
		&self.options
	}

	async fn exchange(&self, grant: GrantType, refresh_token: Option<&str>) -> Result<Token, AuthError> {
		let (username, password) = match grant {
			GrantType::Password =>
				(Some(self.options.username.as_str()), Some(self.options.password.as_str())),
			GrantType::RefreshToken => (None, None),
		};
		let body = TokenRequest {
			grant_type: grant,
			client_id: &self.options.client_id,
			client_secret: &self.options.client_secret,
			username,
			password,
			refresh_token,
		};
		let response = self
			.http
			.post(self.options.token_endpoint.clone())
			.json(&body)
			.send()
			.await
			.map_err(|err| AuthError::Network { message: err.to_string() })?;
		let status = response.status();
		let bytes = response
			.bytes()
			.await
			.map_err(|err| AuthError::Network { message: err.to_string() })?;

		if !status.is_success() {
			return Err(AuthError::Rejected {
				grant,
				status: Some(status.as_u16()),
				message: rejection_message(&bytes)
					.unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_owned()),
			});
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|err| AuthError::MalformedResponse { message: err.to_string() })
	}
}
#[cfg(feature = "reqwest")]
impl TokenExchanger for ProviderClient {
	fn login(&self) -> ExchangeFuture<'_> {
		Box::pin(self.exchange(GrantType::Password, None))
	}

	fn refresh<'a>(&'a self, refresh_token: &'a str) -> ExchangeFuture<'a> {
		Box::pin(self.exchange(GrantType::RefreshToken, Some(refresh_token)))
	}
}

/// Pulls a human-readable failure message out of a provider error payload.
#[cfg(feature = "reqwest")]
fn rejection_message(bytes: &[u8]) -> Option<String> {
	let payload: serde_json::Value = serde_json::from_slice(bytes).ok()?;

	["message", "error_description", "error"]
		.into_iter()
		.find_map(|field| payload.get(field))
		.and_then(serde_json::Value::as_str)
		.map(str::to_owned)
}
