//! Bearer-authenticated HTTP client for the invoicing API.
//!
//! Every outbound call first obtains a token from the broker and attaches it
//! as an `Authorization: Bearer` header; a failed acquisition aborts the call
//! before anything is sent. Rejections are dissected from the provider's
//! error payloads (`error_code` plus a detail list) into the typed
//! [`ApiError`] taxonomy, independent of the broker.

// crates.io
use reqwest::Method;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	broker::TokenBroker,
	error::{ApiError, ConfigError, TransportError},
};

/// Response envelope most list/detail endpoints wrap their payloads in.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
	data: T,
}

/// Municipality record served by the provider's catalog endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Municipality {
	/// Numeric catalog identifier.
	pub id: u64,
	/// Official municipality code.
	pub code: String,
	/// Municipality name.
	pub name: String,
	/// Department the municipality belongs to.
	pub department: String,
}

/// HTTP client wrapper that injects broker-issued bearer tokens.
#[derive(Clone, Debug)]
pub struct ApiClient {
	http: ReqwestClient,
	base_url: Url,
	broker: TokenBroker,
}
impl ApiClient {
	/// Builds a client with its own transport.
	pub fn new(broker: TokenBroker, base_url: Url) -> Result<Self, ConfigError> {
		let http = ReqwestClient::builder().build().map_err(ConfigError::from)?;

		Ok(Self::with_client(http, broker, base_url))
	}

	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(http: ReqwestClient, broker: TokenBroker, base_url: Url) -> Self {
		Self { http, base_url, broker }
	}

	/// Performs a GET and unwraps the `data` envelope.
	pub async fn get<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let body = self.send(Method::GET, path, None).await?;

		decode::<DataEnvelope<T>>(&body).map(|envelope| envelope.data)
	}

	/// Performs a GET and returns the raw payload without envelope handling.
	pub async fn get_raw<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let body = self.send(Method::GET, path, None).await?;

		decode(&body)
	}

	/// Performs a POST and unwraps the `data` envelope.
	pub async fn post<T, P>(&self, path: &str, payload: &P) -> Result<T>
	where
		T: DeserializeOwned,
		P: Serialize + ?Sized,
	{
		let payload = encode(payload)?;
		let body = self.send(Method::POST, path, Some(payload)).await?;

		decode::<DataEnvelope<T>>(&body).map(|envelope| envelope.data)
	}

	/// Performs a PATCH and returns the raw payload.
	pub async fn patch<T, P>(&self, path: &str, payload: &P) -> Result<T>
	where
		T: DeserializeOwned,
		P: Serialize + ?Sized,
	{
		let payload = encode(payload)?;
		let body = self.send(Method::PATCH, path, Some(payload)).await?;

		decode(&body)
	}

	/// Performs a DELETE (with body) and returns the raw payload.
	pub async fn delete<T, P>(&self, path: &str, payload: &P) -> Result<T>
	where
		T: DeserializeOwned,
		P: Serialize + ?Sized,
	{
		let payload = encode(payload)?;
		let body = self.send(Method::DELETE, path, Some(payload)).await?;

		decode(&body)
	}

	/// Looks up municipalities from the provider catalog, optionally filtered
	/// by name.
	pub async fn municipalities(&self, name: Option<&str>) -> Result<Vec<Municipality>> {
		let path = match name {
			Some(name) => format!("/v1/municipalities?name={name}"),
			None => "/v1/municipalities".into(),
		};

		self.get(&path).await
	}

	async fn send(
		&self,
		method: Method,
		path: &str,
		payload: Option<serde_json::Value>,
	) -> Result<Vec<u8>> {
		// A failed acquisition aborts the call before anything is sent.
		let token = self.broker.fetch_token().await?;
		let url = self.resolve(path)?;
		let mut request =
			self.http.request(method, url).bearer_auth(token.access_token.expose());

		if let Some(payload) = payload {
			request = request.json(&payload);
		}

		let response = request.send().await.map_err(TransportError::from)?;
		let status = response.status();
		let bytes = response.bytes().await.map_err(TransportError::from)?;

		if !status.is_success() {
			return Err(map_error_payload(&bytes).into());
		}

		Ok(bytes.to_vec())
	}

	fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let joined = if path.starts_with('/') {
			format!("{base}{path}")
		} else {
			format!("{base}/{path}")
		};

		Url::parse(&joined)
			.map_err(|source| ConfigError::InvalidRequestPath { path: path.to_owned(), source })
	}
}

fn encode<P>(payload: &P) -> Result<serde_json::Value>
where
	P: Serialize + ?Sized,
{
	serde_json::to_value(payload).map_err(|err| Error::Decode { message: err.to_string() })
}

fn decode<T>(bytes: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|err| Error::Decode { message: err.to_string() })
}

/// Provider error payload shapes: either a nested `error` object carrying the
/// code and a detail list, or flat `error_code`/`message` fields.
#[derive(Default, Deserialize)]
struct ErrorPayload {
	#[serde(default)]
	error: Option<ErrorBody>,
	#[serde(default)]
	error_code: Option<serde_json::Value>,
	#[serde(default)]
	message: Option<String>,
}
#[derive(Default, Deserialize)]
struct ErrorBody {
	#[serde(default)]
	error_code: Option<serde_json::Value>,
	#[serde(default)]
	details: Option<Vec<ErrorDetail>>,
}
#[derive(Default, Deserialize)]
struct ErrorDetail {
	#[serde(default)]
	detail: Option<String>,
	#[serde(default)]
	message: Option<String>,
}

fn map_error_payload(bytes: &[u8]) -> ApiError {
	let payload: ErrorPayload = serde_json::from_slice(bytes).unwrap_or_default();
	let error_code = payload
		.error
		.as_ref()
		.and_then(|body| body.error_code.as_ref())
		.or_else(|| payload.error_code.as_ref())
		.and_then(code_string)
		.unwrap_or_else(|| "UNKNOWN_ERROR".into());
	let details: Vec<String> = match payload.error.as_ref().and_then(|body| body.details.as_ref())
	{
		Some(list) => list
			.iter()
			.map(|entry| {
				entry
					.detail
					.clone()
					.or_else(|| entry.message.clone())
					.unwrap_or_else(|| "No details".into())
			})
			.collect(),
		None => vec![payload.message.clone().unwrap_or_else(|| "Unknown error".into())],
	};
	let message =
		if details.is_empty() { "Unknown error".into() } else { details.join(", ") };

	ApiError::from_payload(error_code, message, details)
}

fn code_string(value: &serde_json::Value) -> Option<String> {
	match value {
		serde_json::Value::String(code) => Some(code.clone()),
		serde_json::Value::Number(code) => Some(code.to_string()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::ApiErrorKind;

	#[test]
	fn nested_error_payloads_join_their_details() {
		let body = br#"{"error":{"error_code":401,"details":[{"detail":"token expired"},{"message":"re-authenticate"}]}}"#;
		let err = map_error_payload(body);

		assert_eq!(err.kind, ApiErrorKind::Unauthorized);
		assert_eq!(err.error_code, "401");
		assert_eq!(err.message, "token expired, re-authenticate");
		assert_eq!(err.details.len(), 2);
	}

	#[test]
	fn flat_error_payloads_fall_back_to_the_top_level_message() {
		let body = br#"{"error_code":"404","message":"no such invoice"}"#;
		let err = map_error_payload(body);

		assert_eq!(err.kind, ApiErrorKind::NotFound);
		assert_eq!(err.message, "no such invoice");
		assert_eq!(err.details, vec!["no such invoice".to_string()]);
	}

	#[test]
	fn unparsable_error_payloads_map_to_the_catch_all() {
		let err = map_error_payload(b"<html>bad gateway</html>");

		assert_eq!(err.kind, ApiErrorKind::UnhandledStatus);
		assert_eq!(err.error_code, "UNKNOWN_ERROR");
		assert!(err.message.starts_with("Unknown error"));
	}

	#[test]
	fn envelope_decoding_surfaces_the_json_path() {
		let err = decode::<DataEnvelope<Vec<Municipality>>>(br#"{"data":[{"id":"oops"}]}"#)
			.expect_err("Mistyped payload should fail to decode.");

		assert!(matches!(&err, Error::Decode { message } if message.contains("data")));
	}
}
