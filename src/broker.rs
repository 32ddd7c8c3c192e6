//! Token acquisition orchestration with a single-slot coalescing guard.
//!
//! [`TokenBroker::fetch_token`] produces a currently-valid bearer token for
//! any caller, trying the cache, then a refresh-grant exchange, then a full
//! password-grant login, in that order. A process-local single-slot guard
//! coalesces concurrent callers onto one shared pending acquisition so the
//! provider never sees a thundering herd of simultaneous logins: late
//! arrivals clone and await the same pending future and observe the same
//! success or the same failure, and the slot is cleared once the acquisition
//! settles so the next call re-evaluates from the cache.

mod metrics;

pub use metrics::FetchMetrics;

// crates.io
use futures_util::{
	FutureExt,
	future::{BoxFuture, Shared},
};
// self
use crate::{
	_prelude::*,
	auth::Token,
	cache::CacheClient,
	error::AuthError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::TokenExchanger,
	store::TokenStore,
};
#[cfg(feature = "reqwest")]
use crate::{
	error::ConfigError,
	provider::{ProviderClient, ProviderOptions},
};

/// Pending token acquisition shared between coalesced callers.
type SharedFetch = Shared<BoxFuture<'static, Result<Token, AuthError>>>;

/// Validity margin under which a cached token is treated as absent, so
/// outbound calls get time to use it without racing the provider's clock.
const DEFAULT_REFRESH_BUFFER: Duration = Duration::seconds(300);

/// Produces valid bearer tokens while minimizing provider exchanges.
#[derive(Clone)]
pub struct TokenBroker {
	/// Token metadata store consulted before any network exchange.
	pub store: TokenStore,
	/// Token-endpoint exchange implementation.
	pub exchanger: Arc<dyn TokenExchanger>,
	/// Validity margin applied when reading the cached token.
	pub refresh_buffer: Duration,
	/// Process-local counters for fetch activity.
	pub fetch_metrics: Arc<FetchMetrics>,
	in_flight: Arc<Mutex<Option<SharedFetch>>>,
}
impl TokenBroker {
	/// Creates a broker that reuses the caller-provided exchange implementation.
	pub fn with_exchanger(
		cache: Arc<dyn CacheClient>,
		exchanger: impl Into<Arc<dyn TokenExchanger>>,
	) -> Self {
		Self {
			store: TokenStore::new(cache),
			exchanger: exchanger.into(),
			refresh_buffer: DEFAULT_REFRESH_BUFFER,
			fetch_metrics: Default::default(),
			in_flight: Default::default(),
		}
	}

	/// Overrides the refresh buffer (defaults to 300 seconds, floored at zero).
	pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = if buffer.is_negative() { Duration::ZERO } else { buffer };

		self
	}

	/// Obtains a currently-valid token, coalescing concurrent callers onto a
	/// single acquisition.
	///
	/// Strategy order: cached token, refresh-grant exchange, password-grant
	/// login. A failed refresh only forfeits the refresh path; only a failed
	/// login is terminal. The broker never retries internally; retry policy
	/// belongs to the caller.
	pub async fn fetch_token(&self) -> Result<Token, AuthError> {
		const KIND: FlowKind = FlowKind::Fetch;

		let span = FlowSpan::new(KIND, "fetch_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.fetch_metrics.record_attempt();

		let result = span
			.instrument(async move {
				let (pending, attached) = {
					let mut slot = self.in_flight.lock();

					match slot.as_ref() {
						Some(pending) => (pending.clone(), true),
						None => {
							let broker = self.clone();
							let pending: SharedFetch =
								async move { broker.acquire().await }.boxed().shared();

							*slot = Some(pending.clone());

							(pending, false)
						},
					}
				};

				if attached {
					self.fetch_metrics.record_coalesced();
				}

				let result = pending.clone().await;

				{
					let mut slot = self.in_flight.lock();

					if slot.as_ref().is_some_and(|current| current.ptr_eq(&pending)) {
						*slot = None;
					}
				}

				result
			})
			.await;

		match &result {
			Ok(_) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				self.fetch_metrics.record_success();
			},
			Err(_) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				self.fetch_metrics.record_failure();
			},
		}

		result
	}

	/// Evaluates the strategy order once, outside any coalescing concerns.
	async fn acquire(&self) -> Result<Token, AuthError> {
		if let Some(token) = self.store.read_valid(self.refresh_buffer).await {
			self.fetch_metrics.record_cache_hit();

			return Ok(token);
		}

		if let Some(refresh_token) = self.store.refresh_token().await {
			match self.refresh_exchange(&refresh_token).await {
				Ok(token) => return Ok(token),
				// A dead refresh token must not abort the fetch; it only
				// forfeits the refresh path.
				Err(_) => self.store.clear_refresh_token().await,
			}
		}

		self.login_exchange().await
	}

	async fn refresh_exchange(&self, refresh_token: &str) -> Result<Token, AuthError> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_exchange");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.fetch_metrics.record_exchange();

				let token = self.exchanger.refresh(refresh_token).await?;

				self.persist(&token).await;

				Ok(token)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn login_exchange(&self) -> Result<Token, AuthError> {
		const KIND: FlowKind = FlowKind::Password;

		let span = FlowSpan::new(KIND, "login_exchange");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.fetch_metrics.record_exchange();

				let token = self.exchanger.login().await?;

				self.persist(&token).await;

				Ok(token)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Persists an issued token; a cache outage degrades to always-re-login
	/// instead of failing the exchange that already succeeded.
	async fn persist(&self, token: &Token) {
		if let Err(err) = self.store.save(token).await {
			obs::warn_degraded("token save", &err);
		}
	}
}
#[cfg(feature = "reqwest")]
impl TokenBroker {
	/// Creates a broker with its own reqwest-backed exchange client.
	pub fn new(cache: Arc<dyn CacheClient>, options: ProviderOptions) -> Result<Self, ConfigError> {
		let exchanger: Arc<dyn TokenExchanger> = Arc::new(ProviderClient::new(options)?);

		Ok(Self::with_exchanger(cache, exchanger))
	}
}
impl Debug for TokenBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBroker")
			.field("store", &self.store)
			.field("refresh_buffer", &self.refresh_buffer)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		sync::atomic::{AtomicU64, Ordering},
		time::Duration as StdDuration,
	};
	// self
	use super::*;
	use crate::{
		auth::TokenSecret,
		cache::MemoryCache,
		provider::{ExchangeFuture, GrantType},
		store::REFRESH_TOKEN_KEY,
	};

	#[derive(Default)]
	struct FakeExchanger {
		logins: AtomicU64,
		refreshes: AtomicU64,
		fail_login: bool,
		fail_refresh: bool,
		latency: StdDuration,
	}
	impl FakeExchanger {
		fn issue(access: &str) -> Token {
			Token {
				access_token: TokenSecret::new(access),
				refresh_token: Some(TokenSecret::new("issued-refresh")),
				token_type: "Bearer".into(),
				expires_in: Some(3600),
			}
		}
	}
	impl TokenExchanger for FakeExchanger {
		fn login(&self) -> ExchangeFuture<'_> {
			Box::pin(async move {
				self.logins.fetch_add(1, Ordering::SeqCst);
				tokio::time::sleep(self.latency).await;

				if self.fail_login {
					Err(AuthError::Rejected {
						grant: GrantType::Password,
						status: Some(400),
						message: "bad credentials".into(),
					})
				} else {
					Ok(Self::issue("login-access"))
				}
			})
		}

		fn refresh<'a>(&'a self, _refresh_token: &'a str) -> ExchangeFuture<'a> {
			Box::pin(async move {
				self.refreshes.fetch_add(1, Ordering::SeqCst);
				tokio::time::sleep(self.latency).await;

				if self.fail_refresh {
					Err(AuthError::Rejected {
						grant: GrantType::RefreshToken,
						status: Some(401),
						message: "refresh token revoked".into(),
					})
				} else {
					Ok(Self::issue("refresh-access"))
				}
			})
		}
	}

	fn build_broker(exchanger: FakeExchanger) -> (TokenBroker, Arc<FakeExchanger>, Arc<MemoryCache>) {
		let cache = Arc::new(MemoryCache::default());
		let exchanger = Arc::new(exchanger);
		let broker = TokenBroker::with_exchanger(
			cache.clone() as Arc<dyn CacheClient>,
			exchanger.clone() as Arc<dyn TokenExchanger>,
		);

		(broker, exchanger, cache)
	}

	#[tokio::test]
	async fn concurrent_fetches_share_one_login() {
		let (broker, exchanger, _cache) = build_broker(FakeExchanger {
			latency: StdDuration::from_millis(50),
			..Default::default()
		});
		let (a, b, c) =
			tokio::join!(broker.fetch_token(), broker.fetch_token(), broker.fetch_token());
		let a = a.expect("First coalesced fetch should succeed.");
		let b = b.expect("Second coalesced fetch should succeed.");
		let c = c.expect("Third coalesced fetch should succeed.");

		assert_eq!(exchanger.logins.load(Ordering::SeqCst), 1);
		assert_eq!(a.access_token.expose(), "login-access");
		assert_eq!(b.access_token.expose(), a.access_token.expose());
		assert_eq!(c.access_token.expose(), a.access_token.expose());
		assert_eq!(broker.fetch_metrics.exchanges(), 1);
		assert_eq!(broker.fetch_metrics.coalesced(), 2);
	}

	#[tokio::test]
	async fn coalesced_callers_observe_the_same_failure() {
		let (broker, exchanger, _cache) = build_broker(FakeExchanger {
			fail_login: true,
			latency: StdDuration::from_millis(50),
			..Default::default()
		});
		let (a, b) = tokio::join!(broker.fetch_token(), broker.fetch_token());
		let a = a.expect_err("First coalesced fetch should fail.");
		let b = b.expect_err("Second coalesced fetch should fail.");

		assert_eq!(exchanger.logins.load(Ordering::SeqCst), 1);
		assert_eq!(a, b);
		assert!(matches!(a, AuthError::Rejected { status: Some(400), .. }));
		assert_eq!(broker.fetch_metrics.failures(), 2);
	}

	#[tokio::test]
	async fn sequential_fetches_reuse_the_cached_token() {
		let (broker, exchanger, _cache) = build_broker(FakeExchanger::default());

		broker.fetch_token().await.expect("Initial fetch should log in successfully.");

		let second = broker.fetch_token().await.expect("Second fetch should hit the cache.");

		assert_eq!(exchanger.logins.load(Ordering::SeqCst), 1);
		assert_eq!(second.access_token.expose(), "login-access");
		assert_eq!(broker.fetch_metrics.cache_hits(), 1);
		assert_eq!(broker.fetch_metrics.exchanges(), 1);
	}

	#[tokio::test]
	async fn failed_refresh_clears_the_key_and_falls_through_to_login() {
		let (broker, exchanger, cache) =
			build_broker(FakeExchanger { fail_refresh: true, ..Default::default() });

		cache
			.set(REFRESH_TOKEN_KEY, "stale-refresh".into(), Duration::minutes(10))
			.await
			.expect("Seeding the refresh key should succeed.");

		let token = broker.fetch_token().await.expect("Fetch should fall through to login.");

		assert_eq!(exchanger.refreshes.load(Ordering::SeqCst), 1);
		assert_eq!(exchanger.logins.load(Ordering::SeqCst), 1);
		assert_eq!(token.access_token.expose(), "login-access");

		let cleared = cache
			.get(REFRESH_TOKEN_KEY)
			.await
			.expect("Reading the refresh key should succeed.");

		// The dead refresh token is gone; the login's replacement was saved.
		assert_eq!(cleared.as_deref(), Some("issued-refresh"));
	}

	#[tokio::test]
	async fn successful_refresh_skips_login() {
		let (broker, exchanger, cache) = build_broker(FakeExchanger::default());

		cache
			.set(REFRESH_TOKEN_KEY, "live-refresh".into(), Duration::minutes(10))
			.await
			.expect("Seeding the refresh key should succeed.");

		let token = broker.fetch_token().await.expect("Refresh-backed fetch should succeed.");

		assert_eq!(exchanger.refreshes.load(Ordering::SeqCst), 1);
		assert_eq!(exchanger.logins.load(Ordering::SeqCst), 0);
		assert_eq!(token.access_token.expose(), "refresh-access");
	}
}
