//! Resilient API gateway combining admission pacing, credential refresh, and replays.
//!
//! Every logical call goes through the same pipeline:
//!
//! 1. wait for the [`AdmissionLimiter`] to admit the attempt;
//! 2. refresh the credential first if it is missing or older than the refresh threshold;
//! 3. send the request with the current `Authorization` header;
//! 4. on success, record the completion with the limiter and return the response.
//!
//! A first attempt rejected with HTTP 401 triggers one refresh followed by one replay. A
//! first attempt that is rate limited pauses the limiter (honoring `Retry-After` when
//! present, a random backoff otherwise) and replays once. Replays never trigger further
//! replays, so a logical call issues at most two resource attempts.

mod classify;
mod metrics;

pub use classify::*;
pub use metrics::GatewayMetrics;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::Credential,
	clock::{Clock, Jitter, SystemClock, ThreadRngJitter},
	config::GatewayConfig,
	error::RefreshError,
	http::{ApiResponse, ApiTransport, CallDescriptor},
	limiter::AdmissionLimiter,
	oauth,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestTransport>;

/// Position of an attempt within one logical call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt {
	/// First attempt; a 401 or rate-limit failure may still be recovered.
	Initial,
	/// Replay after a 401 forced a refresh; failures are terminal.
	AfterRefresh,
	/// Replay after a rate-limit pause; failures are terminal and report the wait.
	AfterRateLimit {
		/// Pause applied before the replay.
		waited: Duration,
	},
}
impl Attempt {
	/// Returns `true` when the attempt may still be replayed.
	pub const fn can_replay(self) -> bool {
		matches!(self, Attempt::Initial)
	}

	fn annotate(self, error: Error) -> Error {
		match self {
			Attempt::AfterRateLimit { waited } =>
				Error::RateLimitedRetryFailed { waited, source: Box::new(error) },
			_ => error,
		}
	}
}

enum AttemptOutcome {
	Success(ApiResponse),
	Failed { failure: Failure, generation: u64 },
}

struct FailedFlight {
	flight: u64,
	status: Option<u16>,
	message: String,
}

/// Authenticated, paced client for one remote API.
///
/// The gateway owns the transport, the validated configuration, a single
/// [`AdmissionLimiter`], and the current [`Credential`]. It is safe to share behind an
/// [`Arc`] across tasks: concurrent callers are paced by the shared limiter and
/// concurrent refresh needs collapse into one token exchange.
pub struct Gateway<T>
where
	T: ?Sized + ApiTransport,
{
	transport: Arc<T>,
	config: Arc<GatewayConfig>,
	limiter: AdmissionLimiter,
	clock: Arc<dyn Clock>,
	jitter: Arc<dyn Jitter>,
	credential: RwLock<Option<Credential>>,
	refresh_guard: AsyncMutex<()>,
	// Completed token exchanges; only written while `refresh_guard` is held.
	refresh_flights: AtomicU64,
	failed_flight: Mutex<Option<FailedFlight>>,
	metrics: Arc<GatewayMetrics>,
}
impl<T> Gateway<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a gateway that sends every request through `transport`.
	///
	/// The gateway starts without a credential; the first call performs a refresh.
	pub fn with_transport(config: GatewayConfig, transport: impl Into<Arc<T>>) -> Self {
		let clock: Arc<dyn Clock> = Arc::new(SystemClock);

		Self {
			transport: transport.into(),
			limiter: AdmissionLimiter::new(config.min_gap, clock.clone()),
			config: Arc::new(config),
			clock,
			jitter: Arc::new(ThreadRngJitter),
			credential: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			refresh_flights: AtomicU64::new(0),
			failed_flight: Mutex::new(None),
			metrics: Default::default(),
		}
	}

	/// Replaces the time source used for pacing, staleness checks, and backoff sleeps.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.limiter = AdmissionLimiter::new(self.config.min_gap, clock.clone());
		self.clock = clock;

		self
	}

	/// Replaces the randomness source used for backoffs without a `Retry-After` hint.
	pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
		self.jitter = jitter;

		self
	}

	/// Validated configuration backing this gateway.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Limiter pacing this gateway's attempts.
	pub fn limiter(&self) -> &AdmissionLimiter {
		&self.limiter
	}

	/// Counters describing calls, attempts, refreshes, and replays.
	pub fn metrics(&self) -> &GatewayMetrics {
		&self.metrics
	}

	/// Returns a snapshot of the current credential, if any.
	pub fn credential(&self) -> Option<Credential> {
		self.credential.read().clone()
	}

	/// Installs a previously issued access token, e.g. one restored from a cache.
	///
	/// `issued_at` drives the proactive refresh: a token older than the refresh
	/// threshold is replaced before the next attempt.
	pub fn seed_credential(&self, access_token: AccessToken, issued_at: OffsetDateTime) -> Credential {
		let mut slot = self.credential.write();
		let credential = Credential::new(access_token, issued_at, next_generation(slot.as_ref()));

		*slot = Some(credential.clone());

		credential
	}

	/// Exchanges the refresh token for a new access token unconditionally.
	pub async fn refresh_credential(&self) -> Result<Credential> {
		let _singleflight = self.refresh_guard.lock().await;

		self.refresh_locked("forced").await
	}

	/// Executes one logical call and returns the successful response.
	///
	/// Only terminal failures are returned; 401 and rate-limit responses that a replay
	/// recovered from never surface.
	pub async fn call(&self, descriptor: &CallDescriptor) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Call;

		let span = FlowSpan::new(KIND, "call");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_call();

		let result = span.instrument(self.run(descriptor)).await;

		match &result {
			Ok(_) => {
				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	/// Executes one logical call and decodes the JSON response body.
	pub async fn call_json<R>(&self, descriptor: &CallDescriptor) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.call(descriptor).await?.json()
	}

	async fn run(&self, descriptor: &CallDescriptor) -> Result<ApiResponse> {
		let mut attempt = Attempt::Initial;

		loop {
			let (failure, generation) = match self.attempt(descriptor).await {
				Ok(AttemptOutcome::Success(response)) => return Ok(response),
				Ok(AttemptOutcome::Failed { failure, generation }) => (failure, generation),
				Err(e) => return Err(self.finish(descriptor, attempt, e)),
			};

			if !attempt.can_replay() {
				return Err(self.finish(descriptor, attempt, failure.into_error()));
			}

			attempt = match failure {
				Failure::Unauthorized(_) => {
					self.refresh_rejected(generation).await?;
					self.metrics.record_unauthorized_replay();
					obs::record_unauthorized_replay(&descriptor.path);

					Attempt::AfterRefresh
				},
				Failure::RateLimited { retry_after, .. } => {
					let waited = self.backoff(retry_after);

					obs::record_rate_limit_pause(&descriptor.path, waited, retry_after.is_some());
					self.limiter.pause(waited);
					self.metrics.record_rate_limited_replay();

					Attempt::AfterRateLimit { waited }
				},
				other => return Err(other.into_error()),
			};
		}
	}

	async fn attempt(&self, descriptor: &CallDescriptor) -> Result<AttemptOutcome> {
		self.limiter.wait().await;

		let credential = self.ensure_fresh().await?;
		let url = self.config.resource_url(descriptor)?;
		let request =
			descriptor.to_request(&url, &credential.authorization_value(&self.config.token_scheme))?;

		self.metrics.record_attempt();

		let response = ApiResponse::from(self.transport.send(request).await?);

		if response.is_success() {
			self.limiter.notify_done();

			return Ok(AttemptOutcome::Success(response));
		}

		Ok(AttemptOutcome::Failed {
			failure: Failure::classify(&response, self.clock.now()),
			generation: credential.generation,
		})
	}

	fn finish(&self, descriptor: &CallDescriptor, attempt: Attempt, error: Error) -> Error {
		let error = attempt.annotate(error);

		if error.is_rate_limited_retry_failure() {
			obs::record_rate_limited_retry_failure(&descriptor.path, &error);
		}

		error
	}

	fn backoff(&self, retry_after: Option<Duration>) -> Duration {
		match (retry_after, self.config.max_retry_after) {
			(Some(hint), Some(cap)) if hint > cap => cap,
			(Some(hint), _) => hint,
			(None, _) => self.jitter.sample(self.config.backoff_floor, self.config.backoff_ceiling),
		}
	}

	fn fresh_credential(&self) -> Option<Credential> {
		let now = self.clock.now();

		self.credential
			.read()
			.as_ref()
			.filter(|credential| !credential.is_stale_at(now, self.config.refresh_threshold))
			.cloned()
	}

	async fn ensure_fresh(&self) -> Result<Credential> {
		if let Some(credential) = self.fresh_credential() {
			return Ok(credential);
		}

		let observed = self.refresh_flights.load(Ordering::Acquire);
		let _singleflight = self.refresh_guard.lock().await;

		// Another caller may have refreshed while this one waited for the guard.
		if let Some(credential) = self.fresh_credential() {
			return Ok(credential);
		}

		self.ensure_no_failed_flight_since(observed)?;

		let reason = if self.credential.read().is_some() { "stale" } else { "missing" };

		self.refresh_locked(reason).await
	}

	async fn refresh_rejected(&self, rejected: u64) -> Result<Credential> {
		let observed = self.refresh_flights.load(Ordering::Acquire);
		let _singleflight = self.refresh_guard.lock().await;
		let rotated = self
			.credential
			.read()
			.as_ref()
			.filter(|credential| credential.generation > rejected)
			.cloned();

		if let Some(credential) = rotated {
			return Ok(credential);
		}

		self.ensure_no_failed_flight_since(observed)?;
		self.refresh_locked("rejected").await
	}

	/// Fails fast when an exchange that completed after `observed` failed, so callers
	/// queued behind a failing refresh do not each repeat it.
	fn ensure_no_failed_flight_since(&self, observed: u64) -> Result<()> {
		match &*self.failed_flight.lock() {
			Some(failed) if failed.flight > observed => Err(RefreshError::Concurrent {
				status: failed.status,
				message: failed.message.clone(),
			}
			.into()),
			_ => Ok(()),
		}
	}

	async fn refresh_locked(&self, reason: &'static str) -> Result<Credential> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, reason);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let exchange = oauth::exchange_refresh_token(self.transport.as_ref(), &self.config);
		let result = span.instrument(exchange).await;
		let flight = self.refresh_flights.fetch_add(1, Ordering::AcqRel) + 1;

		match result {
			Ok(access_token) => {
				let credential = self.install(access_token);

				*self.failed_flight.lock() = None;

				self.metrics.record_refresh();
				obs::record_refresh(reason, &credential);
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Ok(credential)
			},
			Err(e) => {
				*self.failed_flight.lock() =
					Some(FailedFlight { flight, status: e.status(), message: e.to_string() });
				self.metrics.record_refresh_failure();
				obs::record_refresh_failure(reason, &e);
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				Err(e)
			},
		}
	}

	fn install(&self, access_token: AccessToken) -> Credential {
		let issued_at = self.clock.now();
		let mut slot = self.credential.write();
		let credential = Credential::new(access_token, issued_at, next_generation(slot.as_ref()));

		*slot = Some(credential.clone());

		credential
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestTransport> {
	/// Creates a gateway backed by a default reqwest client.
	pub fn new(config: GatewayConfig) -> Self {
		Self::with_transport(config, ReqwestTransport::default())
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("resource_base", &self.config.resource_base.as_str())
			.field("limiter", &self.limiter)
			.field("credential", &*self.credential.read())
			.finish()
	}
}

fn next_generation(current: Option<&Credential>) -> u64 {
	current.map_or(1, |credential| credential.generation + 1)
}
