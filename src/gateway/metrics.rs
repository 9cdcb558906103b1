// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing gateway activity.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
	calls: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	attempts: AtomicU64,
	refreshes: AtomicU64,
	refresh_failures: AtomicU64,
	unauthorized_replays: AtomicU64,
	rate_limited_replays: AtomicU64,
}
impl GatewayMetrics {
	/// Returns the number of logical calls started.
	pub fn calls(&self) -> u64 {
		self.calls.load(Ordering::Relaxed)
	}

	/// Returns the number of logical calls that returned a response.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Returns the number of logical calls that returned an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns the number of HTTP attempts sent to the resource API.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful token refreshes.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of failed token refreshes.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of replays issued after a 401.
	pub fn unauthorized_replays(&self) -> u64 {
		self.unauthorized_replays.load(Ordering::Relaxed)
	}

	/// Returns the number of replays issued after a rate-limit backoff.
	pub fn rate_limited_replays(&self) -> u64 {
		self.rate_limited_replays.load(Ordering::Relaxed)
	}

	pub(crate) fn record_call(&self) {
		self.calls.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_unauthorized_replay(&self) {
		self.unauthorized_replays.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rate_limited_replay(&self) {
		self.rate_limited_replays.fetch_add(1, Ordering::Relaxed);
	}
}
