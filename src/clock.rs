//! Time and randomness sources injected into the limiter and gateway.
//!
//! Production code uses [`SystemClock`] (UTC wall clock plus `tokio` timers) and
//! [`ThreadRngJitter`]. [`ManualClock`] and [`FixedJitter`] replace them in tests and
//! simulations: sleeping on a manual clock advances it instantly, so hour-long refresh
//! thresholds and multi-second backoffs run without real waiting.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Boxed future returned by [`Clock::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Source of the current instant and of asynchronous delays.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current UTC instant.
	fn now(&self) -> OffsetDateTime;

	/// Suspends the caller for `duration`; non-positive durations complete immediately.
	fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

/// Wall clock backed by [`OffsetDateTime::now_utc`] and `tokio` timers.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}

	fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
		Box::pin(async move {
			if duration.is_positive() {
				tokio::time::sleep(duration.unsigned_abs()).await;
			}
		})
	}
}

/// Deterministic clock that only moves when told to (or when slept on).
#[derive(Debug)]
pub struct ManualClock {
	now: Mutex<OffsetDateTime>,
	sleeps: Mutex<Vec<Duration>>,
}
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self { now: Mutex::new(start), sleeps: Mutex::default() }
	}

	/// Moves the clock forward by `delta`.
	pub fn advance(&self, delta: Duration) {
		let mut now = self.now.lock();

		*now += delta;
	}

	/// Jumps the clock to an absolute instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.now.lock() = instant;
	}

	/// Returns every positive delay requested through [`Clock::sleep`], in order.
	pub fn sleeps(&self) -> Vec<Duration> {
		self.sleeps.lock().clone()
	}

	/// Returns the sum of all recorded sleeps.
	pub fn total_slept(&self) -> Duration {
		self.sleeps.lock().iter().fold(Duration::ZERO, |acc, d| acc + *d)
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::UNIX_EPOCH + Duration::days(20_000))
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.now.lock()
	}

	fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
		if duration.is_positive() {
			self.sleeps.lock().push(duration);
			self.advance(duration);
		}

		Box::pin(std::future::ready(()))
	}
}

/// Sampler for the randomized backoff used when the server gives no `Retry-After` hint.
pub trait Jitter
where
	Self: Send + Sync,
{
	/// Returns a duration in `[floor, ceiling)`, or `floor` when the range is empty.
	fn sample(&self, floor: Duration, ceiling: Duration) -> Duration;
}

/// Uniform millisecond-granular sampling from the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngJitter;
impl Jitter for ThreadRngJitter {
	fn sample(&self, floor: Duration, ceiling: Duration) -> Duration {
		let lo = clamp_millis(floor);
		let hi = clamp_millis(ceiling);

		if hi <= lo {
			return Duration::milliseconds(lo);
		}

		Duration::milliseconds(rand::rng().random_range(lo..hi))
	}
}

/// Jitter that always picks the same offset above the floor (clamped into the range).
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedJitter {
	offset: Duration,
}
impl FixedJitter {
	/// Always samples `floor + offset`.
	pub fn new(offset: Duration) -> Self {
		Self { offset }
	}
}
impl Jitter for FixedJitter {
	fn sample(&self, floor: Duration, ceiling: Duration) -> Duration {
		let picked = floor + self.offset;

		if picked >= ceiling { floor.max(ceiling - Duration::MILLISECOND) } else { picked }
	}
}

fn clamp_millis(duration: Duration) -> i64 {
	i64::try_from(duration.whole_milliseconds().max(0)).unwrap_or(i64::MAX)
}
