//! Admission gate that spaces outbound calls and honors server-imposed cool-downs.
//!
//! The limiter stores a single "earliest next permitted start" instant shared by every
//! in-flight logical call. [`AdmissionLimiter::wait`] only reads it; the instant moves
//! forward through [`AdmissionLimiter::notify_done`] (fixed gap after a successful call,
//! never earlier than a pending cool-down) and [`AdmissionLimiter::pause`] (absolute
//! cool-down after a rate-limit signal).

// self
use crate::{_prelude::*, clock::Clock};

/// Shared pacing gate for a single rate budget.
pub struct AdmissionLimiter {
	min_gap: Duration,
	next_at: Mutex<OffsetDateTime>,
	clock: Arc<dyn Clock>,
}
impl AdmissionLimiter {
	/// Default spacing between successful calls.
	pub const DEFAULT_MIN_GAP: Duration = Duration::milliseconds(300);

	/// Creates an unrestricted limiter that spaces calls by `min_gap`.
	pub fn new(min_gap: Duration, clock: Arc<dyn Clock>) -> Self {
		let min_gap = if min_gap.is_negative() { Duration::ZERO } else { min_gap };

		Self { min_gap, next_at: Mutex::new(OffsetDateTime::UNIX_EPOCH), clock }
	}

	/// Configured spacing between successful calls.
	pub fn min_gap(&self) -> Duration {
		self.min_gap
	}

	/// Earliest instant at which a new call may start.
	pub fn next_at(&self) -> OffsetDateTime {
		*self.next_at.lock()
	}

	/// Remaining delay a caller arriving at `now` would wait (never negative).
	pub fn delay_at(&self, now: OffsetDateTime) -> Duration {
		let delay = self.next_at() - now;

		if delay.is_positive() { delay } else { Duration::ZERO }
	}

	/// Suspends until the shared instant has passed and returns the delay that was waited.
	///
	/// Concurrent callers all observe the same instant and may pass together once it
	/// elapses; the gate does not reserve a slot for the caller.
	pub async fn wait(&self) -> Duration {
		let delay = self.delay_at(self.clock.now());

		if delay.is_positive() {
			self.clock.sleep(delay).await;
		}

		delay
	}

	/// Slides the window after a successful call: the next start becomes `now + min_gap`
	/// unless a later instant (e.g. an active [`pause`](Self::pause)) is already pending.
	pub fn notify_done(&self) {
		let candidate = saturating_add(self.clock.now(), self.min_gap);
		let mut next_at = self.next_at.lock();

		if candidate > *next_at {
			*next_at = candidate;
		}
	}

	/// Imposes a hard cool-down: the next start is `now + duration`, replacing any pending
	/// value (smaller or larger).
	pub fn pause(&self, duration: Duration) {
		let duration = if duration.is_negative() { Duration::ZERO } else { duration };
		let now = self.clock.now();

		*self.next_at.lock() = saturating_add(now, duration);
	}
}
impl Debug for AdmissionLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AdmissionLimiter")
			.field("min_gap", &self.min_gap)
			.field("next_at", &self.next_at())
			.finish()
	}
}

pub(crate) fn saturating_add(instant: OffsetDateTime, delta: Duration) -> OffsetDateTime {
	instant.checked_add(delta).unwrap_or_else(|| time::Date::MAX.midnight().assume_utc())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::clock::ManualClock;

	fn limiter(min_gap: Duration) -> (AdmissionLimiter, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::default());

		(AdmissionLimiter::new(min_gap, clock.clone()), clock)
	}

	#[tokio::test]
	async fn wait_is_free_when_unrestricted() {
		let (limiter, clock) = limiter(Duration::milliseconds(300));

		assert_eq!(limiter.wait().await, Duration::ZERO);
		assert!(clock.sleeps().is_empty());
	}

	#[tokio::test]
	async fn notify_done_spaces_the_next_call() {
		let (limiter, clock) = limiter(Duration::milliseconds(300));
		let completed = clock.now();

		limiter.notify_done();
		clock.advance(Duration::milliseconds(100));

		let waited = limiter.wait().await;

		assert_eq!(waited, Duration::milliseconds(200));
		assert!(clock.now() >= completed + limiter.min_gap());
		assert_eq!(limiter.wait().await, Duration::ZERO);
	}

	#[tokio::test]
	async fn pause_overrides_a_smaller_pending_gap() {
		let (limiter, clock) = limiter(Duration::milliseconds(300));

		limiter.notify_done();
		limiter.pause(Duration::seconds(5));

		assert_eq!(limiter.next_at(), clock.now() + Duration::seconds(5));
		assert_eq!(limiter.wait().await, Duration::seconds(5));
	}

	#[test]
	fn pause_replaces_rather_than_adds() {
		let (limiter, clock) = limiter(Duration::milliseconds(300));

		limiter.pause(Duration::seconds(30));
		limiter.pause(Duration::seconds(2));

		assert_eq!(limiter.next_at(), clock.now() + Duration::seconds(2));
	}

	#[test]
	fn notify_done_after_pause_resets_to_gap() {
		let (limiter, clock) = limiter(Duration::milliseconds(300));

		limiter.pause(Duration::seconds(10));
		clock.advance(Duration::seconds(10));
		limiter.notify_done();

		assert_eq!(limiter.delay_at(clock.now()), Duration::milliseconds(300));
	}

	#[test]
	fn notify_done_never_shortens_an_active_pause() {
		let (limiter, clock) = limiter(Duration::milliseconds(300));

		limiter.pause(Duration::seconds(30));
		limiter.notify_done();

		assert_eq!(limiter.next_at(), clock.now() + Duration::seconds(30));

		clock.advance(Duration::seconds(29) + Duration::milliseconds(900));
		limiter.notify_done();

		assert_eq!(limiter.delay_at(clock.now()), Duration::milliseconds(300));
	}

	#[test]
	fn negative_inputs_are_clamped() {
		let (limiter, clock) = limiter(Duration::milliseconds(-10));

		assert_eq!(limiter.min_gap(), Duration::ZERO);

		limiter.pause(Duration::seconds(-3));

		assert_eq!(limiter.next_at(), clock.now());
	}

	#[test]
	fn huge_pauses_saturate() {
		let (limiter, clock) = limiter(Duration::ZERO);

		limiter.pause(Duration::MAX);

		assert!(limiter.next_at() > clock.now() + Duration::days(365 * 1_000));
	}

	#[tokio::test]
	async fn concurrent_waiters_share_the_gate() {
		let (limiter, clock) = limiter(Duration::milliseconds(300));

		limiter.pause(Duration::seconds(1));

		let (a, b) = tokio::join!(limiter.wait(), limiter.wait());

		assert_eq!(a, Duration::seconds(1));
		assert!(b <= Duration::seconds(1));
		assert!(clock.now() >= limiter.next_at());
	}
}
