// self
use crate::{_prelude::*, auth::Credential, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by gateway flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("oauth2_gateway.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits an event for a completed credential refresh.
pub fn record_refresh(reason: &'static str, credential: &Credential) {
	#[cfg(feature = "tracing")]
	tracing::info!(
		reason,
		fingerprint = %credential.fingerprint(),
		generation = credential.generation,
		"Access token refreshed."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (reason, credential);
}

/// Emits an event for a refresh that failed and will surface to the caller.
pub fn record_refresh_failure(reason: &'static str, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::error!(reason, error = %error, "Access token refresh failed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (reason, error);
}

/// Emits an event before a call is replayed with a refreshed credential.
pub fn record_unauthorized_replay(path: &str) {
	#[cfg(feature = "tracing")]
	tracing::info!(path, "Credential rejected; replaying with a refreshed token.");
	#[cfg(not(feature = "tracing"))]
	let _ = path;
}

/// Emits an event before a rate-limited call is paused and replayed.
pub fn record_rate_limit_pause(path: &str, wait: Duration, hinted: bool) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		path,
		wait_ms = wait.whole_milliseconds() as u64,
		hinted,
		"Rate limited; pausing before replay."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (path, wait, hinted);
}

/// Emits an event when the replay after a rate-limit backoff failed as well.
pub fn record_rate_limited_retry_failure(path: &str, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(path, error = %error, "Rate-limited retry also failed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (path, error);
}
