//! Failure classification for non-success resource responses.

// self
use crate::{_prelude::*, error::RemoteError, http::ApiResponse};

const RATE_LIMIT_PHRASES: [&str; 2] = ["too many requests", "made too many requests"];

/// Class of a failed attempt, deciding whether the gateway refreshes, pauses, or gives up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
	/// HTTP 401; recoverable once by refreshing the credential.
	Unauthorized(RemoteError),
	/// HTTP 429, or a 400 whose body reports too many requests; recoverable once by
	/// pausing.
	RateLimited {
		/// Parsed `Retry-After` hint.
		retry_after: Option<Duration>,
		/// Response that carried the signal.
		remote: RemoteError,
	},
	/// Anything else; never retried.
	Other(RemoteError),
}
impl Failure {
	/// Classifies a non-success response observed at `now`.
	pub fn classify(response: &ApiResponse, now: OffsetDateTime) -> Self {
		let status = response.status.as_u16();
		let remote = RemoteError::new(status, response.text());

		if status == StatusCode::UNAUTHORIZED.as_u16() {
			return Self::Unauthorized(remote);
		}
		if is_rate_limit(status, &remote.body) {
			return Self::RateLimited { retry_after: response.retry_after(now), remote };
		}

		Self::Other(remote)
	}

	/// Returns the response that caused the failure.
	pub fn remote(&self) -> &RemoteError {
		match self {
			Self::Unauthorized(remote) | Self::Other(remote) => remote,
			Self::RateLimited { remote, .. } => remote,
		}
	}

	/// Converts the failure into the error surfaced when no retry is left.
	pub fn into_error(self) -> Error {
		match self {
			Self::Unauthorized(remote) => Error::Unauthorized(remote),
			Self::RateLimited { retry_after, remote } => Error::RateLimited { retry_after, remote },
			Self::Other(remote) => Error::Remote(remote),
		}
	}
}

/// Returns `true` for HTTP 429 and for HTTP 400 responses whose body mentions
/// "too many requests" in any letter case.
///
/// The remote API reports some rate limits as generic 400s, so the body text has to be
/// inspected in addition to the status code.
pub fn is_rate_limit(status: u16, body: &str) -> bool {
	if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
		return true;
	}
	if status != StatusCode::BAD_REQUEST.as_u16() {
		return false;
	}

	let body = body.to_lowercase();

	RATE_LIMIT_PHRASES.iter().any(|phrase| body.contains(phrase))
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::header::{HeaderValue, RETRY_AFTER};
	// self
	use super::*;

	fn response(status: u16, body: &str, retry_after: Option<&str>) -> ApiResponse {
		let mut headers = HeaderMap::new();

		if let Some(value) = retry_after {
			headers.insert(
				RETRY_AFTER,
				HeaderValue::from_str(value).expect("Retry-After fixture should be valid."),
			);
		}

		ApiResponse {
			status: StatusCode::from_u16(status).expect("Status fixture should be valid."),
			headers,
			body: body.as_bytes().to_vec(),
		}
	}

	#[test]
	fn detects_rate_limit_signals() {
		assert!(is_rate_limit(429, ""));
		assert!(is_rate_limit(400, "You have made too many requests continuously."));
		assert!(is_rate_limit(400, r#"{"code":44,"message":"Too Many Requests"}"#));
		assert!(!is_rate_limit(400, r#"{"code":2,"message":"Invalid value passed for rate"}"#));
		assert!(!is_rate_limit(500, "too many requests"));
		assert!(!is_rate_limit(403, "too many requests"));
	}

	#[test]
	fn classifies_statuses() {
		let now = OffsetDateTime::UNIX_EPOCH;

		assert!(matches!(
			Failure::classify(&response(401, "INVALID_OAUTHTOKEN", None), now),
			Failure::Unauthorized(RemoteError { status: 401, .. })
		));
		assert_eq!(
			Failure::classify(&response(429, "", Some("5")), now),
			Failure::RateLimited {
				retry_after: Some(Duration::seconds(5)),
				remote: RemoteError::new(429, ""),
			}
		);
		assert!(matches!(
			Failure::classify(&response(400, "You have made too many requests", None), now),
			Failure::RateLimited { retry_after: None, .. }
		));
		assert!(matches!(
			Failure::classify(&response(503, "maintenance", Some("5")), now),
			Failure::Other(RemoteError { status: 503, .. })
		));
	}

	#[test]
	fn into_error_preserves_context() {
		let failure = Failure::classify(&response(404, "missing", None), OffsetDateTime::UNIX_EPOCH);

		assert_eq!(failure.remote().body, "missing");

		let err = failure.into_error();

		assert_eq!(err.status(), Some(404));
		assert!(matches!(err, Error::Remote(_)));
	}
}
