//! Gateway-level error types shared by the limiter, refresh protocol, and call pipeline.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
///
/// Callers only ever observe terminal failures: a 401 or rate-limit response that was
/// absorbed by a refresh or backoff replay never surfaces here.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) while calling the resource API.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token endpoint rejected the refresh or could not be reached.
	#[error(transparent)]
	CredentialRefresh(#[from] RefreshError),

	/// Remote API rejected the credential and the refreshed replay was rejected too.
	#[error("Remote API rejected the bearer credential: {0}")]
	Unauthorized(RemoteError),
	/// Remote API signalled a rate limit on an attempt that had no retry left.
	#[error("Remote API is rate limiting requests: {remote}")]
	RateLimited {
		/// Server-supplied wait hint, when one was present and parseable.
		retry_after: Option<Duration>,
		/// Response that carried the rate-limit signal.
		remote: RemoteError,
	},
	/// The replay issued after a rate-limit backoff failed as well.
	#[error("Rate-limited retry also failed after waiting {waited}.")]
	RateLimitedRetryFailed {
		/// Backoff applied before the replay.
		waited: Duration,
		/// Failure of the replay itself.
		#[source]
		source: Box<Error>,
	},
	/// Remote API returned a non-success status outside the recoverable classes.
	#[error(transparent)]
	Remote(RemoteError),
	/// Resource response body could not be decoded into the requested type.
	#[error("Resource response with HTTP {status} could not be decoded.")]
	Decode {
		/// HTTP status of the undecodable response.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns the HTTP status associated with the failure, when one exists.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Unauthorized(remote) | Self::Remote(remote) => Some(remote.status),
			Self::RateLimited { remote, .. } => Some(remote.status),
			Self::RateLimitedRetryFailed { source, .. } => source.status(),
			Self::Decode { status, .. } => Some(*status),
			Self::CredentialRefresh(err) => err.status(),
			Self::Config(_) | Self::Transport(_) => None,
		}
	}

	/// Returns `true` when the failure happened on the replay that followed a rate-limit
	/// backoff, as opposed to a call that never got past the limiter.
	pub fn is_rate_limited_retry_failure(&self) -> bool {
		matches!(self, Self::RateLimitedRetryFailed { .. })
	}
}

/// Non-success response returned by the resource API.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Remote API returned HTTP {status}: {}.", preview(.body))]
pub struct RemoteError {
	/// HTTP status code.
	pub status: u16,
	/// Response body decoded as lossy UTF-8.
	pub body: String,
}
impl RemoteError {
	/// Creates a remote error from a status code and body text.
	pub fn new(status: u16, body: impl Into<String>) -> Self {
		Self { status, body: body.into() }
	}
}

/// Failures of the `grant_type=refresh_token` exchange.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the refresh with HTTP {status}: {}.", preview(.body))]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Response body decoded as lossy UTF-8.
		body: String,
	},
	/// Token endpoint answered successfully but reported an OAuth error instead of a token.
	#[error("Token endpoint returned an OAuth error: {error}.")]
	Provider {
		/// Provider-supplied `error` field.
		error: String,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	Malformed {
		/// HTTP status code of the response.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint could not be reached.
	#[error("Token endpoint could not be reached.")]
	Transport(#[from] TransportError),
	/// A concurrent refresh this caller waited on failed; the exchange was not repeated.
	#[error("Concurrent credential refresh failed: {message}")]
	Concurrent {
		/// HTTP status reported by the failed exchange, when available.
		status: Option<u16>,
		/// Rendered error of the failed exchange.
		message: String,
	},
}
impl RefreshError {
	/// Returns the HTTP status reported by the token endpoint, when available.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } | Self::Malformed { status, .. } => Some(*status),
			Self::Concurrent { status, .. } => *status,
			Self::Provider { .. } | Self::Transport(_) => None,
		}
	}
}

/// Configuration and validation failures raised by the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodyEncode(#[from] serde_json::Error),
	/// A configured or derived URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Which URL failed validation.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A URL uses a scheme other than HTTP(S).
	#[error("The {field} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which URL failed validation.
		field: &'static str,
		/// Offending URL.
		url: String,
	},

	/// A required setting was not supplied.
	#[error("Missing required setting `{name}`.")]
	Missing {
		/// Setting or environment variable name.
		name: &'static str,
	},
	/// A setting could not be parsed.
	#[error("Setting `{name}` has an invalid value: {value}.")]
	InvalidValue {
		/// Setting or environment variable name.
		name: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
	/// Randomized backoff bounds are inverted or negative.
	#[error("Backoff bounds must satisfy 0 <= floor <= ceiling.")]
	InvalidBackoff,
}

/// Failure to obtain any response from the remote host.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the remote API.")]
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

const BODY_PREVIEW_LIMIT: usize = 256;

fn preview(body: &str) -> Cow<'_, str> {
	let body = body.trim();

	if body.len() <= BODY_PREVIEW_LIMIT {
		return Cow::Borrowed(body);
	}

	let mut cut = BODY_PREVIEW_LIMIT;

	while !body.is_char_boundary(cut) {
		cut -= 1;
	}

	Cow::Owned(format!("{}...", &body[..cut]))
}
