//! Transport primitives and call descriptors for outbound API requests.
//!
//! The module exposes [`ApiTransport`], the gateway's only dependency on an HTTP stack,
//! together with the immutable [`CallDescriptor`] that describes one logical request
//! and the [`ApiResponse`] returned for it. Transports return every HTTP response
//! (including 4xx/5xx) as `Ok`; status classification happens in the gateway so replay
//! decisions stay independent of any particular client's error semantics.

// crates.io
use oauth2::http::{
	HeaderValue, Request,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP clients able to execute one request and hand back the raw
/// response.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can back a
/// gateway shared across tasks. Non-success statuses are not errors at this layer;
/// only failures to obtain a response at all (DNS, TCP, TLS, IO) map to
/// [`TransportError`].
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and returns the response, whatever its status.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Expected representation of a resource response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResponseKind {
	/// JSON document (`Accept: application/json`).
	#[default]
	Json,
	/// Opaque bytes such as images or PDFs (`Accept: */*`).
	Binary,
}
impl ResponseKind {
	/// Returns the `Accept` header value requested for this kind.
	pub const fn accept(self) -> &'static str {
		match self {
			ResponseKind::Json => "application/json",
			ResponseKind::Binary => "*/*",
		}
	}
}

/// Request payload carried by a [`CallDescriptor`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CallBody {
	/// No body.
	#[default]
	Empty,
	/// JSON document sent with `Content-Type: application/json`.
	Json(serde_json::Value),
	/// Pre-encoded bytes with an explicit content type.
	Raw {
		/// `Content-Type` header value.
		content_type: String,
		/// Encoded payload.
		bytes: Vec<u8>,
	},
}

/// Immutable description of one logical HTTP request.
///
/// The same descriptor is replayed verbatim on retry; only the `Authorization` header
/// differs between attempts.
#[derive(Clone, Debug, PartialEq)]
pub struct CallDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the product API root, e.g. `/items/42`.
	pub path: String,
	/// Query parameters in insertion order.
	pub query: Vec<(String, String)>,
	/// Request payload.
	pub body: CallBody,
	/// Expected response representation.
	pub response_kind: ResponseKind,
}
impl CallDescriptor {
	/// Creates a descriptor for `method` against `path`.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			body: CallBody::Empty,
			response_kind: ResponseKind::Json,
		}
	}

	/// Shorthand for a `GET` descriptor.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` descriptor.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` descriptor.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `DELETE` descriptor.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Attaches a JSON document as the body.
	pub fn with_json(mut self, value: serde_json::Value) -> Self {
		self.body = CallBody::Json(value);

		self
	}

	/// Serializes `value` into a JSON body.
	pub fn with_json_body<T>(self, value: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let value = serde_json::to_value(value).map_err(ConfigError::from)?;

		Ok(self.with_json(value))
	}

	/// Attaches pre-encoded bytes as the body.
	pub fn with_raw_body(mut self, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
		self.body = CallBody::Raw { content_type: content_type.into(), bytes };

		self
	}

	/// Requests a binary response instead of JSON.
	pub fn binary(mut self) -> Self {
		self.response_kind = ResponseKind::Binary;

		self
	}

	/// Returns `true` if a query parameter named `key` is present.
	pub fn has_query(&self, key: &str) -> bool {
		self.query.iter().any(|(k, _)| k == key)
	}

	/// Builds the HTTP request for one attempt against the fully resolved `url`.
	pub fn to_request(&self, url: &Url, authorization: &str) -> Result<HttpRequest> {
		let authorization = HeaderValue::from_str(authorization).map_err(|_| {
			ConfigError::InvalidValue { name: "authorization", value: "<redacted>".into() }
		})?;
		let mut builder = Request::builder()
			.method(self.method.clone())
			.uri(url.as_str())
			.header(AUTHORIZATION, authorization)
			.header(ACCEPT, self.response_kind.accept());
		let body = match &self.body {
			CallBody::Empty => Vec::new(),
			CallBody::Json(value) => {
				builder = builder.header(CONTENT_TYPE, "application/json");

				serde_json::to_vec(value).map_err(ConfigError::from)?
			},
			CallBody::Raw { content_type, bytes } => {
				builder = builder.header(CONTENT_TYPE, content_type.as_str());

				bytes.clone()
			},
		};

		builder.body(body).map_err(|e| ConfigError::from(e).into())
	}
}

/// Response returned to callers of the gateway.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Body decoded as lossy UTF-8.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Decodes the body as JSON, reporting the failing path on error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::Decode { status: self.status.as_u16(), source })
	}

	/// Parses the `Retry-After` header relative to `now`.
	pub fn retry_after(&self, now: OffsetDateTime) -> Option<Duration> {
		parse_retry_after(&self.headers, now)
	}
}
impl From<HttpResponse> for ApiResponse {
	fn from(response: HttpResponse) -> Self {
		let (parts, body) = response.into_parts();

		Self { status: parts.status, headers: parts.headers, body }
	}
}

/// Parses a `Retry-After` header as either delay-seconds or an HTTP date.
///
/// A purely numeric value is read as seconds and takes precedence; values beyond the
/// representable range saturate instead of being discarded. Otherwise the value is parsed
/// as an HTTP date (IMF-fixdate, RFC 850 or asctime) and the non-negative difference from
/// `now` is returned, so a date in the past yields zero. Unparseable or missing headers
/// yield `None`.
pub fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
		let seconds = raw.parse::<u64>().unwrap_or(u64::MAX);

		return Some(Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX)));
	}

	let moment = parse_http_date(raw)?;
	let delta = moment - now;

	Some(if delta.is_positive() { delta } else { Duration::ZERO })
}

fn parse_http_date(raw: &str) -> Option<OffsetDateTime> {
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		return Some(moment);
	}

	let normalized = match raw.split_once(',') {
		// RFC 850: `Sunday, 06-Nov-94 08:49:37 GMT`.
		Some((_, rest)) => {
			let mut fields = rest.split_whitespace();
			let mut date = fields.next()?.split('-');
			let (day, month, year) = (date.next()?, date.next()?, date.next()?);
			let time = fields.next()?;

			if date.next().is_some() || year.len() != 2 || fields.next()? != "GMT" {
				return None;
			}

			let year = year.parse::<u16>().ok()?;
			let year = if year < 70 { 2000 + year } else { 1900 + year };

			format!("{day:0>2} {month} {year} {time} +0000")
		},
		// asctime: `Sun Nov  6 08:49:37 1994`.
		None => {
			let fields = raw.split_whitespace().collect::<Vec<_>>();
			let [_, month, day, time, year] = fields.as_slice() else {
				return None;
			};

			format!("{day:0>2} {month} {year} {time} +0000")
		},
	};

	OffsetDateTime::parse(&normalized, &Rfc2822).ok()
}

/// Thin wrapper around [`ReqwestClient`] implementing [`ApiTransport`].
///
/// Redirects are followed according to the wrapped client's policy; build a custom
/// client with [`ReqwestTransport::with_client`] to change it.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request).map_err(TransportError::from)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut converted = HttpResponse::new(response.bytes().await?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}
