//! Gateway configuration: endpoints, client credentials, and pacing/backoff knobs.
//!
//! Values are read-only once a [`GatewayConfig`] is built. Construct one with
//! [`GatewayConfig::builder`] or load it from the process environment with
//! [`GatewayConfig::from_env`], which understands the following variables:
//!
//! | Variable               | Setting           | Default                      |
//! |------------------------|-------------------|------------------------------|
//! | `ZOHO_DC_BASE`         | `auth_base`       | `https://accounts.zoho.com`  |
//! | `ZOHO_API_BASE`        | `api_base`        | `https://www.zohoapis.com`   |
//! | `ZOHO_PRODUCT`         | `product`         | `inventory`                  |
//! | `ZOHO_CLIENT_ID`       | `client_id`       | required                     |
//! | `ZOHO_CLIENT_SECRET`   | `client_secret`   | required                     |
//! | `ZOHO_REFRESH_TOKEN`   | `refresh_token`   | required                     |
//! | `ZOHO_ORGANIZATION_ID` | `organization_id` | unset                        |
//! | `ZOHO_MIN_GAP_MS`      | `min_gap`         | `300`                        |

// self
use crate::{_prelude::*, error::ConfigError, http::CallDescriptor};

/// Default accounts server hosting the token endpoint.
pub const DEFAULT_AUTH_BASE: &str = "https://accounts.zoho.com";
/// Default API server hosting product resources.
pub const DEFAULT_API_BASE: &str = "https://www.zohoapis.com";
/// Default product segment of the resource path.
pub const DEFAULT_PRODUCT: &str = "inventory";
/// Default `Authorization` scheme.
pub const DEFAULT_TOKEN_SCHEME: &str = "Zoho-oauthtoken";

/// Validated, immutable gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
	/// Token endpoint (`<auth-base>/oauth/v2/token`).
	pub token_endpoint: Url,
	/// Resource root (`<api-base>/<product>/v1/`), always ending with `/`.
	pub resource_base: Url,
	/// OAuth 2.0 client identifier.
	pub client_id: ClientId,
	/// OAuth 2.0 client secret.
	pub client_secret: ClientSecret,
	/// Long-lived refresh secret exchanged for access tokens.
	pub refresh_token: RefreshToken,
	/// Organization appended as `organization_id` to calls that do not set it.
	pub organization_id: Option<String>,
	/// Scheme placed before the token in the `Authorization` header.
	pub token_scheme: String,
	/// Minimum spacing between successful calls.
	pub min_gap: Duration,
	/// Credential age at which a proactive refresh happens before the next attempt.
	pub refresh_threshold: Duration,
	/// Lower bound of the randomized rate-limit backoff.
	pub backoff_floor: Duration,
	/// Upper bound (exclusive) of the randomized rate-limit backoff.
	pub backoff_ceiling: Duration,
	/// Cap applied to server-supplied `Retry-After` delays; `None` trusts the server.
	pub max_retry_after: Option<Duration>,
}
impl GatewayConfig {
	/// Proactive refresh threshold applied when none is configured.
	pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::minutes(50);
	/// Randomized backoff floor applied when none is configured.
	pub const DEFAULT_BACKOFF_FLOOR: Duration = Duration::seconds(15);
	/// Randomized backoff ceiling applied when none is configured.
	pub const DEFAULT_BACKOFF_CEILING: Duration = Duration::seconds(45);
	/// `Retry-After` cap applied when none is configured.
	pub const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::minutes(15);

	/// Creates a builder seeded with the three required client secrets.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(client_id, client_secret, refresh_token)
	}

	/// Loads configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		GatewayConfigBuilder::from_lookup(|name| std::env::var(name).ok())?.build()
	}

	/// Resolves the absolute URL for a call, including query parameters.
	pub fn resource_url(&self, descriptor: &CallDescriptor) -> Result<Url, ConfigError> {
		let path = descriptor.path.trim_start_matches('/');
		let mut url = self
			.resource_base
			.join(path)
			.map_err(|source| ConfigError::InvalidUrl { field: "resource", source })?;

		if !url.as_str().starts_with(self.resource_base.as_str()) {
			return Err(ConfigError::InvalidValue { name: "path", value: descriptor.path.clone() });
		}

		let organization = self
			.organization_id
			.as_deref()
			.filter(|_| !descriptor.has_query("organization_id"));

		if !descriptor.query.is_empty() || organization.is_some() {
			let mut pairs = url.query_pairs_mut();

			for (key, value) in &descriptor.query {
				pairs.append_pair(key, value);
			}
			if let Some(organization) = organization {
				pairs.append_pair("organization_id", organization);
			}
		}

		Ok(url)
	}
}

/// Builder for [`GatewayConfig`] values.
#[derive(Clone, Debug)]
pub struct GatewayConfigBuilder {
	/// Accounts server base URL.
	pub auth_base: String,
	/// API server base URL.
	pub api_base: String,
	/// Product segment of the resource path.
	pub product: String,
	/// OAuth 2.0 client identifier.
	pub client_id: ClientId,
	/// OAuth 2.0 client secret.
	pub client_secret: ClientSecret,
	/// Long-lived refresh secret.
	pub refresh_token: RefreshToken,
	/// Optional organization identifier.
	pub organization_id: Option<String>,
	/// `Authorization` scheme.
	pub token_scheme: String,
	/// Minimum spacing between successful calls.
	pub min_gap: Duration,
	/// Proactive refresh threshold.
	pub refresh_threshold: Duration,
	/// Randomized backoff floor.
	pub backoff_floor: Duration,
	/// Randomized backoff ceiling.
	pub backoff_ceiling: Duration,
	/// Cap for server-supplied `Retry-After` delays.
	pub max_retry_after: Option<Duration>,
}
impl GatewayConfigBuilder {
	/// Creates a builder with defaults for everything but the client secrets.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Self {
		Self {
			auth_base: DEFAULT_AUTH_BASE.into(),
			api_base: DEFAULT_API_BASE.into(),
			product: DEFAULT_PRODUCT.into(),
			client_id: ClientId::new(client_id.into()),
			client_secret: ClientSecret::new(client_secret.into()),
			refresh_token: RefreshToken::new(refresh_token.into()),
			organization_id: None,
			token_scheme: DEFAULT_TOKEN_SCHEME.into(),
			min_gap: crate::limiter::AdmissionLimiter::DEFAULT_MIN_GAP,
			refresh_threshold: GatewayConfig::DEFAULT_REFRESH_THRESHOLD,
			backoff_floor: GatewayConfig::DEFAULT_BACKOFF_FLOOR,
			backoff_ceiling: GatewayConfig::DEFAULT_BACKOFF_CEILING,
			max_retry_after: Some(GatewayConfig::DEFAULT_MAX_RETRY_AFTER),
		}
	}

	/// Populates a builder from an environment-like lookup function.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let required = |name: &'static str| {
			lookup(name).filter(|value| !value.trim().is_empty()).ok_or(ConfigError::Missing { name })
		};
		let mut builder = Self::new(
			required("ZOHO_CLIENT_ID")?,
			required("ZOHO_CLIENT_SECRET")?,
			required("ZOHO_REFRESH_TOKEN")?,
		);

		if let Some(value) = lookup("ZOHO_DC_BASE") {
			builder = builder.auth_base(value);
		}
		if let Some(value) = lookup("ZOHO_API_BASE") {
			builder = builder.api_base(value);
		}
		if let Some(value) = lookup("ZOHO_PRODUCT") {
			builder = builder.product(value);
		}
		if let Some(value) = lookup("ZOHO_ORGANIZATION_ID").filter(|v| !v.trim().is_empty()) {
			builder = builder.organization_id(value);
		}
		if let Some(value) = lookup("ZOHO_MIN_GAP_MS") {
			let millis = value
				.trim()
				.parse::<u32>()
				.map_err(|_| ConfigError::InvalidValue { name: "ZOHO_MIN_GAP_MS", value })?;

			builder = builder.min_gap(Duration::milliseconds(millis.into()));
		}

		Ok(builder)
	}

	/// Sets the accounts server base URL.
	pub fn auth_base(mut self, url: impl Into<String>) -> Self {
		self.auth_base = url.into();

		self
	}

	/// Sets the API server base URL.
	pub fn api_base(mut self, url: impl Into<String>) -> Self {
		self.api_base = url.into();

		self
	}

	/// Sets the product path segment.
	pub fn product(mut self, product: impl Into<String>) -> Self {
		self.product = product.into();

		self
	}

	/// Sets the organization identifier appended to calls.
	pub fn organization_id(mut self, organization_id: impl Into<String>) -> Self {
		self.organization_id = Some(organization_id.into());

		self
	}

	/// Overrides the `Authorization` scheme.
	pub fn token_scheme(mut self, scheme: impl Into<String>) -> Self {
		self.token_scheme = scheme.into();

		self
	}

	/// Overrides the minimum spacing between successful calls.
	pub fn min_gap(mut self, gap: Duration) -> Self {
		self.min_gap = gap;

		self
	}

	/// Overrides the proactive refresh threshold.
	pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
		self.refresh_threshold = threshold;

		self
	}

	/// Overrides the randomized backoff range `[floor, ceiling)`.
	pub fn backoff_range(mut self, floor: Duration, ceiling: Duration) -> Self {
		self.backoff_floor = floor;
		self.backoff_ceiling = ceiling;

		self
	}

	/// Overrides (or removes, with `None`) the `Retry-After` cap.
	pub fn max_retry_after(mut self, cap: Option<Duration>) -> Self {
		self.max_retry_after = cap;

		self
	}

	/// Validates the builder and produces a [`GatewayConfig`].
	pub fn build(self) -> Result<GatewayConfig, ConfigError> {
		if self.client_id.as_str().trim().is_empty() {
			return Err(ConfigError::Missing { name: "client_id" });
		}
		if self.client_secret.secret().trim().is_empty() {
			return Err(ConfigError::Missing { name: "client_secret" });
		}
		if self.refresh_token.secret().trim().is_empty() {
			return Err(ConfigError::Missing { name: "refresh_token" });
		}

		let product = self.product.trim_matches('/');

		if product.is_empty() {
			return Err(ConfigError::Missing { name: "product" });
		}
		if self.token_scheme.trim().is_empty() || self.token_scheme.contains(char::is_whitespace) {
			return Err(ConfigError::InvalidValue {
				name: "token_scheme",
				value: self.token_scheme,
			});
		}
		if self.min_gap.is_negative() {
			return Err(ConfigError::InvalidValue { name: "min_gap", value: self.min_gap.to_string() });
		}
		if !self.refresh_threshold.is_positive() {
			return Err(ConfigError::InvalidValue {
				name: "refresh_threshold",
				value: self.refresh_threshold.to_string(),
			});
		}
		if self.backoff_floor.is_negative() || self.backoff_ceiling < self.backoff_floor {
			return Err(ConfigError::InvalidBackoff);
		}
		if let Some(cap) = self.max_retry_after.filter(|cap| cap.is_negative()) {
			return Err(ConfigError::InvalidValue { name: "max_retry_after", value: cap.to_string() });
		}

		let token_endpoint =
			parse_http_url("auth_base", &format!("{}/oauth/v2/token", base(&self.auth_base)))?;
		let resource_base =
			parse_http_url("api_base", &format!("{}/{product}/v1/", base(&self.api_base)))?;

		Ok(GatewayConfig {
			token_endpoint,
			resource_base,
			client_id: self.client_id,
			client_secret: self.client_secret,
			refresh_token: self.refresh_token,
			organization_id: self.organization_id,
			token_scheme: self.token_scheme,
			min_gap: self.min_gap,
			refresh_threshold: self.refresh_threshold,
			backoff_floor: self.backoff_floor,
			backoff_ceiling: self.backoff_ceiling,
			max_retry_after: self.max_retry_after,
		})
	}
}

fn base(raw: &str) -> &str {
	raw.trim().trim_end_matches('/')
}

fn parse_http_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { field, source })?;

	match url.scheme() {
		"http" | "https" => Ok(url),
		_ => Err(ConfigError::UnsupportedScheme { field, url: url.to_string() }),
	}
}
