//! `grant_type=refresh_token` exchange against the accounts server.
//!
//! The exchange posts the refresh secret and client identity as query parameters to
//! `<auth-base>/oauth/v2/token` and only requires `access_token` in the response body.
//! Failures are reported once as [`RefreshError`]; nothing here retries.

pub use oauth2;

// crates.io
use oauth2::http::{Request, header::ACCEPT};
// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	error::{ConfigError, RefreshError},
	http::ApiTransport,
};

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	error: Option<String>,
}

/// Builds the token endpoint request for `config`.
pub fn build_refresh_request(config: &GatewayConfig) -> Result<HttpRequest> {
	let mut url = config.token_endpoint.clone();

	url.query_pairs_mut()
		.append_pair("grant_type", "refresh_token")
		.append_pair("refresh_token", config.refresh_token.secret())
		.append_pair("client_id", config.client_id.as_str())
		.append_pair("client_secret", config.client_secret.secret());

	Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(ACCEPT, "application/json")
		.body(Vec::new())
		.map_err(|e| ConfigError::from(e).into())
}

/// Extracts the access token from a token endpoint response.
pub fn parse_refresh_response(response: HttpResponse) -> Result<AccessToken, RefreshError> {
	let status = response.status();
	let body = response.into_body();

	if !status.is_success() {
		return Err(RefreshError::Rejected {
			status: status.as_u16(),
			body: String::from_utf8_lossy(&body).into_owned(),
		});
	}

	let mut de = serde_json::Deserializer::from_slice(&body);
	let parsed: TokenEndpointResponse = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| RefreshError::Malformed { status: status.as_u16(), source })?;

	match parsed {
		TokenEndpointResponse { access_token: Some(token), .. } if !token.is_empty() =>
			Ok(AccessToken::new(token)),
		TokenEndpointResponse { error: Some(error), .. } => Err(RefreshError::Provider { error }),
		_ => Err(RefreshError::Provider { error: "missing_access_token".into() }),
	}
}

/// Performs the refresh exchange through `transport`.
pub async fn exchange_refresh_token<T>(transport: &T, config: &GatewayConfig) -> Result<AccessToken>
where
	T: ?Sized + ApiTransport,
{
	let request = build_refresh_request(config)?;
	let response = transport.send(request).await.map_err(RefreshError::from)?;

	Ok(parse_refresh_response(response)?)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config() -> GatewayConfig {
		GatewayConfig::builder("client-1", "secret-1", "refresh-1")
			.build()
			.expect("Configuration should build.")
	}

	fn response(status: u16, body: &str) -> HttpResponse {
		oauth2::http::Response::builder()
			.status(status)
			.body(body.as_bytes().to_vec())
			.expect("Response fixture should build.")
	}

	#[test]
	fn request_carries_refresh_grant_parameters() {
		let request = build_refresh_request(&config()).expect("Refresh request should build.");
		let url = Url::parse(&request.uri().to_string()).expect("Request URI should parse.");
		let owned: Vec<(String, String)> = url.query_pairs().into_owned().collect();
		let pairs: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

		assert_eq!(*request.method(), Method::POST);
		assert_eq!(url.path(), "/oauth/v2/token");
		assert_eq!(pairs, [
			("grant_type", "refresh_token"),
			("refresh_token", "refresh-1"),
			("client_id", "client-1"),
			("client_secret", "secret-1"),
		]);
	}

	#[test]
	fn parses_minimal_token_body() {
		let token = parse_refresh_response(response(200, r#"{"access_token":"abc"}"#))
			.expect("Minimal body should parse.");

		assert_eq!(token.secret(), "abc");

		let token = parse_refresh_response(response(
			200,
			r#"{"access_token":"def","api_domain":"https://www.zohoapis.com","token_type":"Bearer","expires_in":3600}"#,
		))
		.expect("Full body should parse.");

		assert_eq!(token.secret(), "def");
	}

	#[test]
	fn classifies_failures() {
		let err = parse_refresh_response(response(400, "bad request")).expect_err("400 fails.");

		assert!(matches!(err, RefreshError::Rejected { status: 400, .. }));

		let err = parse_refresh_response(response(200, r#"{"error":"invalid_code"}"#))
			.expect_err("OAuth error bodies fail.");

		assert!(matches!(err, RefreshError::Provider { ref error } if error == "invalid_code"));

		let err = parse_refresh_response(response(200, "<html>")).expect_err("HTML fails.");

		assert!(matches!(err, RefreshError::Malformed { status: 200, .. }));

		let err = parse_refresh_response(response(200, r#"{"access_token":""}"#))
			.expect_err("Empty tokens fail.");

		assert!(matches!(err, RefreshError::Provider { .. }));
	}
}
