#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use httpmock::{Mock, prelude::*};
// self
use oauth2_gateway::{
	clock::{FixedJitter, ManualClock},
	config::{GatewayConfig, GatewayConfigBuilder},
	gateway::ReqwestGateway,
	http::ReqwestTransport,
	reqwest::Client,
};

pub const CLIENT_ID: &str = "1000.client";
pub const CLIENT_SECRET: &str = "client-secret";
pub const REFRESH_TOKEN: &str = "1000.refresh";
pub const ORGANIZATION_ID: &str = "600";

pub fn config_builder(server: &MockServer) -> GatewayConfigBuilder {
	GatewayConfig::builder(CLIENT_ID, CLIENT_SECRET, REFRESH_TOKEN)
		.auth_base(server.base_url())
		.api_base(server.base_url())
		.organization_id(ORGANIZATION_ID)
}

/// Builds a reqwest transport that accepts the self-signed certificates served by
/// `httpmock`.
pub fn test_transport() -> ReqwestTransport {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestTransport::with_client(client)
}

pub fn build_gateway(config: GatewayConfig) -> (ReqwestGateway, Arc<ManualClock>) {
	let clock = Arc::new(ManualClock::default());
	let gateway = ReqwestGateway::with_transport(config, test_transport())
		.with_clock(clock.clone())
		.with_jitter(Arc::new(FixedJitter::new(Default::default())));

	(gateway, clock)
}

pub async fn mock_token<'a>(server: &'a MockServer, access_token: &str) -> Mock<'a> {
	let body = format!(
		r#"{{"access_token":"{access_token}","api_domain":"https://www.zohoapis.com","token_type":"Bearer","expires_in":3600}}"#
	);

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/v2/token")
				.query_param("grant_type", "refresh_token")
				.query_param("refresh_token", REFRESH_TOKEN)
				.query_param("client_id", CLIENT_ID)
				.query_param("client_secret", CLIENT_SECRET);
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

pub fn bearer(token: &str) -> String {
	format!("Zoho-oauthtoken {token}")
}
