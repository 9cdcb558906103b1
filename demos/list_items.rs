//! Demonstrates the gateway against a mock inventory API: the first call refreshes the
//! access token, a rate-limited attempt is paused via `Retry-After` and replayed, and the
//! decoded item list is printed.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
// self
use oauth2_gateway::{
	config::GatewayConfig,
	gateway::ReqwestGateway,
	http::{CallDescriptor, ReqwestTransport},
	reqwest::Client,
};

#[derive(Debug, Deserialize)]
struct ItemPage {
	items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
	item_id: String,
	name: String,
	rate: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/v2/token").query_param("grant_type", "refresh_token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3600}");
		})
		.await;
	let limited_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/inventory/v1/items").query_param("page", "1");
			then.status(429).header("retry-after", "1").body("Too Many Requests");
		})
		.await;
	let config = GatewayConfig::builder("demo-client", "demo-secret", "demo-refresh")
		.auth_base(server.base_url())
		.api_base(server.base_url())
		.organization_id("600")
		.build()?;
	// `httpmock` serves a self-signed certificate.
	let transport = ReqwestTransport::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let gateway = ReqwestGateway::with_transport(config, transport);

	// The first page is rate limited on every attempt; the replay failure reports the wait.
	match gateway.call(&CallDescriptor::get("/items").with_query("page", 1)).await {
		Ok(_) => println!("Unexpected success on a rate-limited page."),
		Err(e) => println!("Rate-limited page failed after one replay: {e}."),
	}

	limited_mock.assert_calls_async(2).await;

	let items_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/inventory/v1/items")
				.query_param("page", "2")
				.query_param("organization_id", "600")
				.header("authorization", "Zoho-oauthtoken demo-access");
			then.status(200).header("content-type", "application/json").body(
				"{\"code\":0,\"items\":[{\"item_id\":\"1\",\"name\":\"Widget\",\"rate\":9.5}]}",
			);
		})
		.await;
	let page: ItemPage =
		gateway.call_json(&CallDescriptor::get("/items").with_query("page", 2)).await?;

	for item in &page.items {
		println!("Item {} ({}) at {:.2}.", item.item_id, item.name, item.rate);
	}

	token_mock.assert_async().await;
	items_mock.assert_async().await;

	println!("Gateway metrics: {:?}.", gateway.metrics());

	Ok(())
}
