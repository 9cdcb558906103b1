#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
use time::Duration;
// self
use common::*;
use oauth2_gateway::{error::{Error, RefreshError}, http::CallDescriptor};

#[tokio::test]
async fn proactive_refresh_runs_once_credential_reaches_threshold() {
	let server = MockServer::start_async().await;
	let token = mock_token(&server, "fresh-token").await;
	let items = server
		.mock_async(|when, then| {
			when.method(GET).path("/inventory/v1/items");
			then.status(200).body(r#"{"code":0}"#);
		})
		.await;
	let (gateway, clock) = build_gateway(
		config_builder(&server).build().expect("Gateway configuration should build."),
	);
	let descriptor = CallDescriptor::get("/items");

	gateway.call(&descriptor).await.expect("First call should succeed.");
	clock.advance(Duration::minutes(49));
	gateway.call(&descriptor).await.expect("Second call should succeed.");

	token.assert_calls_async(1).await;

	clock.advance(Duration::minutes(1));
	gateway.call(&descriptor).await.expect("Third call should succeed.");

	token.assert_calls_async(2).await;
	items.assert_calls_async(3).await;

	assert_eq!(gateway.credential().map(|c| c.generation), Some(2));
	assert_eq!(gateway.metrics().refreshes(), 2);
}

#[tokio::test]
async fn rejected_refresh_fails_before_any_resource_attempt() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/v2/token");
			then.status(400).body(r#"{"error":"invalid_client"}"#);
		})
		.await;
	let items = server
		.mock_async(|when, then| {
			when.path("/inventory/v1/items");
			then.status(200).body("{}");
		})
		.await;
	let (gateway, _clock) = build_gateway(
		config_builder(&server).build().expect("Gateway configuration should build."),
	);
	let err = gateway
		.call(&CallDescriptor::get("/items"))
		.await
		.expect_err("Refresh rejection should surface.");

	assert!(matches!(err, Error::CredentialRefresh(RefreshError::Rejected { status: 400, .. })));
	assert!(gateway.credential().is_none());

	token.assert_calls_async(1).await;
	items.assert_calls_async(0).await;
}

#[tokio::test]
async fn provider_error_with_success_status_is_a_refresh_failure() {
	let server = MockServer::start_async().await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/v2/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_code"}"#);
		})
		.await;
	let (gateway, _clock) = build_gateway(
		config_builder(&server).build().expect("Gateway configuration should build."),
	);
	let err = gateway.refresh_credential().await.expect_err("OAuth error bodies should fail.");

	match err {
		Error::CredentialRefresh(RefreshError::Provider { error }) => assert_eq!(error, "invalid_code"),
		other => panic!("Unexpected error: {other:?}"),
	}
	assert_eq!(gateway.metrics().refresh_failures(), 1);
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server, "fresh-token").await;
	let config = config_builder(&server)
		.api_base("http://127.0.0.1:9")
		.build()
		.expect("Gateway configuration should build.");
	let (gateway, _clock) = build_gateway(config);
	let err = gateway
		.call(&CallDescriptor::get("/items"))
		.await
		.expect_err("Connection failures should surface.");

	assert!(matches!(err, Error::Transport(_)));
	assert_eq!(gateway.credential().map(|c| c.access_token.secret().to_owned()), Some("fresh-token".into()));
}
