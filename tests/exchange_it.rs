#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use common::*;
use msgraph_credential::{
	auth::{AuthorizationGrant, ClientId, Tenant, TokenSecret},
	config::CredentialConfig,
	controller::CredentialController,
	error::{Error, TransportError},
	exchange::GrantExchanger,
};

const TOKEN_PATH: &str = "/tenant-123/oauth2/v2.0/token";
const FORM: &str = "application/x-www-form-urlencoded";

fn server_config(server: &MockServer) -> CredentialConfig {
	config_builder().authority(server.base_url()).build().expect("Config fixture should be valid.")
}

fn client_credentials() -> (Tenant, ClientId, TokenSecret) {
	(
		TENANT.parse().expect("Tenant fixture should be valid."),
		ClientId::new(CLIENT_ID).expect("Client fixture should be valid."),
		TokenSecret::new(CLIENT_SECRET),
	)
}

#[tokio::test]
async fn authorization_code_exchange_posts_ordered_form() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("content-type", FORM)
				.header("accept", "application/json")
				.body(
					"client_id=client-123&client_secret=secret-123&code=abc\
					 &grant_type=authorization_code&redirect_uri=http%3A%2F%2Flocalhost%3A8400%2Flogin",
				);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"tok1","expires_in":3600,"refresh_token":"r1"}"#);
		})
		.await;
	let exchanger =
		GrantExchanger::reqwest(&server_config(&server)).expect("Exchanger should build.");
	let (tenant, client_id, secret) = client_credentials();
	let grant = AuthorizationGrant::new("abc").expect("Code fixture should be valid.");
	let redirect = url::Url::parse(REDIRECT_URI).expect("Redirect fixture should parse.");
	let before = OffsetDateTime::now_utc();
	let response = exchanger
		.exchange_authorization_code(&tenant, &client_id, &secret, &grant, &redirect)
		.await
		.expect("Exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(response.access_token.expose(), "tok1");
	assert_eq!(response.refresh_token.expose(), "r1");
	assert_eq!(response.expires_in, Duration::hours(1));
	assert!(response.issued_at >= before);
	assert_eq!(response.expires_at - response.issued_at, Duration::hours(1));
}

#[tokio::test]
async fn refresh_exchange_posts_refresh_form() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).header("content-type", FORM).body(
				"client_id=client-123&client_secret=secret-123&grant_type=refresh_token&refresh_token=r1",
			);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"tok2","expires_in":7200,"refresh_token":"r2"}"#);
		})
		.await;
	let exchanger =
		GrantExchanger::reqwest(&server_config(&server)).expect("Exchanger should build.");
	let (tenant, client_id, secret) = client_credentials();
	let response = exchanger
		.exchange_refresh_token(&tenant, &client_id, &secret, &TokenSecret::new("r1"))
		.await
		.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(response.access_token.expose(), "tok2");
	assert_eq!(response.refresh_token.expose(), "r2");
}

#[tokio::test]
async fn error_body_surfaces_status_and_retry_hint() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(429)
				.header("content-type", "application/json")
				.header("retry-after", "30")
				.body(r#"{"error":"temporarily_unavailable","error_description":"slow down"}"#);
		})
		.await;
	let exchanger =
		GrantExchanger::reqwest(&server_config(&server)).expect("Exchanger should build.");
	let (tenant, client_id, secret) = client_credentials();
	let err = exchanger
		.exchange_refresh_token(&tenant, &client_id, &secret, &TokenSecret::new("r1"))
		.await
		.expect_err("Rejection must fail the exchange.");
	let rejection = err.rejection().expect("Failure should be an upstream rejection.");

	mock.assert_async().await;

	assert_eq!(rejection.error, "temporarily_unavailable");
	assert_eq!(rejection.description.as_deref(), Some("slow down"));
	assert_eq!(rejection.status, Some(429));
	assert_eq!(rejection.retry_after, Some(Duration::seconds(30)));
}

#[tokio::test]
async fn html_error_page_is_a_transport_failure() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(502).header("content-type", "text/html").body("<html>Bad gateway</html>");
		})
		.await;

	let exchanger =
		GrantExchanger::reqwest(&server_config(&server)).expect("Exchanger should build.");
	let (tenant, client_id, secret) = client_credentials();
	let err = exchanger
		.exchange_refresh_token(&tenant, &client_id, &secret, &TokenSecret::new("r1"))
		.await
		.expect_err("Non-JSON body must fail.");

	assert!(
		matches!(err, Error::Transport(TransportError::MalformedJson { status: Some(502), .. })),
		"Expected malformed JSON, got {err:?}."
	);
}

#[tokio::test]
async fn controller_signs_requests_with_cached_token() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"tok1","expires_in":3600,"refresh_token":"r1"}"#);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/me").header("authorization", "Bearer tok1");
			then.status(200).body("{}");
		})
		.await;
	let controller =
		CredentialController::new(server_config(&server)).expect("Controller should build.");

	controller
		.initialize_from_authorization_code(
			AuthorizationGrant::new("abc").expect("Code fixture should be valid."),
		)
		.await
		.expect("Code exchange should succeed.");

	let api = reqwest::Client::new();

	for _ in 0..3 {
		let request = controller
			.authorize_request(api.get(server.url("/v1.0/me")))
			.await
			.expect("Request should be signed.");
		let response = request.send().await.expect("API call should succeed.");

		assert!(response.status().is_success());
	}

	token_mock.assert_calls_async(1).await;
	api_mock.assert_calls_async(3).await;
}
