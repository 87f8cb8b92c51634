//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::Arc,
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use msgraph_credential::{
	auth::{AccessToken, Credential, TokenSecret},
	config::{CredentialConfig, CredentialConfigBuilder},
	controller::CredentialController,
	error::{ConfigError, Error, TransportError},
	exchange::{GrantType, TransportErrorMapper},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode},
};

pub type ScriptedController = CredentialController<ScriptedHttpClient, ScriptedMapper>;

#[derive(Debug)]
pub struct ScriptError(String);
impl Display for ScriptError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl StdError for ScriptError {}

enum Step {
	Reply { status: u16, body: String },
	Fail(String),
}

/// Request observed by the scripted transport.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub uri: String,
	pub body: String,
}
impl RecordedRequest {
	pub fn form(&self) -> Vec<(String, String)> {
		url::form_urlencoded::parse(self.body.as_bytes()).into_owned().collect()
	}

	pub fn field(&self, name: &str) -> Option<String> {
		self.form().into_iter().find(|(key, _)| key == name).map(|(_, value)| value)
	}
}

#[derive(Default)]
struct Script {
	steps: Mutex<VecDeque<Step>>,
	requests: Mutex<Vec<RecordedRequest>>,
	delay: Mutex<Option<StdDuration>>,
}

/// In-process token endpoint that answers from a queue of canned replies.
#[derive(Clone, Default)]
pub struct ScriptedHttpClient(Arc<Script>);
impl ScriptedHttpClient {
	pub fn new() -> Self {
		Self::default()
	}

	/// Delays every reply, keeping the exchange in flight for `delay`.
	pub fn with_delay(self, delay: StdDuration) -> Self {
		*self.0.delay.lock() = Some(delay);

		self
	}

	pub fn reply(&self, status: u16, body: &str) -> &Self {
		self.0.steps.lock().push_back(Step::Reply { status, body: body.to_owned() });

		self
	}

	pub fn fail(&self, message: &str) -> &Self {
		self.0.steps.lock().push_back(Step::Fail(message.to_owned()));

		self
	}

	pub fn calls(&self) -> usize {
		self.0.requests.lock().len()
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.0.requests.lock().clone()
	}
}
impl TokenHttpClient for ScriptedHttpClient {
	type Handle = ScriptedHandle;
	type TransportError = ScriptError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { script: self.0.clone(), slot }
	}
}

pub struct ScriptedHandle {
	script: Arc<Script>,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
	type Error = HttpClientError<ScriptError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let script = self.script.clone();
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.take();
			script.requests.lock().push(RecordedRequest {
				uri: request.uri().to_string(),
				body: String::from_utf8_lossy(request.body()).into_owned(),
			});

			let delay = *script.delay.lock();

			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			let step = script.steps.lock().pop_front();

			match step {
				Some(Step::Reply { status, body }) => {
					slot.store(ResponseMetadata { status: Some(status), retry_after: None });

					let mut response = HttpResponse::new(body.into_bytes());

					*response.status_mut() =
						StatusCode::from_u16(status).expect("Scripted status should be valid.");

					Ok(response)
				},
				Some(Step::Fail(message)) => Err(HttpClientError::Other(message)),
				None => Err(HttpClientError::Other("no scripted reply left".into())),
			}
		})
	}
}

/// Maps scripted transport failures the way the reqwest mapper does.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptedMapper;
impl TransportErrorMapper<ScriptError> for ScriptedMapper {
	fn map_transport_error(
		&self,
		_grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<ScriptError>,
	) -> Error {
		let status = metadata.and_then(|meta| meta.status);

		match error {
			HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::Other { message, status }.into(),
			_ => TransportError::Other { message: "unclassified".into(), status }.into(),
		}
	}
}

pub const TENANT: &str = "tenant-123";
pub const CLIENT_ID: &str = "client-123";
pub const CLIENT_SECRET: &str = "secret-123";
pub const REDIRECT_URI: &str = "http://localhost:8400/login";

pub fn config_builder() -> CredentialConfigBuilder {
	CredentialConfig::builder()
		.tenant(TENANT)
		.client_id(CLIENT_ID)
		.client_secret(CLIENT_SECRET)
		.redirect_uri(REDIRECT_URI)
		.scopes(["offline_access", "Group.ReadWrite.All"])
}

pub fn config() -> CredentialConfig {
	config_builder().build().expect("Config fixture should be valid.")
}

pub fn controller(client: &ScriptedHttpClient) -> ScriptedController {
	controller_with(config(), client)
}

pub fn controller_with(config: CredentialConfig, client: &ScriptedHttpClient) -> ScriptedController {
	CredentialController::with_http_client(config, client.clone(), ScriptedMapper)
}

/// Credential whose access token lapsed an hour ago.
pub fn expired_credential(token: &str, refresh: Option<&str>) -> Credential {
	let issued_at = OffsetDateTime::now_utc() - Duration::hours(2);

	Credential::new(
		AccessToken::new(TokenSecret::new(token), issued_at, Duration::hours(1)),
		refresh.map(TokenSecret::new),
	)
}

pub fn token_body(access: &str, refresh: &str, expires_in: u32) -> String {
	format!(r#"{{"access_token":"{access}","refresh_token":"{refresh}","expires_in":{expires_in}}}"#)
}
