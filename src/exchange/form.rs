//! Form-encoded token endpoint requests.

// crates.io
use oauth2::{
	HttpRequest,
	http::{
		HeaderValue, Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	auth::{AuthorizationGrant, ClientId, TokenSecret},
	error::ConfigError,
	exchange::GrantType,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Ordered `application/x-www-form-urlencoded` body for one exchange.
///
/// Fields are emitted in lexical key order, which is the order the token endpoint has always
/// been sent.
pub(crate) struct TokenForm {
	grant: GrantType,
	pairs: Vec<(&'static str, String)>,
}
impl TokenForm {
	pub(crate) fn authorization_code(
		client_id: &ClientId,
		client_secret: &TokenSecret,
		grant: &AuthorizationGrant,
		redirect_uri: &Url,
	) -> Self {
		Self {
			grant: GrantType::AuthorizationCode,
			pairs: vec![
				("client_id", client_id.to_string()),
				("client_secret", client_secret.expose().to_owned()),
				("code", grant.code().expose().to_owned()),
				("grant_type", GrantType::AuthorizationCode.as_str().to_owned()),
				("redirect_uri", redirect_uri.to_string()),
			],
		}
	}

	pub(crate) fn refresh_token(
		client_id: &ClientId,
		client_secret: &TokenSecret,
		refresh_token: &TokenSecret,
	) -> Self {
		Self {
			grant: GrantType::RefreshToken,
			pairs: vec![
				("client_id", client_id.to_string()),
				("client_secret", client_secret.expose().to_owned()),
				("grant_type", GrantType::RefreshToken.as_str().to_owned()),
				("refresh_token", refresh_token.expose().to_owned()),
			],
		}
	}

	pub(crate) fn grant(&self) -> GrantType {
		self.grant
	}

	pub(crate) fn encode(&self) -> String {
		let mut serializer = Serializer::new(String::new());

		for (key, value) in &self.pairs {
			serializer.append_pair(key, value);
		}

		serializer.finish()
	}

	pub(crate) fn into_request(self, endpoint: &Url) -> Result<HttpRequest, ConfigError> {
		let body = self.encode().into_bytes();

		Request::builder()
			.method(Method::POST)
			.uri(endpoint.as_str())
			.header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
			.header(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE))
			.body(body)
			.map_err(ConfigError::from)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn client() -> (ClientId, TokenSecret) {
		(
			ClientId::new("client-123").expect("Client fixture should be valid."),
			TokenSecret::new("s3cr3t&=+"),
		)
	}

	#[test]
	fn authorization_code_form_is_ordered_and_encoded() {
		let (client_id, secret) = client();
		let grant = AuthorizationGrant::new("abc/def").expect("Code fixture should be valid.");
		let redirect =
			Url::parse("http://localhost:8400/login").expect("Redirect fixture should parse.");
		let form = TokenForm::authorization_code(&client_id, &secret, &grant, &redirect);

		assert_eq!(form.grant(), GrantType::AuthorizationCode);
		assert_eq!(
			form.encode(),
			"client_id=client-123&client_secret=s3cr3t%26%3D%2B&code=abc%2Fdef\
			 &grant_type=authorization_code&redirect_uri=http%3A%2F%2Flocalhost%3A8400%2Flogin"
		);
	}

	#[test]
	fn refresh_form_carries_refresh_token() {
		let (client_id, secret) = client();
		let form = TokenForm::refresh_token(&client_id, &secret, &TokenSecret::new("r1"));

		assert_eq!(
			form.encode(),
			"client_id=client-123&client_secret=s3cr3t%26%3D%2B&grant_type=refresh_token&refresh_token=r1"
		);
	}

	#[test]
	fn request_posts_form_and_accepts_json() {
		let (client_id, secret) = client();
		let endpoint = Url::parse("https://login.microsoftonline.com/common/oauth2/v2.0/token")
			.expect("Endpoint fixture should parse.");
		let request = TokenForm::refresh_token(&client_id, &secret, &TokenSecret::new("r1"))
			.into_request(&endpoint)
			.expect("Request should build.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.uri().to_string(), endpoint.as_str());
		assert_eq!(
			request.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok()),
			Some(FORM_CONTENT_TYPE)
		);
		assert_eq!(
			request.headers().get(ACCEPT).and_then(|value| value.to_str().ok()),
			Some(JSON_CONTENT_TYPE)
		);
		assert!(request.body().starts_with(b"client_id=client-123&"));
	}
}
