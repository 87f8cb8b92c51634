//! Authorization URL construction and CSRF `state` handling.

// crates.io
use rand::{Rng, distr::Alphanumeric};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{AuthorizationGrant, ClientId, ScopeSet, Tenant},
	authority::Authority,
	config::CredentialConfig,
	error::{AuthorizationError, ConfigError},
	redirect,
};

const STATE_LEN: usize = 32;

/// Builds the browser URL for the authorization-code flow.
///
/// The URL targets `<authority>/<tenant>/oauth2/v2.0/authorize` with the query parameters
/// `response_mode=query`, `state`, `response_type=code`, `client_id`, `scope` (space-joined)
/// and `redirect_uri`, in that order. Values are percent-encoded, spaces as `%20`. The
/// function performs no I/O.
pub fn build_authorization_url(
	authority: &Authority,
	tenant: &Tenant,
	client_id: &ClientId,
	scopes: &ScopeSet,
	redirect_uri: &Url,
	state: &str,
) -> Result<Url, ConfigError> {
	let mut url = authority.authorize_endpoint(tenant)?;
	let scope = scopes.normalized();
	let query = [
		("response_mode", "query"),
		("state", state),
		("response_type", "code"),
		("client_id", &**client_id),
		("scope", scope.as_str()),
		("redirect_uri", redirect_uri.as_str()),
	]
	.iter()
	.map(|(key, value)| format!("{key}={}", percent_encode(value)))
	.collect::<Vec<_>>()
	.join("&");

	url.set_query(Some(&query));

	Ok(url)
}

// Form encoding writes a literal `+` as `%2B`, so any remaining `+` stands for a space.
fn percent_encode(value: &str) -> String {
	form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>().replace('+', "%20")
}

/// Returns a fresh random `state` value.
pub fn generate_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}

/// One pending authorization request: the URL to open and the `state` it must come back
/// with.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Tenant the request targets.
	pub tenant: Tenant,
	/// Requested scopes.
	pub scopes: ScopeSet,
	/// Redirect URI the browser returns to.
	pub redirect_uri: Url,
	/// Opaque value that must round-trip through the redirect.
	pub state: String,
	/// URL to send the user to.
	pub authorize_url: Url,
}
impl AuthorizationSession {
	/// Starts a session for `config` with a freshly generated `state`.
	pub fn new(config: &CredentialConfig) -> Result<Self, ConfigError> {
		Self::with_state(config, generate_state())
	}

	/// Starts a session for `config` with a caller-supplied `state`.
	pub fn with_state(config: &CredentialConfig, state: impl Into<String>) -> Result<Self, ConfigError> {
		let state = state.into();

		if state.is_empty() {
			return Err(ConfigError::MissingField { field: "state" });
		}

		let authorize_url = build_authorization_url(
			&config.authority,
			&config.tenant,
			&config.client_id,
			&config.scopes,
			&config.redirect_uri,
			&state,
		)?;

		Ok(Self {
			tenant: config.tenant.clone(),
			scopes: config.scopes.clone(),
			redirect_uri: config.redirect_uri.clone(),
			state,
			authorize_url,
		})
	}

	/// Validates the `state` returned on the redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<(), AuthorizationError> {
		if returned_state == self.state { Ok(()) } else { Err(AuthorizationError::StateMismatch) }
	}

	/// Extracts the grant from a redirect URL pasted by the user.
	pub fn accept_redirect(&self, redirect: &Url) -> Result<AuthorizationGrant, AuthorizationError> {
		redirect::parse_redirect_query(redirect.query().unwrap_or_default(), &self.state)
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("tenant", &self.tenant)
			.field("scopes", &self.scopes)
			.field("redirect_uri", &self.redirect_uri)
			.field("state", &self.state)
			.field("authorize_url", &self.authorize_url)
			.finish()
	}
}
