//! Validated client configuration and its builder.
//!
//! [`CredentialConfig`] can be assembled in code through [`CredentialConfig::builder`] or
//! deserialized from any serde format; both paths run the same validation.
//!
//! ```json
//! {
//!   "tenant": "contoso.onmicrosoft.com",
//!   "client_id": "6731de76-14a6-49ae-97bc-6eba6914391e",
//!   "client_secret": "...",
//!   "redirect_uri": "http://localhost:8400/login",
//!   "scopes": ["offline_access", "Group.ReadWrite.All"],
//!   "exchange_timeout_secs": 30
//! }
//! ```

// crates.io
use serde::Deserializer;
// self
use crate::{
	_prelude::*,
	auth::{ClientId, ScopeSet, Tenant, TokenSecret},
	authority::{Authority, DEFAULT_AUTHORITY},
	error::ConfigError,
};

/// Bound applied to every token endpoint exchange unless overridden.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::seconds(30);

/// How refresh responses without a `refresh_token` are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTokenPolicy {
	/// Every exchange must return a refresh token; otherwise it fails and the cache stays as it
	/// was.
	#[default]
	Required,
	/// A refresh response without a refresh token keeps the one that was just used.
	/// Authorization-code exchanges still require one.
	KeepPrevious,
}

/// Immutable, validated settings shared by the exchanger and the controller.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "CredentialConfigBuilder")]
pub struct CredentialConfig {
	/// Identity-platform base URL.
	pub authority: Authority,
	/// Tenant routing segment.
	pub tenant: Tenant,
	/// Application (client) identifier.
	pub client_id: ClientId,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
	/// Redirect URI registered for the application.
	pub redirect_uri: Url,
	/// Delegated permissions requested during authorization.
	pub scopes: ScopeSet,
	/// Upper bound for a single token endpoint exchange.
	pub exchange_timeout: Duration,
	/// Handling of refresh responses that omit a refresh token.
	pub refresh_token_policy: RefreshTokenPolicy,
}
impl CredentialConfig {
	/// Returns an empty builder.
	pub fn builder() -> CredentialConfigBuilder {
		CredentialConfigBuilder::default()
	}

	/// Decodes and validates a JSON configuration document.
	///
	/// Unlike plain `serde_json`, the error names the setting that failed, e.g.
	/// `exchange_timeout_secs`.
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ConfigError::Parse { source })
	}
}
impl TryFrom<CredentialConfigBuilder> for CredentialConfig {
	type Error = ConfigError;

	fn try_from(value: CredentialConfigBuilder) -> Result<Self, Self::Error> {
		value.build()
	}
}

/// Builder for [`CredentialConfig`] values.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialConfigBuilder {
	/// Identity-platform base URL; defaults to the public cloud.
	pub authority: Option<String>,
	/// Tenant (`common`, a GUID, or a verified domain); defaults to `common`.
	pub tenant: Option<String>,
	/// Application (client) identifier.
	pub client_id: Option<String>,
	/// Confidential client secret.
	pub client_secret: Option<TokenSecret>,
	/// Redirect URI registered for the application.
	pub redirect_uri: Option<String>,
	/// Delegated permissions to request.
	pub scopes: Vec<String>,
	/// Exchange timeout; defaults to [`DEFAULT_EXCHANGE_TIMEOUT`].
	#[serde(rename = "exchange_timeout_secs", deserialize_with = "deserialize_seconds")]
	pub exchange_timeout: Option<Duration>,
	/// Handling of refresh responses that omit a refresh token.
	pub refresh_token_policy: RefreshTokenPolicy,
}
impl CredentialConfigBuilder {
	/// Overrides the authority URL.
	pub fn authority(mut self, authority: impl Into<String>) -> Self {
		self.authority = Some(authority.into());

		self
	}

	/// Sets the tenant.
	pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
		self.tenant = Some(tenant.into());

		self
	}

	/// Sets the application (client) identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Sets the redirect URI.
	pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
		self.redirect_uri = Some(redirect_uri.into());

		self
	}

	/// Adds a single scope.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scopes.push(scope.into());

		self
	}

	/// Adds multiple scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Overrides the exchange timeout.
	pub fn exchange_timeout(mut self, timeout: Duration) -> Self {
		self.exchange_timeout = Some(timeout);

		self
	}

	/// Overrides the refresh-token policy.
	pub fn refresh_token_policy(mut self, policy: RefreshTokenPolicy) -> Self {
		self.refresh_token_policy = policy;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<CredentialConfig, ConfigError> {
		let authority = Authority::parse(self.authority.as_deref().unwrap_or(DEFAULT_AUTHORITY))?;
		let tenant = match self.tenant.as_deref() {
			Some(raw) => Tenant::from_str(raw)?,
			None => Tenant::Common,
		};
		let client_id =
			ClientId::new(self.client_id.ok_or(ConfigError::MissingField { field: "client_id" })?)?;
		let client_secret = self
			.client_secret
			.filter(|secret| !secret.is_empty())
			.ok_or(ConfigError::MissingField { field: "client_secret" })?;
		let redirect_uri = parse_redirect_uri(
			self.redirect_uri.as_deref().ok_or(ConfigError::MissingField { field: "redirect_uri" })?,
		)?;
		let scopes = ScopeSet::new(self.scopes)?;

		if scopes.is_empty() {
			return Err(ConfigError::MissingField { field: "scopes" });
		}

		let exchange_timeout = self.exchange_timeout.unwrap_or(DEFAULT_EXCHANGE_TIMEOUT);

		if !exchange_timeout.is_positive() {
			return Err(ConfigError::NonPositiveTimeout);
		}

		Ok(CredentialConfig {
			authority,
			tenant,
			client_id,
			client_secret,
			redirect_uri,
			scopes,
			exchange_timeout,
			refresh_token_policy: self.refresh_token_policy,
		})
	}
}

fn parse_redirect_uri(raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|source| ConfigError::InvalidRedirect { source })?;

	match url.scheme() {
		"http" | "https" => Ok(url),
		_ => Err(ConfigError::UnsupportedRedirect { url: url.to_string() }),
	}
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(<Option<i64>>::deserialize(deserializer)?.map(Duration::seconds))
}
