//! Token endpoint exchanges for the authorization-code and refresh-token grants.
//!
//! [`GrantExchanger`] is stateless apart from its configuration: each call builds a form
//! request, sends it through a [`TokenHttpClient`] handle under the configured timeout, and
//! decodes the answer into an [`ExchangeResponse`]. It never retries; retry policy belongs
//! to the caller.

mod form;
mod response;

pub use response::ExchangeResponse;

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError};
// self
use crate::{
	_prelude::*,
	auth::{AuthorizationGrant, ClientId, Tenant, TokenSecret},
	authority::Authority,
	config::{CredentialConfig, DEFAULT_EXCHANGE_TIMEOUT, RefreshTokenPolicy},
	error::TransportError,
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, http::ReqwestHttpClient};
use form::TokenForm;
use response::RawResponse;

/// Boxed future returned by [`GrantExchanger`] calls.
pub type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// OAuth 2.0 grant types sent to the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant.
	AuthorizationCode,
	/// Refresh Token grant.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(*inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) =>
				TransportError::Other { message, status: meta.and_then(|meta| meta.status) }
					.into(),
			_ => TransportError::Other {
				message: "unclassified HTTP client failure".into(),
				status: meta.and_then(|meta| meta.status),
			}
			.into(),
		}
	}
}

/// Performs authorization-code and refresh-token exchanges against one authority.
pub struct GrantExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	mapper: Arc<M>,
	authority: Authority,
	timeout: Duration,
	refresh_token_policy: RefreshTokenPolicy,
}
impl<C, M> GrantExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an exchanger with the default timeout and a strict refresh-token policy.
	pub fn new(
		authority: Authority,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			mapper: mapper.into(),
			authority,
			timeout: DEFAULT_EXCHANGE_TIMEOUT,
			refresh_token_policy: RefreshTokenPolicy::default(),
		}
	}

	/// Creates an exchanger using the authority, timeout, and policy from `config`.
	pub fn from_config(
		config: &CredentialConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self::new(config.authority.clone(), http_client, mapper)
			.with_timeout(config.exchange_timeout)
			.with_refresh_token_policy(config.refresh_token_policy)
	}

	/// Overrides the per-exchange timeout. Non-positive values are ignored.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		if timeout.is_positive() {
			self.timeout = timeout;
		}

		self
	}

	/// Overrides the refresh-token policy.
	pub fn with_refresh_token_policy(mut self, policy: RefreshTokenPolicy) -> Self {
		self.refresh_token_policy = policy;

		self
	}

	/// Authority the exchanger talks to.
	pub fn authority(&self) -> &Authority {
		&self.authority
	}

	/// Exchanges an authorization code (`grant_type=authorization_code`).
	///
	/// The response must carry an access token, a positive lifetime, and a refresh token.
	pub fn exchange_authorization_code<'a>(
		&'a self,
		tenant: &'a Tenant,
		client_id: &'a ClientId,
		client_secret: &'a TokenSecret,
		grant: &'a AuthorizationGrant,
		redirect_uri: &'a Url,
	) -> ExchangeFuture<'a, ExchangeResponse> {
		let form = TokenForm::authorization_code(client_id, client_secret, grant, redirect_uri);

		self.execute(tenant, form, None)
	}

	/// Exchanges a refresh token (`grant_type=refresh_token`).
	///
	/// Under [`RefreshTokenPolicy::KeepPrevious`] a response without a refresh token reuses
	/// `refresh_token`; otherwise the omission is an error.
	pub fn exchange_refresh_token<'a>(
		&'a self,
		tenant: &'a Tenant,
		client_id: &'a ClientId,
		client_secret: &'a TokenSecret,
		refresh_token: &'a TokenSecret,
	) -> ExchangeFuture<'a, ExchangeResponse> {
		let form = TokenForm::refresh_token(client_id, client_secret, refresh_token);
		let fallback = match self.refresh_token_policy {
			RefreshTokenPolicy::Required => None,
			RefreshTokenPolicy::KeepPrevious => Some(refresh_token),
		};

		self.execute(tenant, form, fallback)
	}

	fn execute<'a>(
		&'a self,
		tenant: &'a Tenant,
		form: TokenForm,
		fallback_refresh: Option<&'a TokenSecret>,
	) -> ExchangeFuture<'a, ExchangeResponse> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let grant = form.grant();
			let request = form.into_request(&self.authority.token_endpoint(tenant)?)?;
			let handle = self.http_client.with_metadata(meta.clone());
			let response =
				match tokio::time::timeout(self.timeout.unsigned_abs(), handle.call(request)).await {
					Ok(Ok(response)) => response,
					Ok(Err(err)) =>
						return Err(self.mapper.map_transport_error(grant, meta.take().as_ref(), err)),
					Err(_) => return Err(TransportError::Timeout { after: Some(self.timeout) }.into()),
				};
			let retry_after = meta.take().and_then(|meta| meta.retry_after);
			let raw = RawResponse {
				body: response.body(),
				status: response.status().as_u16(),
				retry_after,
			};

			response::decode(raw, OffsetDateTime::now_utc(), fallback_refresh)
		})
	}
}
#[cfg(feature = "reqwest")]
impl GrantExchanger<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a reqwest-backed exchanger for `config`.
	pub fn reqwest(config: &CredentialConfig) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::for_token_endpoint(config.exchange_timeout)?;

		Ok(Self::from_config(config, http_client, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Debug for GrantExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GrantExchanger")
			.field("authority", &self.authority)
			.field("timeout", &self.timeout)
			.field("refresh_token_policy", &self.refresh_token_policy)
			.finish()
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout { after: None }.into();
	}

	TransportError::from(err).into()
}
