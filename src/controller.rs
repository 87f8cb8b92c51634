//! Credential lifecycle orchestration with single-flight refresh.
//!
//! [`CredentialController`] owns one [`TokenStore`] and drives it through the states in
//! [`CredentialState`]. [`ensure_valid_token`](CredentialController::ensure_valid_token)
//! answers from a snapshot whenever the cached token is still valid. Otherwise the caller
//! joins a detached task that enters the store's exclusive section, re-checks validity, and
//! refreshes only if nobody has done so in the meantime. The exchange runs inside the section,
//! so concurrent callers queue behind a single request to the token endpoint; the exchange
//! timeout bounds how long they can wait.
//!
//! Because the section holder is a detached task, a caller that stops waiting never cancels
//! the exchange other callers depend on. The slow paths therefore need a Tokio runtime.

mod metrics;
mod state;

pub use metrics::RefreshMetrics;
pub use state::CredentialState;

// self
use crate::{
	_prelude::*,
	auth::{AuthorizationGrant, Credential, TokenSecret},
	authorize::AuthorizationSession,
	config::CredentialConfig,
	error::ConfigError,
	exchange::{GrantExchanger, TransportErrorMapper},
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{CompareAndSwapOutcome, ExclusiveSection, TokenStore},
};
#[cfg(feature = "reqwest")]
use crate::{exchange::ReqwestTransportErrorMapper, http::ReqwestHttpClient};

/// Controller wired to the reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestCredentialController =
	CredentialController<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Owns one credential and keeps it valid for any number of concurrent callers.
///
/// Clones share the same credential, state, and exclusive section.
pub struct CredentialController<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	inner: Arc<Inner<C, M>>,
}
impl<C, M> CredentialController<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a controller that talks to the token endpoint through `http_client`.
	pub fn with_http_client(
		config: CredentialConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let exchanger = GrantExchanger::from_config(&config, http_client, mapper);

		Self {
			inner: Arc::new(Inner {
				config,
				exchanger,
				store: TokenStore::new(),
				phase: Mutex::new(CredentialState::Unauthenticated),
				spent_grants: Mutex::new(HashSet::new()),
				refresh_metrics: RefreshMetrics::default(),
			}),
		}
	}

	/// Configuration the controller was built from.
	pub fn config(&self) -> &CredentialConfig {
		&self.inner.config
	}

	/// Lifecycle state as observed at `now`.
	pub fn state_at(&self, now: OffsetDateTime) -> CredentialState {
		let phase = *self.inner.phase.lock();

		phase.observed(self.inner.store.is_valid(now))
	}

	/// Lifecycle state as observed at the current instant.
	pub fn state(&self) -> CredentialState {
		self.state_at(OffsetDateTime::now_utc())
	}

	/// Read-only copy of the cached credential, e.g. for persisting the refresh token.
	///
	/// Never build an authenticated request from it; use
	/// [`ensure_valid_token`](Self::ensure_valid_token).
	pub fn snapshot(&self) -> Credential {
		self.inner.store.read()
	}

	/// Counters for the refresh path.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.inner.refresh_metrics
	}

	/// Prepares the browser step of the authorization-code flow with a fresh `state`.
	pub fn start_authorization(&self) -> Result<AuthorizationSession, ConfigError> {
		AuthorizationSession::new(&self.inner.config)
	}

	/// Exchanges an authorization code for the controller's first (or a replacement)
	/// credential.
	///
	/// A code is attempted at most once: resubmitting it fails with [`Error::StaleGrant`]
	/// before any network call, whatever the outcome of the first attempt. On failure the
	/// cached credential is left as it was.
	pub async fn initialize_from_authorization_code(
		&self,
		grant: AuthorizationGrant,
	) -> Result<Credential> {
		if !self.inner.spent_grants.lock().insert(grant.fingerprint()) {
			obs::flow_failure(FlowKind::AuthorizationCode, &Error::StaleGrant);

			return Err(Error::StaleGrant);
		}

		self.inner.transition(|phase| match phase {
			CredentialState::Unauthenticated => CredentialState::AwaitingExchange,
			phase => phase,
		});

		run_detached(
			FlowKind::AuthorizationCode,
			"initialize_from_authorization_code",
			self.inner.clone().exchange_code(grant),
		)
		.await
	}

	/// Returns a bearer token that is valid at `now`, refreshing it first if needed.
	///
	/// A valid cached token is returned without I/O or waiting. Otherwise at most one refresh
	/// exchange runs for all concurrent callers.
	pub async fn ensure_valid_token(&self, now: OffsetDateTime) -> Result<TokenSecret> {
		if let Some(token) = self.inner.store.valid_access_token(now) {
			return Ok(token);
		}

		let task = self.inner.clone().refresh_if_invalid(now);

		run_detached(FlowKind::Refresh, "ensure_valid_token", task).await
	}

	/// Refreshes the credential even if the cached token is still valid.
	pub async fn refresh(&self) -> Result<TokenSecret> {
		run_detached(FlowKind::Refresh, "refresh", self.inner.clone().refresh_now()).await
	}

	/// Seeds the controller with a previously persisted credential.
	///
	/// A credential holding only a refresh token is enough: the next
	/// [`ensure_valid_token`](Self::ensure_valid_token) call refreshes it.
	pub async fn restore(&self, credential: Credential) {
		let mut section = self.inner.store.lock().await;
		let phase = if credential.is_empty() {
			CredentialState::Unauthenticated
		} else {
			CredentialState::Authorized
		};

		section.replace(credential);
		self.inner.transition(|_| phase);
	}

	/// Attaches `Authorization: Bearer <token>` to `request`, refreshing the token first if
	/// needed.
	#[cfg(feature = "reqwest")]
	pub async fn authorize_request(
		&self,
		request: reqwest::RequestBuilder,
	) -> Result<reqwest::RequestBuilder> {
		let token = self.ensure_valid_token(OffsetDateTime::now_utc()).await?;

		Ok(request.bearer_auth(token.expose()))
	}
}
#[cfg(feature = "reqwest")]
impl CredentialController<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a controller backed by a reqwest client tuned for the token endpoint.
	pub fn new(config: CredentialConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::for_token_endpoint(config.exchange_timeout)?;

		Ok(Self::with_http_client(config, http_client, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Clone for CredentialController<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}
impl<C, M> Debug for CredentialController<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialController")
			.field("config", &self.inner.config)
			.field("exchanger", &self.inner.exchanger)
			.field("store", &self.inner.store)
			.field("phase", &*self.inner.phase.lock())
			.field("refresh_metrics", &self.inner.refresh_metrics)
			.finish()
	}
}

struct Inner<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: CredentialConfig,
	exchanger: GrantExchanger<C, M>,
	store: TokenStore,
	phase: Mutex<CredentialState>,
	// SHA-256 fingerprints of every code ever submitted.
	spent_grants: Mutex<HashSet<String>>,
	refresh_metrics: RefreshMetrics,
}
impl<C, M> Inner<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn transition(&self, next: impl FnOnce(CredentialState) -> CredentialState) {
		let (from, to) = {
			let mut phase = self.phase.lock();
			let from = *phase;

			*phase = next(from);

			(from, *phase)
		};

		if from != to {
			obs::state_transition(from, to);
		}
	}

	async fn exchange_code(self: Arc<Self>, grant: AuthorizationGrant) -> Result<Credential> {
		let mut section = self.store.lock().await;
		let config = &self.config;

		obs::flow_outcome(FlowKind::AuthorizationCode, FlowOutcome::Attempt);

		let response = match self
			.exchanger
			.exchange_authorization_code(
				&config.tenant,
				&config.client_id,
				&config.client_secret,
				&grant,
				&config.redirect_uri,
			)
			.await
		{
			Ok(response) => response,
			Err(err) => {
				obs::flow_failure(FlowKind::AuthorizationCode, &err);

				return Err(err);
			},
		};
		let credential = response.into_credential();

		section.replace(credential.clone());
		obs::flow_outcome(FlowKind::AuthorizationCode, FlowOutcome::Success);
		self.transition(|_| CredentialState::Authorized);

		Ok(credential)
	}

	async fn refresh_if_invalid(self: Arc<Self>, now: OffsetDateTime) -> Result<TokenSecret> {
		let mut section = self.store.lock().await;

		// Someone else may have refreshed while this caller waited for the section.
		if let Some(token) = section.valid_access_token(now) {
			self.refresh_metrics.record_reuse();
			obs::flow_outcome(FlowKind::Refresh, FlowOutcome::Reused);

			return Ok(token);
		}

		self.refresh_locked(&mut section).await
	}

	async fn refresh_now(self: Arc<Self>) -> Result<TokenSecret> {
		let mut section = self.store.lock().await;

		self.refresh_locked(&mut section).await
	}

	async fn refresh_locked(&self, section: &mut ExclusiveSection) -> Result<TokenSecret> {
		self.refresh_metrics.record_attempt();

		let current = section.read();
		let Some(refresh_token) = current.refresh_token else {
			let err =
				if current.access.is_none() { Error::NotAuthorized } else { Error::NoRefreshToken };

			self.refresh_metrics.record_failure();
			obs::flow_failure(FlowKind::Refresh, &err);

			return Err(err);
		};

		obs::flow_outcome(FlowKind::Refresh, FlowOutcome::Attempt);
		self.transition(|_| CredentialState::Refreshing);

		let config = &self.config;
		let response = match self
			.exchanger
			.exchange_refresh_token(
				&config.tenant,
				&config.client_id,
				&config.client_secret,
				&refresh_token,
			)
			.await
		{
			Ok(response) => response,
			Err(err) => {
				// A forced refresh can fail while the cached token is still usable.
				let next = if section.is_valid(OffsetDateTime::now_utc()) {
					CredentialState::Authorized
				} else {
					CredentialState::RefreshFailed
				};

				self.refresh_metrics.record_failure();
				obs::flow_failure(FlowKind::Refresh, &err);
				self.transition(|_| next);

				return Err(err);
			},
		};
		let token = response.access_token.clone();
		let outcome = section.compare_and_swap(Some(&refresh_token), response.into_credential());

		debug_assert_eq!(
			outcome,
			CompareAndSwapOutcome::Updated,
			"credential changed outside the exclusive section"
		);

		self.refresh_metrics.record_success();
		obs::flow_outcome(FlowKind::Refresh, FlowOutcome::Success);
		self.transition(|_| CredentialState::Authorized);

		Ok(token)
	}
}

async fn run_detached<T, F>(kind: FlowKind, stage: &'static str, task: F) -> Result<T>
where
	T: 'static + Send,
	F: 'static + Send + Future<Output = Result<T>>,
{
	let task = FlowSpan::new(kind, stage).instrument(task);

	match tokio::spawn(task).await {
		Ok(result) => result,
		Err(source) => {
			let err = Error::TaskAborted { source };

			obs::flow_failure(kind, &err);

			Err(err)
		},
	}
}
