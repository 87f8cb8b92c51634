//! Crate-wide error types shared by the exchanger, the token store, and the controller.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, ScopeValidationError},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout, undecodable body).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The token endpoint answered with an OAuth `error` field.
	#[error(transparent)]
	Upstream(#[from] UpstreamRejection),
	/// The token endpoint answered without a field every success must carry.
	#[error(transparent)]
	MalformedResponse(#[from] MalformedResponseError),
	/// The authorization redirect did not yield a usable code.
	#[error(transparent)]
	Authorization(#[from] AuthorizationError),

	/// The cached token expired and no refresh token is cached.
	#[error("No refresh token is cached; the authorization flow must run again.")]
	NoRefreshToken,
	/// No credential has ever been obtained.
	#[error("No credential has been obtained yet.")]
	NotAuthorized,
	/// The authorization code was already submitted once.
	#[error("Authorization code has already been used.")]
	StaleGrant,
	/// The detached exchange task panicked or its runtime shut down.
	#[error("Credential exchange task did not run to completion.")]
	TaskAborted {
		/// Join failure reported by the runtime.
		#[source]
		source: tokio::task::JoinError,
	},
}
impl Error {
	/// Returns the upstream rejection carried by this error, if any.
	pub fn rejection(&self) -> Option<&UpstreamRejection> {
		match self {
			Self::Upstream(rejection) => Some(rejection),
			_ => None,
		}
	}

	/// Returns `true` for transport-level failures.
	pub fn is_transport(&self) -> bool {
		matches!(self, Self::Transport(_))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Authority URL cannot be parsed.
	#[error("Authority URL is invalid.")]
	InvalidAuthority {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Authority URL is not usable as a token endpoint base.
	#[error("Authority `{url}` is not supported: {reason}.")]
	UnsupportedAuthority {
		/// Offending authority.
		url: String,
		/// Why the authority was refused.
		reason: &'static str,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI uses a scheme browsers cannot be sent back to.
	#[error("Redirect URI `{url}` must use http or https.")]
	UnsupportedRedirect {
		/// Offending redirect URI.
		url: String,
	},
	/// A mandatory setting was not supplied.
	#[error("Missing required setting `{field}`.")]
	MissingField {
		/// Name of the absent setting.
		field: &'static str,
	},
	/// Tenant or client identifier failed validation.
	#[error("Identifier is invalid.")]
	InvalidIdentifier(#[from] IdentifierError),
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] ScopeValidationError),
	/// Exchange timeout must be strictly positive.
	#[error("The exchange timeout must be positive.")]
	NonPositiveTimeout,
	/// Configuration document could not be decoded.
	#[error("Configuration is invalid at `{}`.", .source.path())]
	Parse {
		/// Decoding failure including the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeouts, undecodable bodies).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred on a credential flow socket.")]
	Io(#[from] std::io::Error),
	/// The exchange did not complete within the configured bound.
	#[error("Token endpoint did not answer in time.")]
	Timeout {
		/// Bound that elapsed, when known.
		after: Option<Duration>,
	},
	/// The HTTP client failed without a more specific classification.
	#[error("HTTP client error occurred while calling the token endpoint: {message}.")]
	Other {
		/// Client-supplied message.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Response body is not a JSON object.
	#[error("Token endpoint returned a body that is not a JSON object.")]
	MalformedJson {
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
		/// HTTP status code of the response.
		status: Option<u16>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// HTTP status associated with the failure, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Other { status, .. } | Self::MalformedJson { status, .. } => *status,
			_ => None,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// OAuth error reported by the token endpoint.
///
/// The presence of `error` in the response body is what makes a response a rejection; the
/// HTTP status is kept for diagnostics only.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{error}: {}", .description.as_deref().unwrap_or("no description"))]
pub struct UpstreamRejection {
	/// OAuth `error` code (e.g. `invalid_grant`).
	pub error: String,
	/// OAuth `error_description`, when supplied.
	pub description: Option<String>,
	/// HTTP status code of the response.
	pub status: Option<u16>,
	/// Retry-After hint from upstream, if supplied.
	pub retry_after: Option<Duration>,
}
impl UpstreamRejection {
	/// Classifies the OAuth error code so callers can decide how to recover.
	pub fn kind(&self) -> RejectionKind {
		classify_oauth_error(&self.error)
			.or_else(|| self.description.as_deref().and_then(classify_description))
			.unwrap_or(RejectionKind::Other)
	}
}

/// Recovery-oriented classification of an [`UpstreamRejection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectionKind {
	/// Code or refresh token is no longer usable; restart the authorization flow.
	InvalidGrant,
	/// Client id or secret was refused.
	InvalidClient,
	/// Requested scopes were refused.
	InvalidScope,
	/// Temporary upstream condition; a later attempt may succeed.
	Transient,
	/// Anything else.
	Other,
}
impl RejectionKind {
	/// Stable label, e.g. for metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RejectionKind::InvalidGrant => "invalid_grant",
			RejectionKind::InvalidClient => "invalid_client",
			RejectionKind::InvalidScope => "invalid_scope",
			RejectionKind::Transient => "transient",
			RejectionKind::Other => "rejected",
		}
	}
}

/// Token endpoint success body missing a mandatory field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum MalformedResponseError {
	/// `access_token` absent or empty.
	#[error("No access token found in response.")]
	MissingAccessToken,
	/// `expires_in` absent, zero, or not a number.
	#[error("No token duration found in response.")]
	MissingExpiresIn,
	/// `refresh_token` absent or empty.
	#[error("No refresh token found in response.")]
	MissingRefreshToken,
	/// `expires_in` is negative or too large to represent.
	#[error("The expires_in value is outside the supported range.")]
	ExpiresInOutOfRange,
}

/// Failures while turning an authorization redirect into a grant.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthorizationError {
	/// The identity provider reported an error instead of a code.
	#[error("Authorization was denied: {error}: {}", .description.as_deref().unwrap_or("no description"))]
	Denied {
		/// OAuth `error` code from the redirect.
		error: String,
		/// OAuth `error_description` from the redirect.
		description: Option<String>,
	},
	/// Returned `state` differs from the one sent.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// Redirect carried no `state`.
	#[error("Authorization redirect is missing the state parameter.")]
	MissingState,
	/// Redirect carried no `code`.
	#[error("Authorization redirect is missing the code parameter.")]
	MissingCode,
	/// Browser request could not be understood.
	#[error("Redirect request is malformed: {reason}.")]
	InvalidRequest {
		/// What was wrong with the request.
		reason: String,
	},
	/// Redirect URI cannot be served by a local listener.
	#[error("Redirect URI `{url}` is not an http loopback address.")]
	NonLoopbackRedirect {
		/// Offending redirect URI.
		url: String,
	},
}

fn classify_oauth_error(value: &str) -> Option<RejectionKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(RejectionKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(RejectionKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope") {
		Some(RejectionKind::InvalidScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(RejectionKind::Transient)
	} else {
		None
	}
}

fn classify_description(description: &str) -> Option<RejectionKind> {
	let lowered = description.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(RejectionKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(RejectionKind::InvalidClient),
		text if text.contains("invalid_scope") => Some(RejectionKind::InvalidScope),
		text if text.contains("temporarily_unavailable") => Some(RejectionKind::Transient),
		_ => None,
	}
}
