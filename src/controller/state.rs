//! Lifecycle states reported by the controller.

// self
use crate::_prelude::*;

/// Where a controller is in the credential lifecycle.
///
/// ```text
/// Unauthenticated -> AwaitingExchange -> Authorized -> (Expiring <-> Refreshing) -> Authorized | RefreshFailed
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
	/// No authorization code has been submitted.
	#[default]
	Unauthenticated,
	/// A code was submitted and no credential has been obtained from it yet.
	AwaitingExchange,
	/// A valid credential is cached.
	Authorized,
	/// A credential is cached but its access token is no longer valid.
	///
	/// Never recorded; derived from [`Authorized`](Self::Authorized) at observation time.
	Expiring,
	/// A refresh exchange is in flight.
	Refreshing,
	/// The last refresh failed. The previous credential is kept and the next call retries.
	RefreshFailed,
}
impl CredentialState {
	/// Stable label for logs and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialState::Unauthenticated => "unauthenticated",
			CredentialState::AwaitingExchange => "awaiting_exchange",
			CredentialState::Authorized => "authorized",
			CredentialState::Expiring => "expiring",
			CredentialState::Refreshing => "refreshing",
			CredentialState::RefreshFailed => "refresh_failed",
		}
	}

	/// Whether a credential has been obtained at some point.
	pub const fn has_credential(self) -> bool {
		!matches!(self, CredentialState::Unauthenticated | CredentialState::AwaitingExchange)
	}

	pub(crate) fn observed(self, token_valid: bool) -> Self {
		match self {
			CredentialState::Authorized if !token_valid => CredentialState::Expiring,
			state => state,
		}
	}
}
impl Display for CredentialState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
