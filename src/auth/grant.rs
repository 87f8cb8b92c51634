//! Single-use authorization grants delivered by the browser redirect.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::TokenSecret, error::AuthorizationError};

/// Authorization code returned to the redirect URI.
///
/// A code may be submitted for exchange at most once. The controller remembers codes it
/// has attempted by [`fingerprint`](Self::fingerprint) only, so the codes themselves are
/// never retained.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
	code: TokenSecret,
}
impl AuthorizationGrant {
	/// Wraps a non-empty authorization code.
	pub fn new(code: impl Into<String>) -> Result<Self, AuthorizationError> {
		let code = TokenSecret::new(code);

		if code.is_empty() {
			return Err(AuthorizationError::MissingCode);
		}

		Ok(Self { code })
	}

	/// The authorization code.
	pub fn code(&self) -> &TokenSecret {
		&self.code
	}

	/// Stable SHA-256 digest (base64url, no padding) identifying this code.
	pub fn fingerprint(&self) -> String {
		let digest = Sha256::digest(self.code.expose().as_bytes());

		URL_SAFE_NO_PAD.encode(digest)
	}
}
impl Debug for AuthorizationGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationGrant").field("code", &self.code).finish()
	}
}
