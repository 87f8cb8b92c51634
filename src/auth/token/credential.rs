//! The cached bearer credential and its validity rules.
//!
//! An [`AccessToken`] always carries its own expiry so a token can never be paired with
//! the expiry of a different exchange. A [`Credential`] with no access token has never been
//! authorized; one without a refresh token cannot be renewed without user interaction.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Lifecycle status of the cached access token at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// No access token has been obtained.
	Missing,
	/// Token is usable.
	Active,
	/// Token reached its expiry instant.
	Expired,
}

/// Bearer access token bundled with the instants it was issued and expires at.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
	/// Bearer secret sent in the `Authorization` header.
	pub secret: TokenSecret,
	/// Instant the exchange response was processed.
	pub issued_at: OffsetDateTime,
	/// First instant at which the token is no longer valid.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Creates a token that expires `expires_in` after `issued_at`.
	///
	/// An expiry beyond the representable range is clamped to the latest instant.
	pub fn new(secret: TokenSecret, issued_at: OffsetDateTime, expires_in: Duration) -> Self {
		Self { secret, issued_at, expires_at: issued_at.saturating_add(expires_in) }
	}

	/// Status at `now`; the expiry instant itself is already expired.
	pub fn status_at(&self, now: OffsetDateTime) -> TokenStatus {
		if now < self.expires_at { TokenStatus::Active } else { TokenStatus::Expired }
	}

	/// Returns `true` if the token is usable at `now`.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		matches!(self.status_at(now), TokenStatus::Active)
	}

	/// Time left before expiry, clamped at zero.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - now;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("secret", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Access token plus the refresh token used to renew it.
///
/// Values handed out by the token store are snapshots; mutating one has no effect on the
/// cached credential.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Current access token, absent until the first successful exchange.
	pub access: Option<AccessToken>,
	/// Refresh token, absent when renewal is not possible.
	pub refresh_token: Option<TokenSecret>,
}
impl Credential {
	/// Creates a credential from an access token and an optional refresh token.
	pub fn new(access: AccessToken, refresh_token: Option<TokenSecret>) -> Self {
		Self { access: Some(access), refresh_token }
	}

	/// Creates a credential that only holds a refresh token, e.g. one restored from disk.
	pub fn from_refresh_token(refresh_token: TokenSecret) -> Self {
		Self { access: None, refresh_token: Some(refresh_token) }
	}

	/// Status of the access token at `now`.
	pub fn status_at(&self, now: OffsetDateTime) -> TokenStatus {
		self.access.as_ref().map_or(TokenStatus::Missing, |access| access.status_at(now))
	}

	/// Returns `true` if an access token exists and `now` is before its expiry.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		matches!(self.status_at(now), TokenStatus::Active)
	}

	/// Access token secret, only if it is still valid at `now`.
	pub fn valid_access_token(&self, now: OffsetDateTime) -> Option<&TokenSecret> {
		self.access.as_ref().filter(|access| access.is_valid_at(now)).map(|access| &access.secret)
	}

	/// Expiry instant of the current access token.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.access.as_ref().map(|access| access.expires_at)
	}

	/// Returns `true` until anything has been obtained or restored.
	pub fn is_empty(&self) -> bool {
		self.access.is_none() && self.refresh_token.is_none()
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access", &self.access)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn credential(expires_in: Duration) -> Credential {
		let issued_at = datetime!(2025-01-01 00:00 UTC);

		Credential::new(
			AccessToken::new(TokenSecret::new("tok1"), issued_at, expires_in),
			Some(TokenSecret::new("r1")),
		)
	}

	#[test]
	fn expiry_instant_itself_is_invalid() {
		let credential = credential(Duration::seconds(3600));
		let expires_at = datetime!(2025-01-01 01:00 UTC);

		assert_eq!(credential.expires_at(), Some(expires_at));
		assert!(credential.is_valid_at(expires_at - Duration::nanoseconds(1)));
		assert!(!credential.is_valid_at(expires_at));
		assert_eq!(credential.status_at(expires_at), TokenStatus::Expired);
		assert!(credential.valid_access_token(expires_at).is_none());
	}

	#[test]
	fn oversized_lifetime_clamps_instead_of_overflowing() {
		let issued_at = datetime!(2025-01-01 00:00 UTC);
		let access = AccessToken::new(TokenSecret::new("tok1"), issued_at, Duration::MAX);

		assert!(access.expires_at > issued_at);
		assert!(access.is_valid_at(datetime!(9000-01-01 00:00 UTC)));
	}

	#[test]
	fn empty_credential_is_missing() {
		let credential = Credential::default();

		assert!(credential.is_empty());
		assert_eq!(credential.status_at(OffsetDateTime::now_utc()), TokenStatus::Missing);
		assert!(!Credential::from_refresh_token(TokenSecret::new("r1")).is_empty());
	}

	#[test]
	fn remaining_time_clamps_at_zero() {
		let credential = credential(Duration::seconds(60));
		let access = credential.access.as_ref().expect("Fixture should carry an access token.");

		assert_eq!(access.remaining_at(datetime!(2025-01-01 00:00:30 UTC)), Duration::seconds(30));
		assert_eq!(access.remaining_at(datetime!(2025-01-01 02:00 UTC)), Duration::ZERO);
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let rendered = format!("{:?}", credential(Duration::seconds(60)));

		assert!(!rendered.contains("tok1"));
		assert!(!rendered.contains("r1\""));
		assert!(rendered.contains("<redacted>"));
	}

	#[test]
	fn credential_round_trips_through_json() {
		let original = credential(Duration::seconds(3600));
		let payload = serde_json::to_string(&original).expect("Credential should serialize.");
		let restored: Credential =
			serde_json::from_str(&payload).expect("Credential should deserialize.");

		assert_eq!(restored, original);
	}
}
