//! Race-free storage for the controller's single [`Credential`].
//!
//! Readers take cheap snapshots at any time. Writers must first enter the store's exclusive
//! section; the section guard is the only handle that can mutate the credential, and every
//! write replaces the whole credential so token and expiry never come from different
//! exchanges.

// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
};

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The stored refresh token matched and the credential was replaced.
	Updated,
	/// The stored refresh token differed; nothing was written.
	RefreshMismatch,
}

/// Shared credential cache guarded by one exclusive section.
#[derive(Clone, Default)]
pub struct TokenStore {
	credential: Arc<RwLock<Credential>>,
	section: Arc<AsyncMutex<()>>,
}
impl TokenStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store seeded with `credential`.
	pub fn with_credential(credential: Credential) -> Self {
		Self { credential: Arc::new(RwLock::new(credential)), section: Default::default() }
	}

	/// Snapshot of the current credential.
	///
	/// The snapshot may be superseded by a concurrent writer right after it is taken; only
	/// use it for validity checks and diagnostics.
	pub fn read(&self) -> Credential {
		self.credential.read().clone()
	}

	/// Whether a bearer token is cached and still valid at `now`.
	pub fn is_valid(&self, now: OffsetDateTime) -> bool {
		self.credential.read().is_valid_at(now)
	}

	/// Cached bearer token if it is still valid at `now`.
	pub fn valid_access_token(&self, now: OffsetDateTime) -> Option<TokenSecret> {
		self.credential.read().valid_access_token(now).cloned()
	}

	/// Waits for and enters the exclusive section.
	pub async fn lock(&self) -> ExclusiveSection {
		let guard = self.section.lock_arc().await;

		ExclusiveSection { credential: self.credential.clone(), _guard: guard }
	}

	/// Enters the exclusive section only if nobody else holds it.
	pub fn try_lock(&self) -> Option<ExclusiveSection> {
		let guard = self.section.try_lock_arc()?;

		Some(ExclusiveSection { credential: self.credential.clone(), _guard: guard })
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenStore").field("credential", &*self.credential.read()).finish()
	}
}

/// Owned guard over the store's exclusive section.
///
/// Dropping the guard leaves the section, whichever way the holder exits.
pub struct ExclusiveSection {
	credential: Arc<RwLock<Credential>>,
	_guard: MutexGuardArc<()>,
}
impl ExclusiveSection {
	/// Current credential. No other writer can change it while the section is held.
	pub fn read(&self) -> Credential {
		self.credential.read().clone()
	}

	/// Re-validates the cached token under the section.
	pub fn is_valid(&self, now: OffsetDateTime) -> bool {
		self.credential.read().is_valid_at(now)
	}

	/// Cached bearer token if it is still valid at `now`.
	pub fn valid_access_token(&self, now: OffsetDateTime) -> Option<TokenSecret> {
		self.credential.read().valid_access_token(now).cloned()
	}

	/// Replaces the credential if its refresh token still equals `expected_refresh`.
	pub fn compare_and_swap(
		&mut self,
		expected_refresh: Option<&TokenSecret>,
		replacement: Credential,
	) -> CompareAndSwapOutcome {
		let mut credential = self.credential.write();

		if credential.refresh_token.as_ref() != expected_refresh {
			return CompareAndSwapOutcome::RefreshMismatch;
		}

		*credential = replacement;

		CompareAndSwapOutcome::Updated
	}

	/// Replaces the credential unconditionally and returns the previous one.
	pub fn replace(&mut self, replacement: Credential) -> Credential {
		std::mem::replace(&mut *self.credential.write(), replacement)
	}
}
impl Debug for ExclusiveSection {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExclusiveSection").field("credential", &*self.credential.read()).finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::auth::AccessToken;

	const NOW: OffsetDateTime = datetime!(2025-03-01 12:00 UTC);

	fn credential(token: &str, refresh: &str, expires_in: Duration) -> Credential {
		Credential::new(
			AccessToken::new(TokenSecret::new(token), NOW, expires_in),
			Some(TokenSecret::new(refresh)),
		)
	}

	#[test]
	fn validity_is_strict_at_expiry() {
		let store = TokenStore::with_credential(credential("tok1", "r1", Duration::hours(1)));

		assert!(store.is_valid(NOW));
		assert_eq!(
			store.valid_access_token(datetime!(2025-03-01 12:59:59 UTC)),
			Some(TokenSecret::new("tok1"))
		);
		assert!(!store.is_valid(datetime!(2025-03-01 13:00 UTC)));
		assert!(!TokenStore::new().is_valid(NOW));
	}

	#[tokio::test]
	async fn compare_and_swap_requires_matching_refresh_token() {
		let store = TokenStore::with_credential(credential("tok1", "r1", Duration::hours(1)));
		let mut section = store.lock().await;
		let outcome = section.compare_and_swap(
			Some(&TokenSecret::new("other")),
			credential("tok2", "r2", Duration::hours(2)),
		);

		assert_eq!(outcome, CompareAndSwapOutcome::RefreshMismatch);
		assert_eq!(store.read().refresh_token, Some(TokenSecret::new("r1")));

		let outcome = section.compare_and_swap(
			Some(&TokenSecret::new("r1")),
			credential("tok2", "r2", Duration::hours(2)),
		);

		assert_eq!(outcome, CompareAndSwapOutcome::Updated);
		assert_eq!(store.valid_access_token(NOW), Some(TokenSecret::new("tok2")));
		assert_eq!(store.read().refresh_token, Some(TokenSecret::new("r2")));
	}

	#[tokio::test]
	async fn section_is_exclusive_until_dropped() {
		let store = TokenStore::new();
		let mut section = store.lock().await;

		assert!(store.try_lock().is_none());

		let previous = section.replace(credential("tok1", "r1", Duration::hours(1)));

		assert!(previous.is_empty());
		assert!(store.is_valid(NOW));

		drop(section);

		assert!(store.try_lock().is_some());
	}

	#[test]
	fn compare_and_swap_outcome_can_be_serialized() {
		let payload = serde_json::to_string(&CompareAndSwapOutcome::Updated)
			.expect("CompareAndSwapOutcome should serialize to JSON.");

		assert_eq!(payload, "\"Updated\"");

		let round_trip: CompareAndSwapOutcome = serde_json::from_str(&payload)
			.expect("Serialized outcome should deserialize from JSON.");

		assert_eq!(round_trip, CompareAndSwapOutcome::Updated);
	}
}
