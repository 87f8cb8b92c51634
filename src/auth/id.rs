//! Strongly typed directory identifiers.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (tenant, client).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (tenant, client).
		kind: &'static str,
	},
	/// The identifier contains a path separator or query character.
	#[error("{kind} identifier contains a reserved URL character.")]
	ReservedCharacter {
		/// Kind of identifier (tenant, client).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (tenant, client).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { TenantId, "Directory (tenant) identifier, either a GUID or a verified domain.", "Tenant" }
def_id! { ClientId, "Application (client) identifier registered with the identity platform.", "Client" }

/// Tenant routing segment used in authorize and token endpoint paths.
///
/// [`Tenant::Common`] targets the tenant-agnostic `common` endpoint, which accepts work,
/// school, and personal accounts.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Tenant {
	/// The multi-tenant `common` endpoint.
	#[default]
	Common,
	/// A single directory.
	Specific(TenantId),
}
impl Tenant {
	/// Path segment of the tenant-agnostic endpoint.
	pub const COMMON: &'static str = "common";

	/// Returns the path segment used in endpoint URLs.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Common => Self::COMMON,
			Self::Specific(id) => id.as_ref(),
		}
	}
}
impl From<TenantId> for Tenant {
	fn from(value: TenantId) -> Self {
		if value.eq_ignore_ascii_case(Self::COMMON) { Self::Common } else { Self::Specific(value) }
	}
}
impl FromStr for Tenant {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		TenantId::new(s).map(Self::from)
	}
}
impl TryFrom<String> for Tenant {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		TenantId::try_from(value).map(Self::from)
	}
}
impl From<Tenant> for String {
	fn from(value: Tenant) -> Self {
		match value {
			Tenant::Common => Tenant::COMMON.into(),
			Tenant::Specific(id) => id.into(),
		}
	}
}
impl Debug for Tenant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Tenant({})", self.as_str())
	}
}
impl Display for Tenant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.contains(['/', '?', '#', '\\']) {
		return Err(IdentifierError::ReservedCharacter { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_path_characters() {
		assert!(TenantId::new(" contoso.onmicrosoft.com").is_err());
		assert!(TenantId::new("contoso/../common").is_err());
		assert!(ClientId::new("").is_err());

		let client = ClientId::new("6731de76-14a6-49ae-97bc-6eba6914391e")
			.expect("GUID client identifier should be valid.");

		assert_eq!(client.as_ref(), "6731de76-14a6-49ae-97bc-6eba6914391e");
		assert_eq!(format!("{client:?}"), "Client(6731de76-14a6-49ae-97bc-6eba6914391e)");
	}

	#[test]
	fn length_limit_is_enforced() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		TenantId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(matches!(TenantId::new(&too_long), Err(IdentifierError::TooLong { .. })));
	}

	#[test]
	fn tenant_parses_common_case_insensitively() {
		assert_eq!(Tenant::from_str("common").expect("common should parse."), Tenant::Common);
		assert_eq!(Tenant::from_str("Common").expect("Common should parse."), Tenant::Common);

		let tenant = Tenant::from_str("contoso.onmicrosoft.com")
			.expect("Domain tenant should parse successfully.");

		assert_eq!(tenant.as_str(), "contoso.onmicrosoft.com");
		assert!(matches!(tenant, Tenant::Specific(_)));
		assert_eq!(Tenant::default(), Tenant::Common);
	}

	#[test]
	fn tenant_serde_round_trip_enforces_validation() {
		let tenant: Tenant =
			serde_json::from_str("\"tenant-42\"").expect("Tenant should deserialize successfully.");

		assert_eq!(tenant.to_string(), "tenant-42");
		assert_eq!(
			serde_json::to_string(&Tenant::Common).expect("Tenant should serialize."),
			"\"common\""
		);
		assert!(serde_json::from_str::<Tenant>("\"with space\"").is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<ClientId, u8> = HashMap::from_iter([(
			ClientId::new("client-123").expect("Client used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("client-123"), Some(&7));
	}
}
