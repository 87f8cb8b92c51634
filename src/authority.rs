//! Identity-platform authority and the per-tenant endpoints derived from it.

// std
use std::net::IpAddr;
// crates.io
use url::Host;
// self
use crate::{_prelude::*, auth::Tenant, error::ConfigError};

/// Public-cloud authority used when none is configured.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Base URL of the identity platform (e.g. `https://login.microsoftonline.com`).
///
/// Endpoints are derived as `<authority>/<tenant>/oauth2/v2.0/{authorize,token}`. HTTPS is
/// required; plain HTTP is only accepted for loopback hosts so local test servers work.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Authority(Url);
impl Authority {
	/// Parses and validates an authority URL.
	pub fn parse(raw: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(raw).map_err(|source| ConfigError::InvalidAuthority { source })?;

		Self::from_url(url)
	}

	/// The public-cloud authority.
	pub fn public_cloud() -> Result<Self, ConfigError> {
		Self::parse(DEFAULT_AUTHORITY)
	}

	/// Validates an already parsed authority URL.
	pub fn from_url(url: Url) -> Result<Self, ConfigError> {
		let refuse =
			|reason| Err(ConfigError::UnsupportedAuthority { url: url.to_string(), reason });

		if url.cannot_be_a_base() {
			return refuse("the URL cannot carry a path");
		}
		if url.query().is_some() || url.fragment().is_some() {
			return refuse("the URL must not carry a query or fragment");
		}

		match url.scheme() {
			"https" => {},
			"http" if is_loopback(&url) => {},
			_ => return refuse("HTTPS is required for non-loopback hosts"),
		}

		Ok(Self(url))
	}

	/// Underlying URL.
	pub fn as_url(&self) -> &Url {
		&self.0
	}

	/// `<authority>/<tenant>/oauth2/v2.0/authorize`.
	pub fn authorize_endpoint(&self, tenant: &Tenant) -> Result<Url, ConfigError> {
		self.endpoint(tenant, "authorize")
	}

	/// `<authority>/<tenant>/oauth2/v2.0/token`.
	pub fn token_endpoint(&self, tenant: &Tenant) -> Result<Url, ConfigError> {
		self.endpoint(tenant, "token")
	}

	fn endpoint(&self, tenant: &Tenant, leaf: &str) -> Result<Url, ConfigError> {
		let mut url = self.0.clone();

		url.path_segments_mut()
			.map_err(|_| ConfigError::UnsupportedAuthority {
				url: self.0.to_string(),
				reason: "the URL cannot carry a path",
			})?
			.pop_if_empty()
			.extend([tenant.as_str(), "oauth2", "v2.0", leaf]);

		Ok(url)
	}
}
impl TryFrom<String> for Authority {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(&value)
	}
}
impl From<Authority> for String {
	fn from(value: Authority) -> Self {
		value.0.into()
	}
}
impl Debug for Authority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Authority({})", self.0)
	}
}
impl Display for Authority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}

/// Returns `true` when the URL points at `localhost` or a loopback address.
pub(crate) fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
		Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
		None => false,
	}
}
