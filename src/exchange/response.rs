//! Token endpoint response decoding.
//!
//! The body must be a JSON object. Known fields are then read one by one: a field holding the
//! wrong JSON type counts as absent, so each omission maps to its own error. A body carrying a
//! string `error` is a rejection regardless of the HTTP status.

// crates.io
use serde_json::{Map, Number, Value};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credential, TokenSecret},
	error::{MalformedResponseError, TransportError, UpstreamRejection},
};

// Keeps `issued_at + expires_in` comfortably inside the representable date range.
const MAX_EXPIRES_IN_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Successful exchange result with its expiry fixed at decode time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeResponse {
	/// New bearer token.
	pub access_token: TokenSecret,
	/// Refresh token to use for the next renewal.
	pub refresh_token: TokenSecret,
	/// Lifetime reported by the token endpoint.
	pub expires_in: Duration,
	/// Instant the response was processed.
	pub issued_at: OffsetDateTime,
	/// `issued_at + expires_in`.
	pub expires_at: OffsetDateTime,
}
impl ExchangeResponse {
	/// Converts the response into the credential it represents.
	pub fn into_credential(self) -> Credential {
		Credential::new(
			AccessToken {
				secret: self.access_token,
				issued_at: self.issued_at,
				expires_at: self.expires_at,
			},
			Some(self.refresh_token),
		)
	}
}

/// Inputs describing the HTTP response being decoded.
pub(crate) struct RawResponse<'a> {
	pub(crate) body: &'a [u8],
	pub(crate) status: u16,
	pub(crate) retry_after: Option<Duration>,
}

/// Decodes a token endpoint response.
///
/// `fallback_refresh` is used when the body omits `refresh_token`; pass `None` to make the
/// refresh token mandatory.
pub(crate) fn decode(
	raw: RawResponse,
	now: OffsetDateTime,
	fallback_refresh: Option<&TokenSecret>,
) -> Result<ExchangeResponse> {
	let status = Some(raw.status);
	let body: Map<String, Value> = serde_json::from_slice(raw.body)
		.map_err(|source| TransportError::MalformedJson { source, status })?;

	if let Some(error) = string_field(&body, "error") {
		return Err(UpstreamRejection {
			error: error.to_owned(),
			description: string_field(&body, "error_description").map(ToOwned::to_owned),
			status,
			retry_after: raw.retry_after,
		}
		.into());
	}

	let access_token = secret_field(&body, "access_token")
		.ok_or(MalformedResponseError::MissingAccessToken)?;
	let expires_in = parse_expires_in(body.get("expires_in"))?;
	let refresh_token = secret_field(&body, "refresh_token")
		.or_else(|| fallback_refresh.cloned())
		.ok_or(MalformedResponseError::MissingRefreshToken)?;
	let expires_at =
		now.checked_add(expires_in).ok_or(MalformedResponseError::ExpiresInOutOfRange)?;

	Ok(ExchangeResponse { access_token, refresh_token, expires_in, issued_at: now, expires_at })
}

fn string_field<'a>(body: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
	body.get(name).and_then(Value::as_str)
}

fn secret_field(body: &Map<String, Value>, name: &str) -> Option<TokenSecret> {
	string_field(body, name).filter(|value| !value.is_empty()).map(TokenSecret::new)
}

fn parse_expires_in(value: Option<&Value>) -> Result<Duration, MalformedResponseError> {
	match value {
		Some(Value::Number(number)) => number_to_duration(number),
		_ => Err(MalformedResponseError::MissingExpiresIn),
	}
}

fn number_to_duration(number: &Number) -> Result<Duration, MalformedResponseError> {
	if let Some(secs) = number.as_i64() {
		return match secs {
			0 => Err(MalformedResponseError::MissingExpiresIn),
			secs if secs < 0 || secs > MAX_EXPIRES_IN_SECS =>
				Err(MalformedResponseError::ExpiresInOutOfRange),
			secs => Ok(Duration::seconds(secs)),
		};
	}
	if number.is_u64() {
		return Err(MalformedResponseError::ExpiresInOutOfRange);
	}

	match number.as_f64() {
		Some(secs) if secs == 0.0 => Err(MalformedResponseError::MissingExpiresIn),
		Some(secs) if secs.is_finite() && secs > 0.0 && secs <= MAX_EXPIRES_IN_SECS as f64 =>
			Ok(Duration::seconds_f64(secs)),
		_ => Err(MalformedResponseError::ExpiresInOutOfRange),
	}
}
