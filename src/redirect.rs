//! Authorization redirect capture.
//!
//! [`parse_redirect_query`] turns the query string of a redirect into an
//! [`AuthorizationGrant`]. [`RedirectListener`] owns a loopback socket for a single flow and
//! answers the browser itself, so no process-wide server state is involved.
//!
//! Every connection is served on its own task with a bounded read, so an idle socket (such as
//! a browser preconnect) cannot hold up the redirect arriving on another one.

// std
use std::{
	net::{IpAddr, Ipv4Addr, SocketAddr},
	time::Duration as StdDuration,
};
// crates.io
use tokio::{
	io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
	net::{TcpListener, TcpStream},
	task::JoinSet,
};
use url::{Host, form_urlencoded};
// self
use crate::{
	_prelude::*,
	auth::AuthorizationGrant,
	authority,
	error::{AuthorizationError, ConfigError, TransportError},
};

const SUCCESS_PAGE: &str = "Authorization done. You may close this window now.";
const FAILURE_PAGE: &str = "Authorization failed. Return to the application for details.";
// Time a single connection gets to deliver its request head.
const CONNECTION_TIMEOUT: StdDuration = StdDuration::from_secs(10);
// Request line plus headers.
const MAX_REQUEST_HEAD_BYTES: u64 = 16 * 1024;

type Served = Option<Result<AuthorizationGrant, AuthorizationError>>;

/// Extracts the grant from a redirect query string.
///
/// Checks run in a fixed order: an `error` parameter wins, then `state` must be present and
/// equal to `expected_state`, then `code` must be present.
pub fn parse_redirect_query(
	query: &str,
	expected_state: &str,
) -> Result<AuthorizationGrant, AuthorizationError> {
	let mut code = None;
	let mut state = None;
	let mut error = None;
	let mut description = None;

	for (key, value) in form_urlencoded::parse(query.as_bytes()) {
		let slot = match key.as_ref() {
			"code" => &mut code,
			"state" => &mut state,
			"error" => &mut error,
			"error_description" => &mut description,
			_ => continue,
		};

		if slot.is_none() {
			*slot = Some(value.into_owned());
		}
	}

	if let Some(error) = error {
		return Err(AuthorizationError::Denied { error, description });
	}

	match state {
		None => return Err(AuthorizationError::MissingState),
		Some(state) if state != expected_state => return Err(AuthorizationError::StateMismatch),
		Some(_) => {},
	}

	AuthorizationGrant::new(code.unwrap_or_default())
}

/// Loopback HTTP listener that waits for one authorization redirect.
#[derive(Debug)]
pub struct RedirectListener {
	listener: TcpListener,
	redirect_uri: Url,
}
impl RedirectListener {
	/// Binds the host and port named by `redirect_uri`.
	///
	/// Only `http` URIs on `localhost`, `127.0.0.1`, or `::1` are accepted. Port `0` binds an
	/// ephemeral port and [`redirect_uri`](Self::redirect_uri) reports the actual one.
	pub async fn bind(redirect_uri: &Url) -> Result<Self> {
		let refuse = || AuthorizationError::NonLoopbackRedirect { url: redirect_uri.to_string() };

		if redirect_uri.scheme() != "http" || !authority::is_loopback(redirect_uri) {
			return Err(refuse().into());
		}

		let ip = match redirect_uri.host() {
			Some(Host::Ipv4(ip)) => IpAddr::V4(ip),
			Some(Host::Ipv6(ip)) => IpAddr::V6(ip),
			_ => IpAddr::V4(Ipv4Addr::LOCALHOST),
		};
		let port = redirect_uri.port_or_known_default().ok_or_else(refuse)?;
		let listener =
			TcpListener::bind(SocketAddr::new(ip, port)).await.map_err(TransportError::Io)?;
		let mut redirect_uri = redirect_uri.clone();

		if port == 0 {
			let actual = listener.local_addr().map_err(TransportError::Io)?.port();

			if redirect_uri.set_port(Some(actual)).is_err() {
				return Err(ConfigError::UnsupportedRedirect { url: redirect_uri.to_string() }.into());
			}
		}

		Ok(Self { listener, redirect_uri })
	}

	/// Redirect URI to register with the authorization request.
	pub fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	/// Address the listener is bound to.
	pub fn local_addr(&self) -> Result<SocketAddr> {
		Ok(self.listener.local_addr().map_err(TransportError::Io)?)
	}

	/// Serves connections until the redirect arrives and returns its grant.
	///
	/// Requests for other paths get a 404 and the listener keeps waiting, as do connections
	/// that fail or stay silent. The browser always receives a short plain-text page once the
	/// redirect is handled. Wrap the call in a timeout to bound the whole sign-in.
	pub async fn accept(self, expected_state: &str) -> Result<AuthorizationGrant> {
		let path: Arc<str> = self.redirect_uri.path().into();
		let expected_state: Arc<str> = expected_state.into();
		let mut connections = JoinSet::new();

		loop {
			tokio::select! {
				accepted = self.listener.accept() => {
					let (stream, _) = accepted.map_err(TransportError::Io)?;

					connections.spawn(serve_bounded(stream, path.clone(), expected_state.clone()));
				},
				Some(served) = connections.join_next() => {
					if let Ok(Some(outcome)) = served {
						return Ok(outcome?);
					}
				},
			}
		}
	}
}

async fn serve_bounded(stream: TcpStream, path: Arc<str>, expected_state: Arc<str>) -> Served {
	match tokio::time::timeout(CONNECTION_TIMEOUT, serve(stream, &path, &expected_state)).await {
		Ok(Ok(served)) => served,
		Ok(Err(_err)) => {
			#[cfg(feature = "tracing")]
			tracing::debug!(error = %_err, "redirect connection failed");

			None
		},
		Err(_) => {
			#[cfg(feature = "tracing")]
			tracing::debug!("redirect connection timed out");

			None
		},
	}
}

async fn serve(
	mut stream: TcpStream,
	path: &str,
	expected_state: &str,
) -> std::io::Result<Served> {
	let mut request_line = String::new();

	{
		let mut reader = BufReader::new((&mut stream).take(MAX_REQUEST_HEAD_BYTES));

		if reader.read_line(&mut request_line).await? == 0 {
			return Ok(None);
		}

		loop {
			let mut header = String::new();

			if reader.read_line(&mut header).await? == 0 || header.trim_end().is_empty() {
				break;
			}
		}
	}

	let mut parts = request_line.split_whitespace();
	let (true, Some(method), Some(target)) =
		(request_line.ends_with('\n'), parts.next(), parts.next())
	else {
		respond(&mut stream, "400 Bad Request", "Malformed request.").await?;

		return Ok(None);
	};
	let (target_path, query) = target.split_once('?').unwrap_or((target, ""));

	if target_path != path {
		respond(&mut stream, "404 Not Found", "Not found.").await?;

		return Ok(None);
	}

	let outcome = if method.eq_ignore_ascii_case("GET") {
		parse_redirect_query(query, expected_state)
	} else {
		Err(AuthorizationError::InvalidRequest { reason: format!("unexpected method {method}") })
	};
	let page = match &outcome {
		Ok(_) => SUCCESS_PAGE,
		Err(_err) => {
			#[cfg(feature = "tracing")]
			tracing::warn!(error = %_err, "authorization redirect rejected");

			FAILURE_PAGE
		},
	};

	respond(&mut stream, "200 OK", page).await?;

	Ok(Some(outcome))
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
	let response = format!(
		"HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
		body.len()
	);

	stream.write_all(response.as_bytes()).await?;
	stream.shutdown().await
}
