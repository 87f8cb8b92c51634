//! Signs in against the Microsoft identity platform with the browser flow and keeps the
//! resulting credential fresh.
//!
//! ```sh
//! MSGRAPH_CLIENT_ID=... MSGRAPH_CLIENT_SECRET=... MSGRAPH_TENANT=contoso.onmicrosoft.com \
//!     cargo run --example graph_login
//! ```
//!
//! The application registration must list `http://localhost:8400/login` as a redirect URI.

// std
use std::env;
// crates.io
use color_eyre::{Result, eyre::WrapErr};
// self
use msgraph_credential::{
	authorize::AuthorizationSession,
	config::CredentialConfig,
	controller::ReqwestCredentialController,
	redirect::RedirectListener,
	reqwest::Client,
};

const REDIRECT_URI: &str = "http://localhost:8400/login";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = CredentialConfig::builder()
		.tenant(env::var("MSGRAPH_TENANT").unwrap_or_else(|_| "common".into()))
		.client_id(env::var("MSGRAPH_CLIENT_ID").wrap_err("MSGRAPH_CLIENT_ID is not set")?)
		.client_secret(
			env::var("MSGRAPH_CLIENT_SECRET").wrap_err("MSGRAPH_CLIENT_SECRET is not set")?,
		)
		.redirect_uri(REDIRECT_URI)
		.scopes(["offline_access", "User.Read"])
		.build()?;
	let listener = RedirectListener::bind(&config.redirect_uri).await?;
	let controller = ReqwestCredentialController::new(config)?;
	let session: AuthorizationSession = controller.start_authorization()?;

	println!("Open this URL in a browser to sign in:\n\n{}\n", session.authorize_url);
	println!("Waiting for the redirect on {} ...", listener.redirect_uri());

	let grant = listener.accept(&session.state).await?;
	let credential = controller.initialize_from_authorization_code(grant).await?;

	println!("Signed in; access token expires at {:?}.", credential.expires_at());

	let response = controller
		.authorize_request(Client::new().get("https://graph.microsoft.com/v1.0/me"))
		.await?
		.send()
		.await?;

	println!("GET /me -> {}", response.status());
	println!("{}", response.text().await?);

	let token = controller.refresh().await?;

	println!(
		"Forced a refresh; the new token is {} characters long. State: {}.",
		token.expose().len(),
		controller.state()
	);

	Ok(())
}
