//! Bearer-credential lifecycle for Microsoft identity platform clients: authorization-code
//! exchange, single-flight refresh, and a race-free token store in one crate.
//!
//! The entry point is [`controller::CredentialController`]. Build a
//! [`config::CredentialConfig`], send the user to the URL produced by
//! [`controller::CredentialController::start_authorization`], hand the returned code to
//! [`controller::CredentialController::initialize_from_authorization_code`], and call
//! [`controller::CredentialController::ensure_valid_token`] before every API request.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod authority;
pub mod authorize;
pub mod config;
pub mod controller;
pub mod error;
pub mod exchange;
pub mod http;
pub mod obs;
pub mod redirect;
pub mod store;

mod _prelude {
	pub use std::{
		collections::HashSet,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
