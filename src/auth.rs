//! Auth-domain identifiers, scope sets, grants, and credential models.

pub mod grant;
pub mod id;
pub mod scope;
pub mod token;

pub use grant::*;
pub use id::*;
pub use scope::*;
pub use token::{credential::*, secret::*};
