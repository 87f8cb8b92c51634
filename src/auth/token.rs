//! Bearer credential models and the redacting secret wrapper.

pub mod credential;
pub mod secret;
