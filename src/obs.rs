//! Optional observability for the credential lifecycle.
//!
//! # Feature Flags
//!
//! - `tracing` wraps every controller operation in a `msgraph_credential.flow` span. The span
//!   carries `flow` and `stage`, and is filled in with the final `outcome`, the failure
//!   `reason`, and the last `state` the controller moved to. State changes are also logged as
//!   debug events.
//! - `metrics` maintains two counters: `msgraph_credential_flow_total` labeled by `flow`,
//!   `outcome`, and `reason`, and `msgraph_credential_state_transitions_total` labeled by
//!   `from` and `to`.
//!
//! Without either feature the helpers compile to nothing.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, controller::CredentialState, error::TransportError};

/// Credential flows the controller runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization-code exchange.
	AuthorizationCode,
	/// Refresh-token exchange.
	Refresh,
}
impl FlowKind {
	/// Stable label for span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Refresh => "refresh",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded per flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// An exchange is about to be sent.
	Attempt,
	/// The exchange produced a credential.
	Success,
	/// A caller waiting for the exclusive section found a token refreshed by someone else.
	Reused,
	/// The operation failed and the error went back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Stable label for span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Reused => "reused",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Low-cardinality label describing why a flow failed.
pub fn failure_reason(err: &Error) -> &'static str {
	match err {
		Error::Transport(TransportError::Timeout { .. }) => "timeout",
		Error::Transport(_) => "transport",
		Error::Upstream(rejection) => rejection.kind().as_str(),
		Error::MalformedResponse(_) => "malformed_response",
		Error::NoRefreshToken => "no_refresh_token",
		Error::NotAuthorized => "not_authorized",
		Error::StaleGrant => "stale_grant",
		Error::Config(_) => "config",
		Error::Authorization(_) => "authorization",
		Error::TaskAborted { .. } => "task_aborted",
	}
}

pub(crate) fn flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	record_flow_outcome(kind, outcome, None);
	trace_flow_outcome(outcome, None);
}

pub(crate) fn flow_failure(kind: FlowKind, err: &Error) {
	let reason = failure_reason(err);

	record_flow_outcome(kind, FlowOutcome::Failure, Some(reason));
	trace_flow_outcome(FlowOutcome::Failure, Some(reason));
}

pub(crate) fn state_transition(from: CredentialState, to: CredentialState) {
	record_state_transition(from, to);
	trace_state_transition(from, to);
}
