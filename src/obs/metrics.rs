// self
use crate::{
	controller::CredentialState,
	obs::{FlowKind, FlowOutcome},
};

/// Counts a flow outcome on the global `metrics` recorder, when the feature is enabled.
///
/// `reason` labels failures (see [`failure_reason`](crate::obs::failure_reason)); other
/// outcomes are recorded with `reason="none"`.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome, reason: Option<&'static str>) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"msgraph_credential_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str(),
			"reason" => reason.unwrap_or("none")
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome, reason);
	}
}

/// Counts a controller state change.
pub fn record_state_transition(from: CredentialState, to: CredentialState) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"msgraph_credential_state_transitions_total",
			"from" => from.as_str(),
			"to" => to.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (from, to);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_a_recorder_is_harmless() {
		record_flow_outcome(FlowKind::Refresh, FlowOutcome::Reused, None);
		record_flow_outcome(FlowKind::AuthorizationCode, FlowOutcome::Failure, Some("stale_grant"));
		record_state_transition(CredentialState::Refreshing, CredentialState::RefreshFailed);
	}
}
