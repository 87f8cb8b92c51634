// self
use crate::{
	_prelude::*,
	controller::CredentialState,
	obs::{FlowKind, FlowOutcome},
};

/// Future type produced by [`FlowSpan::instrument`].
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future type produced by [`FlowSpan::instrument`].
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span attached to one controller operation.
///
/// `outcome`, `reason`, and `state` start empty and are filled in by the operation itself.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a span for `kind` at the given call-site `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"msgraph_credential.flow",
				flow = kind.as_str(),
				stage,
				outcome = tracing::field::Empty,
				reason = tracing::field::Empty,
				state = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Writes `outcome` (and the failure `reason`) onto the current flow span.
pub fn trace_flow_outcome(outcome: FlowOutcome, reason: Option<&'static str>) {
	#[cfg(feature = "tracing")]
	{
		let span = tracing::Span::current();

		span.record("outcome", outcome.as_str());

		if let Some(reason) = reason {
			span.record("reason", reason);
			tracing::warn!(reason, "credential flow failed");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (outcome, reason);
	}
}

/// Logs a controller state change and keeps the span's `state` field current.
pub fn trace_state_transition(from: CredentialState, to: CredentialState) {
	#[cfg(feature = "tracing")]
	{
		tracing::Span::current().record("state", to.as_str());
		tracing::debug!(from = from.as_str(), to = to.as_str(), "credential state changed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (from, to);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrumented_future_keeps_its_output() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrumented_future_keeps_its_output");
		let value = span
			.instrument(async {
				trace_state_transition(CredentialState::Expiring, CredentialState::Refreshing);
				trace_flow_outcome(FlowOutcome::Failure, Some("timeout"));

				42
			})
			.await;

		assert_eq!(value, 42);
	}
}
