// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_session_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records how many callers piggybacked on one finished renewal cycle.
pub fn record_renewal_waiters(waiters: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("bearer_session_renewal_waiters").record(waiters as f64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = waiters;
	}
}

/// Counts a published session lifecycle event, labeled by its signal name.
pub fn record_session_event(name: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("bearer_session_event_total", "event" => name).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = name;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_accept_values_without_installed_recorder() {
		record_flow_outcome(FlowKind::Renewal, FlowOutcome::Coalesced);
		record_renewal_waiters(4);
		record_session_event("credential-expired");
	}
}
