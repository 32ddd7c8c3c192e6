//! Optional observability helpers for broker flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `factus_broker.flow` with the `flow`
//!   (strategy) and `stage` (call site) fields, plus warnings when a cache interaction degrades
//!   to its fallback behavior.
//! - Enable `metrics` to increment the `factus_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Token-acquisition strategies observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// The overall cached-token fetch.
	Fetch,
	/// Refresh token exchange.
	Refresh,
	/// Password-grant login.
	Password,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Fetch => "fetch",
			FlowKind::Refresh => "refresh",
			FlowKind::Password => "password",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Emits a warning for a cache interaction that degraded to its fallback
/// (absent/zero/skip) behavior.
pub(crate) fn warn_degraded(operation: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		::tracing::warn!(operation, error = %error, "Cache interaction degraded to fallback.");
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (operation, error);
	}
}
