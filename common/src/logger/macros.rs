use tracing::{Span, field};

use super::TraceId;

/// Root span for one polling cycle. `shortlisted` is recorded once the scan
/// has run.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "cycle",
        name = %name,
        trace_id = %trace_id,
        shortlisted = field::Empty
    )
}

/// Child span for a phase inside a cycle (inherits the trace id from its parent).
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("phase", name = %name)
}
