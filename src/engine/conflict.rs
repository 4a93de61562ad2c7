use chrono::Utc;

use crate::limits::MAX_SPAN_DURATION_MS;
use crate::model::*;

use super::EngineError;

pub(crate) fn now() -> Timestamp {
    Utc::now()
}

/// Reject empty, inverted, and oversized spans.
pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.start >= span.end {
        return Err(EngineError::Invalid(format!(
            "startTime {} must be before endTime {}",
            span.start.to_rfc3339(),
            span.end.to_rfc3339()
        )));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("booking span too wide"));
    }
    Ok(())
}

/// Confirmed bookings on `resource_id` whose span overlaps `span`.
/// Cancelled bookings never conflict.
pub(crate) fn find_conflicts<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    resource_id: &str,
    span: &Span,
) -> Vec<Booking> {
    bookings
        .into_iter()
        .filter(|b| b.resource_id == resource_id && b.is_confirmed())
        .filter(|b| b.span().overlaps(span))
        .cloned()
        .collect()
}
