/// Longest accepted resource or booking id, in bytes.
pub const MAX_ID_LEN: usize = 128;

/// Short free-text fields: name, type, status, location, user fields.
pub const MAX_FIELD_LEN: usize = 256;

/// Long free-text fields: description, purpose.
pub const MAX_TEXT_LEN: usize = 4096;

/// Widest bookable span: 366 days.
pub const MAX_SPAN_DURATION_MS: i64 = 366 * 24 * 3_600_000;
