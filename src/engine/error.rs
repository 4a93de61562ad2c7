use crate::model::Booking;
use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    MissingField(&'static str),
    Invalid(String),
    LimitExceeded(&'static str),
    NotFound { entity: &'static str, id: String },
    AlreadyExists { entity: &'static str, id: String },
    /// Overlapping confirmed bookings on the same resource.
    Conflict(Vec<Booking>),
    Storage(StoreError),
}

/// Caller-facing failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::MissingField(_)
            | EngineError::Invalid(_)
            | EngineError::LimitExceeded(_) => ErrorKind::Validation,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::AlreadyExists { .. } | EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Only storage failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }

    pub(crate) fn resource_not_found(id: &str) -> Self {
        EngineError::NotFound { entity: "resource", id: id.to_string() }
    }

    pub(crate) fn booking_not_found(id: &str) -> Self {
        EngineError::NotFound { entity: "booking", id: id.to_string() }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MissingField(field) => write!(f, "missing required field: {field}"),
            EngineError::Invalid(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            EngineError::AlreadyExists { entity, id } => write!(f, "{entity} already exists: {id}"),
            EngineError::Conflict(bookings) => {
                let ids: Vec<&str> = bookings.iter().map(|b| b.id.as_str()).collect();
                write!(f, "booking conflict with: {}", ids.join(", "))
            }
            EngineError::Storage(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Storage(e)
    }
}
