use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// UTC instant; serialized as RFC 3339.
pub type Timestamp = DateTime<Utc>;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Span {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_ms() as f64 / MS_PER_HOUR
    }

    /// Touching spans (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ── Resources ────────────────────────────────────────────────────

/// A bookable thing: room, equipment, book, faculty hours.
///
/// `kind` is stored as an open string and only used as a grouping key, so
/// unknown categories simply form their own analytics bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub capacity: Option<u32>,
    pub location: String,
    pub description: String,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

pub const DEFAULT_RESOURCE_STATUS: &str = "available";

/// Caller-supplied fields for a resource create. Empty required strings count as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewResource {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub capacity: Option<u32>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl NewResource {
    pub fn into_resource(self, now: Timestamp) -> Resource {
        Resource {
            id: self.id,
            name: self.name,
            kind: self.kind,
            capacity: self.capacity,
            location: self.location.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            status: self
                .status
                .unwrap_or_else(|| DEFAULT_RESOURCE_STATUS.to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update. `None` leaves a field untouched; `capacity: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePatch {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub capacity: Option<Option<u32>>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl ResourcePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Resource {
    /// Merge `patch` over this record. `id` and `created_at` never change.
    pub fn apply_patch(&mut self, patch: ResourcePatch, now: Timestamp) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(capacity) = patch.capacity {
            self.capacity = capacity;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
    }
}

// ── Bookings ─────────────────────────────────────────────────────

/// Booking state machine: `Confirmed → Cancelled`, terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" | "canceled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub resource_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_role: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub purpose: String,
    pub status: BookingStatus,
    pub created_at: Timestamp,
}

impl Booking {
    pub fn span(&self) -> Span {
        Span::new(self.start_time, self.end_time)
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

pub const DEFAULT_USER_NAME: &str = "Unknown User";
pub const DEFAULT_USER_ROLE: &str = "student";

/// Caller-supplied fields for a booking create. Missing times are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBooking {
    pub id: String,
    pub resource_id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub user_role: Option<String>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub purpose: Option<String>,
}

/// Consumer-side filter over a booking listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    pub id: Option<String>,
    pub resource_id: Option<String>,
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.id.as_ref().is_none_or(|id| *id == booking.id)
            && self
                .resource_id
                .as_ref()
                .is_none_or(|rid| *rid == booking.resource_id)
            && self.status.is_none_or(|s| s == booking.status)
    }
}

// ── Analytics ────────────────────────────────────────────────────

/// Derived per-type usage. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub total_resources: u64,
    pub total_bookings: u64,
    pub total_hours: f64,
}

impl UtilizationRecord {
    pub fn empty(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            total_resources: 0,
            total_bookings: 0,
            total_hours: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(at(10, 0), at(11, 0));
        let b = Span::new(at(10, 30), at(11, 30));
        let c = Span::new(at(11, 0), at(12, 0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // touching, half-open
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn span_containing_other_overlaps() {
        let outer = Span::new(at(8, 0), at(18, 0));
        let inner = Span::new(at(12, 0), at(12, 15));
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn span_duration_hours_fractional() {
        let s = Span::new(at(9, 0), at(10, 30));
        assert_eq!(s.duration_ms(), 90 * 60_000);
        assert!((s.duration_hours() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn new_resource_defaults() {
        let now = at(9, 0);
        let r = NewResource {
            id: "room-1".into(),
            name: "Room".into(),
            kind: "room".into(),
            ..Default::default()
        }
        .into_resource(now);
        assert_eq!(r.capacity, None);
        assert_eq!(r.location, "");
        assert_eq!(r.description, "");
        assert_eq!(r.status, "available");
        assert_eq!(r.created_at, r.updated_at);
    }

    #[test]
    fn patch_merges_only_supplied_fields() {
        let mut r = NewResource {
            id: "room-1".into(),
            name: "Room".into(),
            kind: "room".into(),
            capacity: Some(10),
            location: Some("A".into()),
            ..Default::default()
        }
        .into_resource(at(9, 0));

        r.apply_patch(
            ResourcePatch {
                status: Some("unavailable".into()),
                capacity: Some(None),
                ..Default::default()
            },
            at(10, 0),
        );
        assert_eq!(r.id, "room-1");
        assert_eq!(r.name, "Room");
        assert_eq!(r.location, "A");
        assert_eq!(r.capacity, None);
        assert_eq!(r.status, "unavailable");
        assert_eq!(r.created_at, at(9, 0));
        assert_eq!(r.updated_at, at(10, 0));
    }

    #[test]
    fn resource_json_uses_camel_case_and_type() {
        let r = NewResource {
            id: "proj-1".into(),
            name: "Projector".into(),
            kind: "equipment".into(),
            ..Default::default()
        }
        .into_resource(at(9, 0));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "equipment");
        assert_eq!(json["createdAt"], "2025-03-10T09:00:00Z");
        assert!(json["capacity"].is_null());
    }

    #[test]
    fn booking_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(BookingStatus::parse("CONFIRMED"), Some(BookingStatus::Confirmed));
        assert_eq!(BookingStatus::parse("canceled"), Some(BookingStatus::Cancelled));
        assert_eq!(BookingStatus::parse("pending"), None);
    }

    #[test]
    fn booking_filter() {
        let b = Booking {
            id: "b1".into(),
            resource_id: "room-1".into(),
            user_id: "u1".into(),
            user_name: DEFAULT_USER_NAME.into(),
            user_role: DEFAULT_USER_ROLE.into(),
            start_time: at(10, 0),
            end_time: at(11, 0),
            purpose: String::new(),
            status: BookingStatus::Confirmed,
            created_at: at(9, 0),
        };
        assert!(BookingFilter::default().matches(&b));
        assert!(BookingFilter {
            resource_id: Some("room-1".into()),
            status: Some(BookingStatus::Confirmed),
            ..Default::default()
        }
        .matches(&b));
        assert!(!BookingFilter {
            status: Some(BookingStatus::Cancelled),
            ..Default::default()
        }
        .matches(&b));
    }
}
