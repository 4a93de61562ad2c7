use std::collections::{BTreeMap, HashMap};

use crate::model::*;
use crate::store::{BOOKING_PREFIX, RESOURCE_PREFIX};

use super::{Engine, EngineError};

/// Per-type utilization over a set of resources and bookings.
///
/// Every resource seeds or bumps its type's bucket. Every confirmed booking
/// whose resource is present adds one booking and its duration in hours.
/// Bookings pointing at a missing resource are skipped. Buckets come back
/// sorted by type; callers should not rely on that.
pub fn utilization(resources: &[Resource], bookings: &[Booking]) -> Vec<UtilizationRecord> {
    let mut by_type: BTreeMap<&str, UtilizationRecord> = BTreeMap::new();
    let mut kind_of: HashMap<&str, &str> = HashMap::with_capacity(resources.len());

    for resource in resources {
        by_type
            .entry(resource.kind.as_str())
            .or_insert_with(|| UtilizationRecord::empty(&resource.kind))
            .total_resources += 1;
        kind_of.insert(resource.id.as_str(), resource.kind.as_str());
    }

    for booking in bookings.iter().filter(|b| b.is_confirmed()) {
        let Some(kind) = kind_of.get(booking.resource_id.as_str()) else {
            continue;
        };
        if let Some(bucket) = by_type.get_mut(kind) {
            bucket.total_bookings += 1;
            bucket.total_hours += booking.span().duration_hours();
        }
    }

    by_type.into_values().collect()
}

impl Engine {
    /// Snapshot utilization. Takes no locks, so the result may already be
    /// stale when it is returned.
    pub async fn compute_utilization(&self) -> Result<Vec<UtilizationRecord>, EngineError> {
        let resources: Vec<Resource> = self.load_all(RESOURCE_PREFIX).await?;
        let bookings: Vec<Booking> = self.load_all(BOOKING_PREFIX).await?;
        Ok(utilization(&resources, &bookings))
    }
}
