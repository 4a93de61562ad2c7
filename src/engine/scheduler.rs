use crate::model::*;
use crate::store::{booking_key, resource_key, BOOKING_PREFIX};

use super::conflict::{find_conflicts, now, validate_span};
use super::validate::validate_new_booking;
use super::{Engine, EngineError};

impl Engine {
    /// Create a confirmed booking unless it overlaps a confirmed booking on the
    /// same resource. On conflict nothing is written and the overlapping
    /// bookings are returned in the error.
    pub async fn create_booking(&self, input: NewBooking) -> Result<Booking, EngineError> {
        validate_new_booking(&input)?;
        let start_time = input.start_time.ok_or(EngineError::MissingField("startTime"))?;
        let end_time = input.end_time.ok_or(EngineError::MissingField("endTime"))?;
        let span = Span::new(start_time, end_time);
        validate_span(&span)?;

        // Unknown resources are rejected before any lock entry is created.
        let rkey = resource_key(&input.resource_id);
        if self.load::<Resource>(&rkey).await?.is_none() {
            return Err(EngineError::resource_not_found(&input.resource_id));
        }

        let key = booking_key(&input.id);
        let booking_guard = self.lock_key(key.clone()).await;
        let resource_guard = self.lock_key(rkey.clone()).await;

        // Re-check under the lock: a delete may have won the race.
        if self.load::<Resource>(&rkey).await?.is_none() {
            return Err(EngineError::resource_not_found(&input.resource_id));
        }
        if self.load::<Booking>(&key).await?.is_some() {
            return Err(EngineError::AlreadyExists { entity: "booking", id: input.id });
        }

        let existing: Vec<Booking> = self.load_all(BOOKING_PREFIX).await?;
        let conflicts = find_conflicts(&existing, &input.resource_id, &span);
        if !conflicts.is_empty() {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            tracing::warn!(
                "booking {} on {} conflicts with {} existing",
                input.id,
                input.resource_id,
                conflicts.len()
            );
            return Err(EngineError::Conflict(conflicts));
        }

        let booking = Booking {
            id: input.id,
            resource_id: input.resource_id,
            user_id: input.user_id,
            user_name: input.user_name.unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
            user_role: input.user_role.unwrap_or_else(|| DEFAULT_USER_ROLE.to_string()),
            start_time,
            end_time,
            purpose: input.purpose.unwrap_or_default(),
            status: BookingStatus::Confirmed,
            created_at: now(),
        };
        self.save(&key, &booking, vec![booking_guard, resource_guard]).await?;
        Ok(booking)
    }

    pub async fn get_booking(&self, id: &str) -> Result<Booking, EngineError> {
        self.load(&booking_key(id))
            .await?
            .ok_or_else(|| EngineError::booking_not_found(id))
    }

    /// Every booking, cancelled ones included.
    pub async fn list_bookings(&self) -> Result<Vec<Booking>, EngineError> {
        self.load_all(BOOKING_PREFIX).await
    }

    /// Soft delete. Cancelling an already-cancelled booking succeeds without a write.
    pub async fn cancel_booking(&self, id: &str) -> Result<Booking, EngineError> {
        let key = booking_key(id);
        let booking_guard = self.lock_key(key.clone()).await;
        let resource_id = self.get_booking(id).await?.resource_id;
        let resource_guard = self.lock_key(resource_key(&resource_id)).await;

        // Re-read under the lock: a cascade delete may have removed it meanwhile.
        let mut booking: Booking = self
            .load(&key)
            .await?
            .ok_or_else(|| EngineError::booking_not_found(id))?;
        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }
        booking.status = BookingStatus::Cancelled;
        self.save(&key, &booking, vec![booking_guard, resource_guard]).await?;
        Ok(booking)
    }
}
