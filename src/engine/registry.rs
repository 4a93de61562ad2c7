use crate::model::*;
use crate::store::{booking_key, resource_key, BOOKING_PREFIX, RESOURCE_PREFIX};

use super::conflict::now;
use super::validate::{validate_new_resource, validate_patch};
use super::{Engine, EngineError};

impl Engine {
    pub async fn create_resource(&self, input: NewResource) -> Result<Resource, EngineError> {
        validate_new_resource(&input)?;
        let key = resource_key(&input.id);
        let guard = self.lock_key(key.clone()).await;
        if self.load::<Resource>(&key).await?.is_some() {
            return Err(EngineError::AlreadyExists { entity: "resource", id: input.id });
        }

        let resource = input.into_resource(now());
        self.save(&key, &resource, vec![guard]).await?;
        tracing::debug!("created resource {} ({})", resource.id, resource.kind);
        Ok(resource)
    }

    pub async fn get_resource(&self, id: &str) -> Result<Resource, EngineError> {
        self.load(&resource_key(id))
            .await?
            .ok_or_else(|| EngineError::resource_not_found(id))
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, EngineError> {
        self.load_all(RESOURCE_PREFIX).await
    }

    pub async fn update_resource(&self, id: &str, patch: ResourcePatch) -> Result<Resource, EngineError> {
        validate_patch(&patch)?;
        let key = resource_key(id);
        let guard = self.lock_key(key.clone()).await;
        let mut resource: Resource = self
            .load(&key)
            .await?
            .ok_or_else(|| EngineError::resource_not_found(id))?;
        resource.apply_patch(patch, now());
        self.save(&key, &resource, vec![guard]).await?;
        Ok(resource)
    }

    /// Remove a resource and every booking on it, in any status, as one store write.
    ///
    /// Holding the resource lock keeps a concurrent booking create from
    /// slipping a new booking in between the scan and the delete.
    pub async fn delete_resource(&self, id: &str) -> Result<usize, EngineError> {
        let key = resource_key(id);
        let guard = self.lock_key(key.clone()).await;
        if self.load::<Resource>(&key).await?.is_none() {
            return Err(EngineError::resource_not_found(id));
        }

        let bookings: Vec<Booking> = self.load_all(BOOKING_PREFIX).await?;
        let mut keys = vec![key];
        keys.extend(
            bookings
                .iter()
                .filter(|b| b.resource_id == id)
                .map(|b| booking_key(&b.id)),
        );
        let cascaded = keys.len() - 1;

        self.remove_all(keys, vec![guard]).await?;
        tracing::info!("deleted resource {id} and {cascaded} bookings");
        Ok(cascaded)
    }
}
