use crate::model::NewResource;
use crate::store::RESOURCE_PREFIX;

use super::{Engine, EngineError};

/// Sample catalogue loaded into an empty registry.
pub fn demo_catalogue() -> Vec<NewResource> {
    let item = |id: &str, name: &str, kind: &str, capacity: Option<u32>, location: &str, description: &str| {
        NewResource {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            capacity,
            location: Some(location.into()),
            description: Some(description.into()),
            status: None,
        }
    };
    vec![
        item(
            "room-101",
            "Lecture Hall 101",
            "room",
            Some(100),
            "Building A, Floor 1",
            "Large lecture hall with projector and sound system",
        ),
        item(
            "room-201",
            "Computer Lab 201",
            "room",
            Some(30),
            "Building B, Floor 2",
            "Computer lab with 30 workstations",
        ),
        item(
            "proj-001",
            "HD Projector",
            "equipment",
            None,
            "Equipment Room",
            "Portable HD projector with HDMI connection",
        ),
        item(
            "book-001",
            "Data Structures & Algorithms",
            "book",
            None,
            "Library - Section C",
            "Comprehensive guide to DSA",
        ),
    ]
}

impl Engine {
    /// Load [`demo_catalogue`] unless any resource already exists. Returns how many were inserted.
    pub async fn seed_demo(&self) -> Result<usize, EngineError> {
        let existing: Vec<crate::model::Resource> = self.load_all(RESOURCE_PREFIX).await?;
        if !existing.is_empty() {
            tracing::info!("registry already holds {} resources, skipping demo seed", existing.len());
            return Ok(0);
        }

        let mut inserted = 0;
        for input in demo_catalogue() {
            match self.create_resource(input).await {
                Ok(_) => inserted += 1,
                // A concurrent seeder got there first.
                Err(EngineError::AlreadyExists { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        tracing::info!("seeded {inserted} demo resources");
        Ok(inserted)
    }
}
