//! Location queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::Location;

/// Locations of an organization, by name
pub async fn list_locations(pool: &PgPool, organization_id: Uuid) -> Result<Vec<Location>> {
    let locations = sqlx::query_as::<_, Location>(
        r#"
        SELECT id, organization_id, name, address, latitude, longitude, kind, created_at
        FROM locations
        WHERE organization_id = $1
        ORDER BY name ASC
        "#,
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(locations)
}

pub async fn get_location(pool: &PgPool, organization_id: Uuid, id: Uuid) -> Result<Option<Location>> {
    let location = sqlx::query_as::<_, Location>(
        r#"
        SELECT id, organization_id, name, address, latitude, longitude, kind, created_at
        FROM locations
        WHERE id = $1 AND organization_id = $2
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?;

    Ok(location)
}
