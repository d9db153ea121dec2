//! Shift queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::Shift;

/// Shifts of an organization, earliest start first
pub async fn list_shifts(pool: &PgPool, organization_id: Uuid) -> Result<Vec<Shift>> {
    let shifts = sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, organization_id, name, start_time, end_time, time_zone, created_at
        FROM shifts
        WHERE organization_id = $1
        ORDER BY start_time ASC, name ASC
        "#,
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(shifts)
}

pub async fn get_shift(pool: &PgPool, organization_id: Uuid, id: Uuid) -> Result<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, organization_id, name, start_time, end_time, time_zone, created_at
        FROM shifts
        WHERE id = $1 AND organization_id = $2
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?;

    Ok(shift)
}
