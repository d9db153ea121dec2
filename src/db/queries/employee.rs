//! Employee queries for planning

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::PlanningEmployee;

const PLANNING_EMPLOYEE_SELECT: &str = r#"
    SELECT e.id, e.name, e.department_id, d.name AS department_name, e.area,
           e.stop_id, s.latitude AS stop_latitude, s.longitude AS stop_longitude,
           s.address AS stop_address
    FROM employees e
    LEFT JOIN departments d ON d.id = e.department_id
    LEFT JOIN stops s ON s.id = e.stop_id
"#;

/// Employees of a shift at a location that no route carries yet
pub async fn list_unassigned(
    pool: &PgPool,
    organization_id: Uuid,
    shift_id: Uuid,
    location_id: Uuid,
) -> Result<Vec<PlanningEmployee>> {
    let sql = format!(
        "{} WHERE e.organization_id = $1 AND e.shift_id = $2 AND e.location_id = $3
             AND NOT e.assigned AND NOT e.deleted
           ORDER BY e.name ASC",
        PLANNING_EMPLOYEE_SELECT
    );

    let employees = sqlx::query_as::<_, PlanningEmployee>(&sql)
        .bind(organization_id)
        .bind(shift_id)
        .bind(location_id)
        .fetch_all(pool)
        .await?;

    Ok(employees)
}

/// Employees by id, limited to the organization
pub async fn list_by_ids(
    pool: &PgPool,
    organization_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<PlanningEmployee>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "{} WHERE e.organization_id = $1 AND e.id = ANY($2) AND NOT e.deleted",
        PLANNING_EMPLOYEE_SELECT
    );

    let employees = sqlx::query_as::<_, PlanningEmployee>(&sql)
        .bind(organization_id)
        .bind(ids)
        .fetch_all(pool)
        .await?;

    Ok(employees)
}
