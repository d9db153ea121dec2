//! Authentication utilities: JWT token management and permission checks

use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Request;

pub const PERM_ALL: &str = "*";
pub const PERM_ROUTE_READ: &str = "route:read";
pub const PERM_ROUTE_CREATE: &str = "route:create";
pub const PERM_ROUTE_DELETE: &str = "route:delete";
pub const PERM_VEHICLE_READ: &str = "vehicle:read";

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Organization the user acts for
    pub org: String,
    /// User role (admin, manager, planner)
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

/// Authentication result from extract_auth
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthInfo {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == PERM_ALL || p == permission)
    }

    pub fn require(&self, permission: &str) -> Result<()> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(anyhow!("Missing permission: {}", permission))
        }
    }
}

/// Generate a JWT access token
pub fn generate_token(
    user_id: Uuid,
    organization_id: Uuid,
    role: &str,
    permissions: &[String],
    secret: &str,
) -> Result<String> {
    let now = chrono::Utc::now().timestamp() as usize;
    let exp = now + 8 * 60 * 60; // 8 hours (working day)

    let claims = Claims {
        sub: user_id.to_string(),
        org: organization_id.to_string(),
        role: role.to_string(),
        permissions: permissions.to_vec(),
        iat: now,
        exp,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("Invalid token: {}", e))?;

    Ok(token_data.claims)
}

/// Extract authentication info from a NATS request.
///
/// A valid JWT is required; its subject and organization must be UUIDs.
pub fn extract_auth<T>(request: &Request<T>, jwt_secret: &str) -> Result<AuthInfo> {
    let token = request
        .token
        .as_ref()
        .ok_or_else(|| anyhow!("No authentication provided: JWT token is required"))?;

    let claims = validate_token(token, jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| anyhow!("Invalid user_id in token: {}", e))?;
    let organization_id = Uuid::parse_str(&claims.org)
        .map_err(|e| anyhow!("Invalid organization in token: {}", e))?;

    Ok(AuthInfo {
        user_id,
        organization_id,
        role: claims.role,
        permissions: claims.permissions,
    })
}

// =============================================================================
// Tests
// =============================================================================
