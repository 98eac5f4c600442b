use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use skyhold_core::{CoreError, CoreResult, IdentityProvider, PassengerIdentity};
use tracing::debug;

use crate::state::AppState;

pub const ROLE_CUSTOMER: &str = "CUSTOMER";
pub const ROLE_ADMIN: &str = "ADMIN";

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub exp: usize,
}

// ============================================================================
// Identity Provider
// ============================================================================

/// Verifies HS256 bearer tokens minted by the identity service.
pub struct JwtIdentityProvider {
    decoding: DecodingKey,
    encoding: EncodingKey,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mint a token for `identity`. Used for demo data and tests.
    pub fn issue(&self, identity: &PassengerIdentity, ttl_seconds: u64) -> CoreResult<String> {
        let claims = Claims {
            sub: identity.id.clone(),
            email: identity.email.expose().clone(),
            name: identity.display_name.clone(),
            role: if identity.is_admin { ROLE_ADMIN } else { ROLE_CUSTOMER }.to_owned(),
            exp: (Utc::now() + Duration::seconds(ttl_seconds as i64)).timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| CoreError::InternalError(format!("Token encoding failed: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn resolve(&self, credential: &str) -> CoreResult<PassengerIdentity> {
        let token_data = decode::<Claims>(credential, &self.decoding, &Validation::default())
            .map_err(|e| CoreError::IdentityError(e.to_string()))?;
        let claims = token_data.claims;

        match claims.role.as_str() {
            ROLE_CUSTOMER => Ok(PassengerIdentity::passenger(claims.sub, claims.name, claims.email)),
            ROLE_ADMIN => Ok(PassengerIdentity::admin(claims.sub, claims.name, claims.email)),
            other => Err(CoreError::IdentityError(format!("unknown role {}", other))),
        }
    }
}

fn bearer_token(req: &Request) -> Result<String, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::to_owned)
        .ok_or(StatusCode::UNAUTHORIZED)
}

async fn authenticate(state: &AppState, token: String) -> Result<PassengerIdentity, StatusCode> {
    state.identity.resolve(&token).await.map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        StatusCode::UNAUTHORIZED
    })
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

/// Any verified identity. Administrators may use passenger routes too; the
/// services scope records by ownership.
pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&req)?;
    let identity = authenticate(&state, token).await?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&req)?;
    let identity = authenticate(&state, token).await?;
    if !identity.is_admin {
        return Err(StatusCode::FORBIDDEN);
    }
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
