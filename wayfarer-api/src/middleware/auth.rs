use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_core::Actor;

use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    /// `None` when the role is not one this service knows.
    pub fn actor(&self, id: Uuid) -> Option<Actor> {
        match self.role.as_str() {
            "CUSTOMER" => Some(Actor::customer(id)),
            "ADMIN" | "SUPER_ADMIN" => Some(Actor::admin(id)),
            _ => None,
        }
    }
}

fn authenticate(state: &AppState, req: &Request) -> Result<Actor, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    let id = Uuid::parse_str(&token_data.claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;
    token_data.claims.actor(id).ok_or(StatusCode::FORBIDDEN)
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

/// Any known role. Handlers scope what customers can see by the injected `Actor`.
pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let actor = authenticate(&state, &req)?;
    req.extensions_mut().insert(actor);
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
    let actor = authenticate(&state, &req)?;
    if !actor.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
