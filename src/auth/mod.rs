//! Request-scoped authentication context.
//!
//! The session token is a bearer UUID resolved against `user_sessions`.
//! Every lifecycle operation receives the resulting [`AuthUser`] as an
//! explicit parameter; there is no ambient session state.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::enums::UserRole;
use crate::shared::error::ApiError;
use crate::shared::schema::{user_sessions, users};
use crate::shared::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub role: UserRole,
}

impl AuthUser {
    /// Staff or admin.
    pub fn require_responder(&self) -> Result<(), ApiError> {
        if self.role.is_responder() {
            Ok(())
        } else {
            Err(ApiError::Unauthorized(
                "This action requires a staff or admin account".to_string(),
            ))
        }
    }

    pub fn require_tenant(&self) -> Result<(), ApiError> {
        if self.role == UserRole::Tenant {
            Ok(())
        } else {
            Err(ApiError::Unauthorized(
                "This action requires a tenant account".to_string(),
            ))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<Uuid> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    token.parse().ok()
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthenticated)?;
        let mut conn = state.db()?;

        let session = user_sessions::table
            .find(token)
            .select((user_sessions::user_id, user_sessions::expires_at))
            .first::<(Uuid, chrono::DateTime<Utc>)>(&mut conn)
            .optional()?
            .ok_or(ApiError::Unauthenticated)?;
        let (session_user, expires_at) = session;
        if expires_at < Utc::now() {
            return Err(ApiError::Unauthenticated);
        }

        let (name, role) = users::table
            .find(session_user)
            .select((users::full_name, users::role))
            .first::<(String, UserRole)>(&mut conn)
            .optional()?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(AuthUser {
            id: session_user,
            name,
            role,
        })
    }
}
