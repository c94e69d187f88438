//! Per-user notifications and best-effort fan-out.
//!
//! Delivery is at-most-once: a failed insert is logged and swallowed so
//! it can never fail the lifecycle action that triggered it.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::shared::enums::UserRole;
use crate::shared::error::ApiError;
use crate::shared::schema::{notifications, users};
use crate::shared::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = notifications)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

pub fn notify_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    kind: &str,
    title: &str,
    message: &str,
    link: Option<String>,
) -> QueryResult<()> {
    let row = Notification {
        id: Uuid::new_v4(),
        user_id,
        kind: kind.to_string(),
        title: title.to_string(),
        message: message.to_string(),
        link,
        is_read: false,
        created_at: Utc::now(),
    };
    diesel::insert_into(notifications::table)
        .values(&row)
        .execute(conn)?;
    Ok(())
}

fn notify_roles(
    conn: &mut PgConnection,
    roles: &[UserRole],
    kind: &str,
    title: &str,
    message: &str,
    link: Option<String>,
) -> QueryResult<()> {
    let recipients: Vec<Uuid> = users::table
        .filter(users::role.eq_any(roles.to_vec()))
        .select(users::id)
        .load(conn)?;
    for user_id in recipients {
        notify_user(conn, user_id, kind, title, message, link.clone())?;
    }
    Ok(())
}

/// Every staff and admin account.
pub fn notify_responders(
    conn: &mut PgConnection,
    kind: &str,
    title: &str,
    message: &str,
    link: Option<String>,
) -> QueryResult<()> {
    notify_roles(
        conn,
        &[UserRole::Staff, UserRole::Admin],
        kind,
        title,
        message,
        link,
    )
}

pub fn notify_admins(
    conn: &mut PgConnection,
    kind: &str,
    title: &str,
    message: &str,
    link: Option<String>,
) -> QueryResult<()> {
    notify_roles(conn, &[UserRole::Admin], kind, title, message, link)
}

/// Fire-and-forget boundary around delivery.
pub fn best_effort(context: &str, result: QueryResult<()>) {
    if let Err(e) = result {
        warn!("Notification delivery failed ({context}): {e}");
    }
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let mut conn = state.db()?;
    let rows: Vec<Notification> = notifications::table
        .filter(notifications::user_id.eq(auth.id))
        .order(notifications::created_at.desc())
        .limit(100)
        .load(&mut conn)
        .map_err(|e| ApiError::db("load notifications", e))?;
    Ok(Json(rows))
}

pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let mut conn = state.db()?;
    let updated = diesel::update(
        notifications::table
            .filter(notifications::id.eq(id))
            .filter(notifications::user_id.eq(auth.id)),
    )
    .set(notifications::is_read.eq(true))
    .execute(&mut conn)?;
    if updated == 0 {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }
    let row: Notification = notifications::table.find(id).first(&mut conn)?;
    Ok(Json(row))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/:id/read", put(mark_notification_read))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_serializes_with_wire_keys() {
        let row = Notification {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            kind: "ticket_created".to_string(),
            title: "New ticket".to_string(),
            message: "A tenant reported a leak".to_string(),
            link: Some("/tickets/abc".to_string()),
            is_read: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["type"], "ticket_created");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("kind").is_none());
    }
}
