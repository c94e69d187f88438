//! Maintenance ticket lifecycle: creation, multi-stage approval,
//! resolution, tenant confirmation/dispute, and comment-based claiming.
//!
//! Transition rules live in [`lifecycle`]; this module is the
//! persistence and HTTP glue. Multi-row transitions run inside a
//! single transaction so a ticket can never end up resolved without
//! its expense (or the reverse). Notification fan-out happens after
//! commit and is best-effort.

pub mod chat;
pub mod lifecycle;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::notifications;
use crate::rentals::{self, LandlordExpense};
use crate::shared::enums::{
    ApprovalStatus, ConfirmationStatus, ExpenseStatus, PayerType, TicketStatus, UserRole,
};
use crate::shared::error::ApiError;
use crate::shared::schema::{
    landlord_expenses, leases, maintenance_tickets, properties, ticket_comments,
};
use crate::shared::state::AppState;
use chat::{ChatEvent, ChatUser};
use lifecycle::ApprovalStage;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = maintenance_tickets)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceTicket {
    pub id: Uuid,
    pub subject: String,
    pub description: String,
    pub category: Option<String>,
    pub priority: String,
    pub status: TicketStatus,
    pub approval_status: ApprovalStatus,
    pub requires_approval: bool,
    pub claimed_by: Option<Uuid>,
    pub confirmation: Option<ConfirmationStatus>,
    pub resolution_note: Option<String>,
    pub resolution_date: Option<DateTime<Utc>>,
    pub cost_cents: Option<i64>,
    pub artisan_name: Option<String>,
    pub artisan_phone: Option<String>,
    pub payer_type: Option<PayerType>,
    pub property_id: Uuid,
    pub landlord_id: Option<Uuid>,
    pub rent_cycle_id: Option<Uuid>,
    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_comments)]
#[serde(rename_all = "camelCase")]
pub struct TicketComment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_role: UserRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffTicketRequest {
    pub target_user_id: Uuid,
    pub subject: String,
    pub description: String,
    pub category: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveTicketRequest {
    pub stage: ApprovalStage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixTicketRequest {
    pub resolution_note: Option<String>,
    pub cost_cents: Option<i64>,
    pub artisan_name: Option<String>,
    pub artisan_phone: Option<String>,
    pub payer_type: Option<PayerType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeTicketRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<TicketStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn load_ticket(conn: &mut PgConnection, id: Uuid) -> Result<MaintenanceTicket, ApiError> {
    maintenance_tickets::table
        .find(id)
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".to_string()))
}

fn ticket_link(id: Uuid) -> Option<String> {
    Some(format!("/tickets/{id}"))
}

/// Resolves the landlord for a unit, falling back to the parent
/// property when the unit is a sub-unit without its own landlord.
fn resolve_landlord(conn: &mut PgConnection, property_id: Uuid) -> Result<Uuid, ApiError> {
    let (landlord, parent): (Option<Uuid>, Option<Uuid>) = properties::table
        .find(property_id)
        .select((properties::landlord_id, properties::parent_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Property not found".to_string()))?;
    if let Some(landlord) = landlord {
        return Ok(landlord);
    }
    if let Some(parent) = parent {
        if let Some(landlord) = properties::table
            .find(parent)
            .select(properties::landlord_id)
            .first::<Option<Uuid>>(conn)?
        {
            return Ok(landlord);
        }
    }
    Err(ApiError::Validation(
        "No landlord assigned to this property".to_string(),
    ))
}

/// Tenant self-service creation. Requires an active lease; establishes
/// the landlord's current rent cycle and enters the approval chain at
/// the manager stage.
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<MaintenanceTicket>, ApiError> {
    auth.require_tenant()?;
    let mut conn = state.db()?;

    let property_id: Uuid = leases::table
        .filter(leases::tenant_id.eq(auth.id))
        .filter(leases::is_active.eq(true))
        .select(leases::property_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::Validation("No active lease found".to_string()))?;
    let landlord = resolve_landlord(&mut conn, property_id)?;
    let cycle = rentals::establish_rent_cycle(&mut conn, landlord)
        .map_err(|e| ApiError::db("establish rent cycle", e))?;

    let now = Utc::now();
    let ticket = MaintenanceTicket {
        id: Uuid::new_v4(),
        subject: req.subject,
        description: req.description,
        category: req.category,
        priority: "normal".to_string(),
        status: TicketStatus::Open,
        approval_status: ApprovalStatus::PendingManager,
        requires_approval: true,
        claimed_by: None,
        confirmation: None,
        resolution_note: None,
        resolution_date: None,
        cost_cents: None,
        artisan_name: None,
        artisan_phone: None,
        payer_type: None,
        property_id,
        landlord_id: Some(landlord),
        rent_cycle_id: Some(cycle.id),
        tenant_id: auth.id,
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(maintenance_tickets::table)
        .values(&ticket)
        .execute(&mut conn)
        .map_err(|e| ApiError::db("create ticket", e))?;

    notifications::best_effort(
        "ticket created",
        notifications::notify_responders(
            &mut conn,
            "ticket_created",
            "New maintenance ticket",
            &format!("{} reported: {}", auth.name, ticket.subject),
            ticket_link(ticket.id),
        ),
    );
    Ok(Json(ticket))
}

/// Staff/admin creation on behalf of a tenant. Bypasses the approval
/// chain and carries no rent-cycle linkage.
pub async fn create_staff_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateStaffTicketRequest>,
) -> Result<Json<MaintenanceTicket>, ApiError> {
    auth.require_responder()?;
    let mut conn = state.db()?;

    let property_id: Uuid = leases::table
        .filter(leases::tenant_id.eq(req.target_user_id))
        .filter(leases::is_active.eq(true))
        .select(leases::property_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::Validation("Target user has no active lease".to_string()))?;
    let landlord = resolve_landlord(&mut conn, property_id).ok();

    let now = Utc::now();
    let ticket = MaintenanceTicket {
        id: Uuid::new_v4(),
        subject: req.subject,
        description: req.description,
        category: req.category,
        priority: req.priority.unwrap_or_else(|| "normal".to_string()),
        status: TicketStatus::Open,
        approval_status: ApprovalStatus::Approved,
        requires_approval: false,
        claimed_by: None,
        confirmation: None,
        resolution_note: None,
        resolution_date: None,
        cost_cents: None,
        artisan_name: None,
        artisan_phone: None,
        payer_type: None,
        property_id,
        landlord_id: landlord,
        rent_cycle_id: None,
        tenant_id: req.target_user_id,
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(maintenance_tickets::table)
        .values(&ticket)
        .execute(&mut conn)
        .map_err(|e| ApiError::db("create ticket", e))?;
    Ok(Json(ticket))
}

/// Role-gated approval. Manager stage parks the ticket for final
/// approval; admin stage approves it and starts work.
pub async fn approve_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ApproveTicketRequest>,
) -> Result<Json<MaintenanceTicket>, ApiError> {
    let effect = lifecycle::approval_effect(auth.role, req.stage)?;
    let mut conn = state.db()?;
    let now = Utc::now();

    conn.transaction::<_, ApiError, _>(|conn| {
        let updated = diesel::update(maintenance_tickets::table.find(id))
            .set((
                maintenance_tickets::approval_status.eq(effect.approval),
                maintenance_tickets::updated_at.eq(now),
            ))
            .execute(conn)?;
        if updated == 0 {
            return Err(ApiError::NotFound("Ticket not found".to_string()));
        }
        if let Some(status) = effect.status {
            diesel::update(maintenance_tickets::table.find(id))
                .set(maintenance_tickets::status.eq(status))
                .execute(conn)?;
        }
        Ok(())
    })?;

    let ticket = load_ticket(&mut conn, id)?;
    Ok(Json(ticket))
}

/// Records the resolution and hands the ticket to the tenant for
/// confirmation. Accrues a pending landlord expense when the landlord
/// pays and the cost is positive, at most once per ticket.
pub async fn mark_ticket_fixed(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<FixTicketRequest>,
) -> Result<Json<MaintenanceTicket>, ApiError> {
    auth.require_responder()?;
    lifecycle::validate_resolution(
        req.artisan_name.as_deref(),
        req.artisan_phone.as_deref(),
        req.cost_cents,
    )?;
    let mut conn = state.db()?;
    let now = Utc::now();

    let ticket = conn.transaction::<MaintenanceTicket, ApiError, _>(|conn| {
        let ticket = load_ticket(conn, id)?;
        diesel::update(maintenance_tickets::table.find(id))
            .set((
                maintenance_tickets::status.eq(TicketStatus::AwaitingConfirmation),
                maintenance_tickets::confirmation.eq(Some(ConfirmationStatus::Pending)),
                maintenance_tickets::resolution_note.eq(req.resolution_note.clone()),
                maintenance_tickets::resolution_date.eq(Some(now)),
                maintenance_tickets::cost_cents.eq(req.cost_cents),
                maintenance_tickets::artisan_name.eq(req.artisan_name.clone()),
                maintenance_tickets::artisan_phone.eq(req.artisan_phone.clone()),
                maintenance_tickets::payer_type.eq(req.payer_type),
                maintenance_tickets::updated_at.eq(now),
            ))
            .execute(conn)?;

        if lifecycle::expense_required(req.payer_type, req.cost_cents) {
            let landlord = ticket.landlord_id.ok_or_else(|| {
                ApiError::Validation("Ticket has no landlord to bill".to_string())
            })?;
            let expense = LandlordExpense {
                id: Uuid::new_v4(),
                ticket_id: id,
                landlord_id: landlord,
                rent_cycle_id: ticket.rent_cycle_id,
                amount_cents: req.cost_cents.unwrap_or(0),
                status: ExpenseStatus::Pending,
                created_at: now,
                updated_at: now,
            };
            // ticket_id is unique; a repeated or concurrent resolution
            // leaves the first expense in place.
            diesel::insert_into(landlord_expenses::table)
                .values(&expense)
                .on_conflict(landlord_expenses::ticket_id)
                .do_nothing()
                .execute(conn)?;
        }
        load_ticket(conn, id)
    })?;

    notifications::best_effort(
        "ticket fixed",
        notifications::notify_user(
            &mut conn,
            ticket.tenant_id,
            "ticket_fixed",
            "Repair completed",
            &format!(
                "\"{}\" was marked as fixed. Please confirm the repair.",
                ticket.subject
            ),
            ticket_link(id),
        ),
    );
    Ok(Json(ticket))
}

/// Tenant (or admin) confirmation. The only path by which a pending
/// landlord expense becomes payable.
pub async fn confirm_resolution(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MaintenanceTicket>, ApiError> {
    let mut conn = state.db()?;
    let ticket = load_ticket(&mut conn, id)?;
    if !lifecycle::can_confirm(auth.id, auth.role, ticket.tenant_id) {
        return Err(ApiError::Unauthorized(
            "Only the reporting tenant may confirm this repair".to_string(),
        ));
    }
    let now = Utc::now();

    conn.transaction::<_, ApiError, _>(|conn| {
        diesel::update(maintenance_tickets::table.find(id))
            .set((
                maintenance_tickets::status.eq(TicketStatus::Resolved),
                maintenance_tickets::confirmation.eq(Some(ConfirmationStatus::Confirmed)),
                maintenance_tickets::resolution_date.eq(Some(now)),
                maintenance_tickets::updated_at.eq(now),
            ))
            .execute(conn)?;
        diesel::update(
            landlord_expenses::table
                .filter(landlord_expenses::ticket_id.eq(id))
                .filter(landlord_expenses::status.eq(ExpenseStatus::Pending)),
        )
        .set((
            landlord_expenses::status.eq(ExpenseStatus::Approved),
            landlord_expenses::updated_at.eq(now),
        ))
        .execute(conn)?;
        Ok(())
    })?;

    let ticket = load_ticket(&mut conn, id)?;
    Ok(Json(ticket))
}

/// Reopens the ticket under dispute and records a tagged comment on
/// the thread.
pub async fn dispute_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DisputeTicketRequest>,
) -> Result<Json<MaintenanceTicket>, ApiError> {
    let mut conn = state.db()?;
    let ticket = load_ticket(&mut conn, id)?;
    if auth.id != ticket.tenant_id {
        return Err(ApiError::Unauthorized(
            "Only the reporting tenant may dispute this repair".to_string(),
        ));
    }
    let now = Utc::now();

    let comment = TicketComment {
        id: Uuid::new_v4(),
        ticket_id: id,
        author_id: auth.id,
        author_name: auth.name.clone(),
        author_role: auth.role,
        content: lifecycle::dispute_comment(&req.reason),
        created_at: now,
    };
    conn.transaction::<_, ApiError, _>(|conn| {
        diesel::update(maintenance_tickets::table.find(id))
            .set((
                maintenance_tickets::status.eq(TicketStatus::InProgress),
                maintenance_tickets::confirmation.eq(Some(ConfirmationStatus::Disputed)),
                maintenance_tickets::updated_at.eq(now),
            ))
            .execute(conn)?;
        diesel::insert_into(ticket_comments::table)
            .values(&comment)
            .execute(conn)?;
        Ok(())
    })?;

    chat::publish(
        id,
        ChatEvent {
            id: comment.id,
            content: comment.content.clone(),
            created_at: now,
            user: ChatUser {
                id: auth.id,
                name: auth.name.clone(),
                role: auth.role,
            },
        },
    )
    .await;
    notifications::best_effort(
        "ticket disputed",
        notifications::notify_admins(
            &mut conn,
            "ticket_dispute",
            "Ticket disputed",
            &format!("{} disputed the repair of \"{}\"", auth.name, ticket.subject),
            ticket_link(id),
        ),
    );

    let ticket = load_ticket(&mut conn, id)?;
    Ok(Json(ticket))
}

/// Appends to the comment thread. The first responder to comment
/// claims the ticket atomically; other responders are locked out.
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AddCommentRequest>,
) -> Result<Json<TicketComment>, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("Comment cannot be empty".to_string()));
    }
    let mut conn = state.db()?;
    let ticket = load_ticket(&mut conn, id)?;
    let now = Utc::now();
    let author_is_tenant = auth.id == ticket.tenant_id;

    if !author_is_tenant {
        // Conditional update keeps claiming atomic under concurrent
        // first comments.
        let claimed = diesel::update(
            maintenance_tickets::table
                .find(id)
                .filter(maintenance_tickets::claimed_by.is_null()),
        )
        .set((
            maintenance_tickets::claimed_by.eq(Some(auth.id)),
            maintenance_tickets::updated_at.eq(now),
        ))
        .execute(&mut conn)?;
        if claimed == 0 {
            let current: Option<Uuid> = maintenance_tickets::table
                .find(id)
                .select(maintenance_tickets::claimed_by)
                .first(&mut conn)?;
            if current != Some(auth.id) {
                return Err(ApiError::Unauthorized(
                    "This conversation is restricted to the first responder".to_string(),
                ));
            }
        }
    }

    let comment = TicketComment {
        id: Uuid::new_v4(),
        ticket_id: id,
        author_id: auth.id,
        author_name: auth.name.clone(),
        author_role: auth.role,
        content: req.content,
        created_at: now,
    };
    diesel::insert_into(ticket_comments::table)
        .values(&comment)
        .execute(&mut conn)
        .map_err(|e| ApiError::db("add comment", e))?;

    chat::publish(
        id,
        ChatEvent {
            id: comment.id,
            content: comment.content.clone(),
            created_at: now,
            user: ChatUser {
                id: auth.id,
                name: auth.name.clone(),
                role: auth.role,
            },
        },
    )
    .await;

    let claimant = if author_is_tenant {
        ticket.claimed_by
    } else {
        Some(auth.id)
    };
    if let Some(recipient) = lifecycle::comment_recipient(auth.id, ticket.tenant_id, claimant) {
        notifications::best_effort(
            "ticket comment",
            notifications::notify_user(
                &mut conn,
                recipient,
                "ticket_comment",
                "New message on your ticket",
                &format!("{}: {}", auth.name, comment.content),
                ticket_link(id),
            ),
        );
    }
    Ok(Json(comment))
}

fn can_view(auth: &AuthUser, ticket: &MaintenanceTicket) -> bool {
    match auth.role {
        UserRole::Tenant => ticket.tenant_id == auth.id,
        UserRole::Landlord => ticket.landlord_id == Some(auth.id),
        UserRole::Staff | UserRole::Admin => true,
    }
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MaintenanceTicket>, ApiError> {
    let mut conn = state.db()?;
    let ticket = load_ticket(&mut conn, id)?;
    if !can_view(&auth, &ticket) {
        return Err(ApiError::Unauthorized(
            "You do not have access to this ticket".to_string(),
        ));
    }
    Ok(Json(ticket))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MaintenanceTicket>>, ApiError> {
    let mut conn = state.db()?;
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    let mut q = maintenance_tickets::table.into_boxed();
    match auth.role {
        UserRole::Tenant => q = q.filter(maintenance_tickets::tenant_id.eq(auth.id)),
        UserRole::Landlord => q = q.filter(maintenance_tickets::landlord_id.eq(auth.id)),
        UserRole::Staff | UserRole::Admin => {}
    }
    if let Some(status) = query.status {
        q = q.filter(maintenance_tickets::status.eq(status));
    }

    let tickets: Vec<MaintenanceTicket> = q
        .order(maintenance_tickets::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)
        .map_err(|e| ApiError::db("load tickets", e))?;
    Ok(Json(tickets))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TicketComment>>, ApiError> {
    let mut conn = state.db()?;
    let ticket = load_ticket(&mut conn, id)?;
    if !can_view(&auth, &ticket) {
        return Err(ApiError::Unauthorized(
            "You do not have access to this ticket".to_string(),
        ));
    }
    let comments: Vec<TicketComment> = ticket_comments::table
        .filter(ticket_comments::ticket_id.eq(id))
        .order(ticket_comments::created_at.asc())
        .load(&mut conn)
        .map_err(|e| ApiError::db("load comments", e))?;
    Ok(Json(comments))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/staff", post(create_staff_ticket))
        .route("/api/tickets/:id", get(get_ticket))
        .route("/api/tickets/:id/approve", put(approve_ticket))
        .route("/api/tickets/:id/fix", put(mark_ticket_fixed))
        .route("/api/tickets/:id/confirm", put(confirm_resolution))
        .route("/api/tickets/:id/dispute", put(dispute_ticket))
        .route(
            "/api/tickets/:id/comments",
            get(list_comments).post(add_comment),
        )
        .route("/api/tickets/:id/ws", get(chat::ticket_ws))
}
