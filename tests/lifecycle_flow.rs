//! End-to-end ticket lifecycle against a real PostgreSQL database.
//!
//! Skipped when no database is reachable via DATABASE_URL.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{Datelike, Duration, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use std::sync::Arc;
use uuid::Uuid;

use estateserver::auth::AuthUser;
use estateserver::config::AppConfig;
use estateserver::shared::enums::{
    ApprovalStatus, ConfirmationStatus, ExpenseStatus, TicketStatus, UserRole,
};
use estateserver::shared::error::ApiError;
use estateserver::shared::schema::{
    landlord_expenses, leases, maintenance_tickets, properties, rent_cycles, ticket_comments,
    users,
};
use estateserver::shared::state::AppState;
use estateserver::tickets::lifecycle::{ApprovalStage, DISPUTE_TAG};
use estateserver::tickets::{
    add_comment, approve_ticket, confirm_resolution, create_ticket, dispute_ticket,
    mark_ticket_fixed, AddCommentRequest, ApproveTicketRequest, CreateTicketRequest,
    DisputeTicketRequest, FixTicketRequest,
};

const SETUP_SQL: &str = r#"
DROP TABLE IF EXISTS notifications, landlord_expenses, ticket_comments,
    maintenance_tickets, rent_cycles, leases, properties, user_sessions, users;
CREATE TABLE users (
    id UUID PRIMARY KEY,
    email VARCHAR NOT NULL,
    full_name VARCHAR NOT NULL,
    phone VARCHAR,
    role SMALLINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE user_sessions (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE properties (
    id UUID PRIMARY KEY,
    name VARCHAR NOT NULL,
    address TEXT NOT NULL,
    landlord_id UUID,
    parent_id UUID,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE leases (
    id UUID PRIMARY KEY,
    property_id UUID NOT NULL,
    tenant_id UUID NOT NULL,
    rent_amount_cents BIGINT NOT NULL,
    start_date TIMESTAMPTZ NOT NULL,
    end_date TIMESTAMPTZ NOT NULL,
    is_active BOOLEAN NOT NULL
);
CREATE TABLE rent_cycles (
    id UUID PRIMARY KEY,
    landlord_id UUID NOT NULL,
    start_date TIMESTAMPTZ NOT NULL,
    end_date TIMESTAMPTZ NOT NULL,
    status SMALLINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE maintenance_tickets (
    id UUID PRIMARY KEY,
    subject VARCHAR NOT NULL,
    description TEXT NOT NULL,
    category VARCHAR,
    priority VARCHAR NOT NULL,
    status SMALLINT NOT NULL,
    approval_status SMALLINT NOT NULL,
    requires_approval BOOLEAN NOT NULL,
    claimed_by UUID,
    confirmation SMALLINT,
    resolution_note TEXT,
    resolution_date TIMESTAMPTZ,
    cost_cents BIGINT,
    artisan_name VARCHAR,
    artisan_phone VARCHAR,
    payer_type SMALLINT,
    property_id UUID NOT NULL,
    landlord_id UUID,
    rent_cycle_id UUID,
    tenant_id UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE ticket_comments (
    id UUID PRIMARY KEY,
    ticket_id UUID NOT NULL,
    author_id UUID NOT NULL,
    author_name VARCHAR NOT NULL,
    author_role SMALLINT NOT NULL,
    content TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE landlord_expenses (
    id UUID PRIMARY KEY,
    ticket_id UUID NOT NULL UNIQUE,
    landlord_id UUID NOT NULL,
    rent_cycle_id UUID,
    amount_cents BIGINT NOT NULL,
    status SMALLINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE notifications (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    kind VARCHAR NOT NULL,
    title VARCHAR NOT NULL,
    message TEXT NOT NULL,
    link VARCHAR,
    is_read BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
"#;

fn seed_user(conn: &mut PgConnection, name: &str, role: UserRole) -> Uuid {
    let id = Uuid::new_v4();
    diesel::insert_into(users::table)
        .values((
            users::id.eq(id),
            users::email.eq(format!("{}@example.test", name.to_lowercase())),
            users::full_name.eq(name),
            users::phone.eq(None::<String>),
            users::role.eq(role),
            users::created_at.eq(Utc::now()),
        ))
        .execute(conn)
        .unwrap();
    id
}

fn auth(id: Uuid, name: &str, role: UserRole) -> AuthUser {
    AuthUser {
        id,
        name: name.to_string(),
        role,
    }
}

#[tokio::test]
async fn full_ticket_lifecycle() {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://estate:@localhost:5432/estateserver".to_string());
    let mut probe = match PgConnection::establish(&url) {
        Ok(conn) => conn,
        Err(_) => {
            println!("Skipping test - PostgreSQL not available");
            return;
        }
    };
    probe.batch_execute(SETUP_SQL).unwrap();

    let manager = ConnectionManager::<PgConnection>::new(url);
    let pool = Pool::builder().max_size(2).build(manager).unwrap();
    let state = Arc::new(AppState::new(pool, AppConfig::from_env().unwrap()));
    let mut conn = state.conn.get().unwrap();

    let tenant_id = seed_user(&mut conn, "Tola Tenant", UserRole::Tenant);
    let landlord_id = seed_user(&mut conn, "Lara Landlord", UserRole::Landlord);
    let staff_id = seed_user(&mut conn, "Sade Staff", UserRole::Staff);
    let admin_id = seed_user(&mut conn, "Abu Admin", UserRole::Admin);
    let stranger_id = seed_user(&mut conn, "Seyi Staff", UserRole::Staff);

    let parent_property = Uuid::new_v4();
    let unit = Uuid::new_v4();
    diesel::insert_into(properties::table)
        .values(vec![
            (
                properties::id.eq(parent_property),
                properties::name.eq("Palm Court"),
                properties::address.eq("1 Palm Road"),
                properties::landlord_id.eq(Some(landlord_id)),
                properties::parent_id.eq(None::<Uuid>),
                properties::created_at.eq(Utc::now()),
            ),
            (
                properties::id.eq(unit),
                properties::name.eq("Palm Court Flat 2"),
                properties::address.eq("1 Palm Road, Flat 2"),
                properties::landlord_id.eq(None::<Uuid>),
                properties::parent_id.eq(Some(parent_property)),
                properties::created_at.eq(Utc::now()),
            ),
        ])
        .execute(&mut conn)
        .unwrap();

    let tenant = auth(tenant_id, "Tola Tenant", UserRole::Tenant);
    let staff = auth(staff_id, "Sade Staff", UserRole::Staff);
    let admin = auth(admin_id, "Abu Admin", UserRole::Admin);

    // No lease yet: creation fails and writes nothing.
    let err = create_ticket(
        State(state.clone()),
        tenant.clone(),
        Json(CreateTicketRequest {
            subject: "Leaking tap".to_string(),
            description: "Kitchen tap leaks".to_string(),
            category: Some("plumbing".to_string()),
        }),
    )
    .await
    .unwrap_err();
    match err {
        ApiError::Validation(msg) => assert_eq!(msg, "No active lease found"),
        other => panic!("unexpected error: {other:?}"),
    }
    let count: i64 = maintenance_tickets::table
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(count, 0);

    diesel::insert_into(leases::table)
        .values((
            leases::id.eq(Uuid::new_v4()),
            leases::property_id.eq(unit),
            leases::tenant_id.eq(tenant_id),
            leases::rent_amount_cents.eq(150_000_00_i64),
            leases::start_date.eq(Utc::now() - Duration::days(30)),
            leases::end_date.eq(Utc::now() + Duration::days(335)),
            leases::is_active.eq(true),
        ))
        .execute(&mut conn)
        .unwrap();

    // Creation resolves the landlord through the parent property and
    // establishes a rent cycle spanning the current month.
    let Json(ticket) = create_ticket(
        State(state.clone()),
        tenant.clone(),
        Json(CreateTicketRequest {
            subject: "Leaking tap".to_string(),
            description: "Kitchen tap leaks".to_string(),
            category: Some("plumbing".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.approval_status, ApprovalStatus::PendingManager);
    assert!(ticket.requires_approval);
    assert_eq!(ticket.landlord_id, Some(landlord_id));

    let cycle: (Uuid, chrono::DateTime<Utc>, chrono::DateTime<Utc>) = rent_cycles::table
        .filter(rent_cycles::landlord_id.eq(landlord_id))
        .select((
            rent_cycles::id,
            rent_cycles::start_date,
            rent_cycles::end_date,
        ))
        .first(&mut conn)
        .unwrap();
    assert_eq!(ticket.rent_cycle_id, Some(cycle.0));
    let now = Utc::now();
    assert_eq!(cycle.1.month(), now.month());
    assert_eq!(cycle.1.day(), 1);
    assert!(cycle.2 >= now);

    // A second ticket reuses the open cycle.
    let Json(second) = create_ticket(
        State(state.clone()),
        tenant.clone(),
        Json(CreateTicketRequest {
            subject: "Broken window".to_string(),
            description: "Bedroom window cracked".to_string(),
            category: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(second.rent_cycle_id, Some(cycle.0));

    // Staff cannot grant the admin stage; nothing changes.
    let err = approve_ticket(
        State(state.clone()),
        staff.clone(),
        Path(ticket.id),
        Json(ApproveTicketRequest {
            stage: ApprovalStage::Admin,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
    let approval: ApprovalStatus = maintenance_tickets::table
        .find(ticket.id)
        .select(maintenance_tickets::approval_status)
        .first(&mut conn)
        .unwrap();
    assert_eq!(approval, ApprovalStatus::PendingManager);

    // Manager stage by staff, then final approval by admin.
    let Json(after_manager) = approve_ticket(
        State(state.clone()),
        staff.clone(),
        Path(ticket.id),
        Json(ApproveTicketRequest {
            stage: ApprovalStage::Manager,
        }),
    )
    .await
    .unwrap();
    assert_eq!(after_manager.approval_status, ApprovalStatus::PendingAdmin);
    assert_eq!(after_manager.status, TicketStatus::Open);

    let Json(after_admin) = approve_ticket(
        State(state.clone()),
        admin.clone(),
        Path(ticket.id),
        Json(ApproveTicketRequest {
            stage: ApprovalStage::Admin,
        }),
    )
    .await
    .unwrap();
    assert_eq!(after_admin.approval_status, ApprovalStatus::Approved);
    assert_eq!(after_admin.status, TicketStatus::InProgress);

    // First responder comment claims the ticket; a second responder is
    // locked out.
    let Json(_comment) = add_comment(
        State(state.clone()),
        staff.clone(),
        Path(ticket.id),
        Json(AddCommentRequest {
            content: "On my way with a plumber".to_string(),
        }),
    )
    .await
    .unwrap();
    let claimed: Option<Uuid> = maintenance_tickets::table
        .find(ticket.id)
        .select(maintenance_tickets::claimed_by)
        .first(&mut conn)
        .unwrap();
    assert_eq!(claimed, Some(staff_id));

    let err = add_comment(
        State(state.clone()),
        auth(stranger_id, "Seyi Staff", UserRole::Staff),
        Path(ticket.id),
        Json(AddCommentRequest {
            content: "I can take this one".to_string(),
        }),
    )
    .await
    .unwrap_err();
    match err {
        ApiError::Unauthorized(msg) => assert!(msg.contains("restricted to the first responder")),
        other => panic!("unexpected error: {other:?}"),
    }

    // The tenant may keep commenting.
    add_comment(
        State(state.clone()),
        tenant.clone(),
        Path(ticket.id),
        Json(AddCommentRequest {
            content: "Thank you".to_string(),
        }),
    )
    .await
    .unwrap();

    // Negative cost is rejected and accrues no expense.
    let err = mark_ticket_fixed(
        State(state.clone()),
        staff.clone(),
        Path(ticket.id),
        Json(FixTicketRequest {
            resolution_note: None,
            cost_cents: Some(-1),
            artisan_name: Some("Ade Plumbing".to_string()),
            artisan_phone: Some("+2348010000000".to_string()),
            payer_type: Some(estateserver::shared::enums::PayerType::Landlord),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    let expenses: i64 = landlord_expenses::table
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(expenses, 0);

    // Marking fixed with a landlord-paid cost accrues one pending
    // expense; repeating it stays at one.
    let fix = FixTicketRequest {
        resolution_note: Some("Replaced the valve".to_string()),
        cost_cents: Some(250000),
        artisan_name: Some("Ade Plumbing".to_string()),
        artisan_phone: Some("+2348010000000".to_string()),
        payer_type: Some(estateserver::shared::enums::PayerType::Landlord),
    };
    let Json(fixed) = mark_ticket_fixed(
        State(state.clone()),
        staff.clone(),
        Path(ticket.id),
        Json(fix_clone(&fix)),
    )
    .await
    .unwrap();
    assert_eq!(fixed.status, TicketStatus::AwaitingConfirmation);
    assert_eq!(fixed.confirmation, Some(ConfirmationStatus::Pending));

    // A repeated resolution (same outcome as two racing writers) does
    // not add or overwrite the expense.
    let mut repeat = fix;
    repeat.cost_cents = Some(999999);
    mark_ticket_fixed(
        State(state.clone()),
        staff.clone(),
        Path(ticket.id),
        Json(repeat),
    )
    .await
    .unwrap();
    let expense_rows: Vec<(Uuid, ExpenseStatus, i64)> = landlord_expenses::table
        .filter(landlord_expenses::ticket_id.eq(ticket.id))
        .select((
            landlord_expenses::id,
            landlord_expenses::status,
            landlord_expenses::amount_cents,
        ))
        .load(&mut conn)
        .unwrap();
    assert_eq!(expense_rows.len(), 1);
    assert_eq!(expense_rows[0].1, ExpenseStatus::Pending);
    assert_eq!(expense_rows[0].2, 250000);

    // Confirmation resolves the ticket and approves the expense.
    let Json(confirmed) = confirm_resolution(
        State(state.clone()),
        tenant.clone(),
        Path(ticket.id),
    )
    .await
    .unwrap();
    assert_eq!(confirmed.status, TicketStatus::Resolved);
    assert_eq!(confirmed.confirmation, Some(ConfirmationStatus::Confirmed));
    let expense_status: ExpenseStatus = landlord_expenses::table
        .filter(landlord_expenses::ticket_id.eq(ticket.id))
        .select(landlord_expenses::status)
        .first(&mut conn)
        .unwrap();
    assert_eq!(expense_status, ExpenseStatus::Approved);

    // Dispute path on the second ticket: reopened with a tagged
    // comment on the thread.
    mark_ticket_fixed(
        State(state.clone()),
        staff.clone(),
        Path(second.id),
        Json(FixTicketRequest {
            resolution_note: None,
            cost_cents: None,
            artisan_name: Some("Glass Co".to_string()),
            artisan_phone: Some("+2348020000000".to_string()),
            payer_type: None,
        }),
    )
    .await
    .unwrap();
    let Json(disputed) = dispute_ticket(
        State(state.clone()),
        tenant.clone(),
        Path(second.id),
        Json(DisputeTicketRequest {
            reason: "Crack is still visible".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(disputed.status, TicketStatus::InProgress);
    assert_eq!(disputed.confirmation, Some(ConfirmationStatus::Disputed));
    let dispute_note: String = ticket_comments::table
        .filter(ticket_comments::ticket_id.eq(second.id))
        .order(ticket_comments::created_at.desc())
        .select(ticket_comments::content)
        .first(&mut conn)
        .unwrap();
    assert!(dispute_note.starts_with(DISPUTE_TAG));

    // Confirming a ticket with no expense leaves expenses untouched.
    let Json(confirmed_second) = confirm_resolution(
        State(state.clone()),
        admin.clone(),
        Path(second.id),
    )
    .await
    .unwrap();
    assert_eq!(confirmed_second.status, TicketStatus::Resolved);
    let total_expenses: i64 = landlord_expenses::table
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(total_expenses, 1);

    // Delivery is best-effort: with the notifications table gone,
    // every fan-out fails, yet the primary actions still succeed.
    conn.batch_execute("DROP TABLE notifications").unwrap();
    let Json(third) = create_ticket(
        State(state.clone()),
        tenant.clone(),
        Json(CreateTicketRequest {
            subject: "Faulty socket".to_string(),
            description: "Living room socket sparks".to_string(),
            category: Some("electrical".to_string()),
        }),
    )
    .await
    .unwrap();
    let written: i64 = maintenance_tickets::table
        .filter(maintenance_tickets::id.eq(third.id))
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(written, 1);

    let Json(third_fixed) = mark_ticket_fixed(
        State(state.clone()),
        staff.clone(),
        Path(third.id),
        Json(FixTicketRequest {
            resolution_note: Some("Rewired the socket".to_string()),
            cost_cents: Some(40000),
            artisan_name: Some("Volt Works".to_string()),
            artisan_phone: Some("+2348030000000".to_string()),
            payer_type: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(third_fixed.status, TicketStatus::AwaitingConfirmation);
}

fn fix_clone(req: &FixTicketRequest) -> FixTicketRequest {
    FixTicketRequest {
        resolution_note: req.resolution_note.clone(),
        cost_cents: req.cost_cents,
        artisan_name: req.artisan_name.clone(),
        artisan_phone: req.artisan_phone.clone(),
        payer_type: req.payer_type,
    }
}
