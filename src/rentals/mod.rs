//! Rent cycles and landlord expenses.
//!
//! A rent cycle is a landlord-scoped calendar-month accounting window.
//! Cycles are established lazily by ticket creation and reused while
//! still open. Expenses accrue against a ticket at resolution time and
//! become payable only on tenant confirmation.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::shared::enums::{ExpenseStatus, RentCycleStatus, UserRole};
use crate::shared::error::ApiError;
use crate::shared::schema::{landlord_expenses, rent_cycles};
use crate::shared::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = rent_cycles)]
#[serde(rename_all = "camelCase")]
pub struct RentCycle {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: RentCycleStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = landlord_expenses)]
#[serde(rename_all = "camelCase")]
pub struct LandlordExpense {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub landlord_id: Uuid,
    pub rent_cycle_id: Option<Uuid>,
    pub amount_cents: i64,
    pub status: ExpenseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Calendar month containing `now`: first instant of the month through
/// the last second of its final day.
pub fn month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
        - Duration::seconds(1);
    (start, end)
}

/// Idempotent upsert-by-window: returns the landlord's open cycle that
/// has not yet expired, or creates one spanning the current calendar
/// month.
pub fn establish_rent_cycle(conn: &mut PgConnection, landlord: Uuid) -> QueryResult<RentCycle> {
    let now = Utc::now();
    let existing: Option<RentCycle> = rent_cycles::table
        .filter(rent_cycles::landlord_id.eq(landlord))
        .filter(rent_cycles::status.eq(RentCycleStatus::Open))
        .filter(rent_cycles::end_date.ge(now))
        .order(rent_cycles::start_date.desc())
        .first(conn)
        .optional()?;
    if let Some(cycle) = existing {
        return Ok(cycle);
    }

    let (start_date, end_date) = month_window(now);
    let cycle = RentCycle {
        id: Uuid::new_v4(),
        landlord_id: landlord,
        start_date,
        end_date,
        status: RentCycleStatus::Open,
        created_at: now,
    };
    diesel::insert_into(rent_cycles::table)
        .values(&cycle)
        .execute(conn)?;
    Ok(cycle)
}

#[derive(Debug, Deserialize)]
pub struct ExpenseListQuery {
    pub status: Option<ExpenseStatus>,
    pub landlord_id: Option<Uuid>,
}

pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ExpenseListQuery>,
) -> Result<Json<Vec<LandlordExpense>>, ApiError> {
    let mut conn = state.db()?;
    let mut q = landlord_expenses::table.into_boxed();
    match auth.role {
        UserRole::Landlord => q = q.filter(landlord_expenses::landlord_id.eq(auth.id)),
        UserRole::Staff | UserRole::Admin => {
            if let Some(landlord) = query.landlord_id {
                q = q.filter(landlord_expenses::landlord_id.eq(landlord));
            }
        }
        UserRole::Tenant => {
            return Err(ApiError::Unauthorized(
                "Expenses are visible to landlords and staff only".to_string(),
            ))
        }
    }
    if let Some(status) = query.status {
        q = q.filter(landlord_expenses::status.eq(status));
    }
    let rows: Vec<LandlordExpense> = q
        .order(landlord_expenses::created_at.desc())
        .load(&mut conn)
        .map_err(|e| ApiError::db("load expenses", e))?;
    Ok(Json(rows))
}

pub async fn list_rent_cycles(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<RentCycle>>, ApiError> {
    let mut conn = state.db()?;
    let mut q = rent_cycles::table.into_boxed();
    match auth.role {
        UserRole::Landlord => q = q.filter(rent_cycles::landlord_id.eq(auth.id)),
        UserRole::Staff | UserRole::Admin => {}
        UserRole::Tenant => {
            return Err(ApiError::Unauthorized(
                "Rent cycles are visible to landlords and staff only".to_string(),
            ))
        }
    }
    let rows: Vec<RentCycle> = q
        .order(rent_cycles::start_date.desc())
        .load(&mut conn)
        .map_err(|e| ApiError::db("load rent cycles", e))?;
    Ok(Json(rows))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/rentals/cycles", get(list_rent_cycles))
        .route("/api/rentals/expenses", get(list_expenses))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_spans_the_whole_month() {
        let now = Utc.with_ymd_and_hms(2026, 8, 23, 14, 30, 0).unwrap();
        let (start, end) = month_window(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 8, 31, 23, 59, 59).unwrap());
    }

    #[test]
    fn window_handles_december_rollover() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).unwrap();
        let (start, end) = month_window(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap());
    }

    #[test]
    fn window_handles_february() {
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        let (_, end) = month_window(now);
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap());
    }
}
