//! Domain enums stored as PostgreSQL SMALLINT columns.
//!
//! Each enum maps to a stable i16 discriminant so rows stay readable
//! across releases. All enums derive the traits needed for Diesel ORM
//! integration and serde payloads.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::SmallInt;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Account roles. Staff can work tickets but only administrators can
/// grant final approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum UserRole {
    Tenant = 0,
    Landlord = 1,
    Staff = 2,
    Admin = 3,
}

impl UserRole {
    pub fn is_responder(self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }
}

impl ToSql<SmallInt, Pg> for UserRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for UserRole {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match i16::from_sql(bytes)? {
            0 => Ok(Self::Tenant),
            1 => Ok(Self::Landlord),
            2 => Ok(Self::Staff),
            3 => Ok(Self::Admin),
            v => Err(format!("Unrecognized UserRole value: {v}").into()),
        }
    }
}

/// Primary ticket lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TicketStatus {
    Open = 0,
    InProgress = 1,
    AwaitingConfirmation = 2,
    Resolved = 3,
    Closed = 4,
}

impl ToSql<SmallInt, Pg> for TicketStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for TicketStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match i16::from_sql(bytes)? {
            0 => Ok(Self::Open),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::AwaitingConfirmation),
            3 => Ok(Self::Resolved),
            4 => Ok(Self::Closed),
            v => Err(format!("Unrecognized TicketStatus value: {v}").into()),
        }
    }
}

/// Approval sub-state. Only ever advances forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum ApprovalStatus {
    PendingManager = 0,
    PendingAdmin = 1,
    Approved = 2,
}

impl ToSql<SmallInt, Pg> for ApprovalStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for ApprovalStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match i16::from_sql(bytes)? {
            0 => Ok(Self::PendingManager),
            1 => Ok(Self::PendingAdmin),
            2 => Ok(Self::Approved),
            v => Err(format!("Unrecognized ApprovalStatus value: {v}").into()),
        }
    }
}

/// Tenant confirmation state after a ticket is marked fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum ConfirmationStatus {
    Pending = 0,
    Confirmed = 1,
    Disputed = 2,
}

impl ToSql<SmallInt, Pg> for ConfirmationStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for ConfirmationStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match i16::from_sql(bytes)? {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Confirmed),
            2 => Ok(Self::Disputed),
            v => Err(format!("Unrecognized ConfirmationStatus value: {v}").into()),
        }
    }
}

/// Who pays for a repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum PayerType {
    Landlord = 0,
    Company = 1,
}

impl ToSql<SmallInt, Pg> for PayerType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for PayerType {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match i16::from_sql(bytes)? {
            0 => Ok(Self::Landlord),
            1 => Ok(Self::Company),
            v => Err(format!("Unrecognized PayerType value: {v}").into()),
        }
    }
}

/// A landlord expense becomes payable only once the tenant confirms
/// the repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum ExpenseStatus {
    Pending = 0,
    Approved = 1,
}

impl ToSql<SmallInt, Pg> for ExpenseStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for ExpenseStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match i16::from_sql(bytes)? {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Approved),
            v => Err(format!("Unrecognized ExpenseStatus value: {v}").into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum RentCycleStatus {
    Open = 0,
    Closed = 1,
}

impl ToSql<SmallInt, Pg> for RentCycleStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for RentCycleStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match i16::from_sql(bytes)? {
            0 => Ok(Self::Open),
            1 => Ok(Self::Closed),
            v => Err(format!("Unrecognized RentCycleStatus value: {v}").into()),
        }
    }
}
