//! Transition rules for the maintenance ticket state machine.
//!
//! Everything here is pure so the guard logic can be tested without a
//! database. Persistence glue in the parent module applies the effects
//! inside a transaction.
//!
//! Status: OPEN -> IN_PROGRESS -> AWAITING_CONFIRMATION ->
//! {RESOLVED | IN_PROGRESS (disputed)}. CLOSED is terminal and never
//! produced by these rules.
//! Approval: PENDING_MANAGER -> PENDING_ADMIN -> APPROVED, gated by
//! actor role.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::enums::{ApprovalStatus, PayerType, TicketStatus, UserRole};
use crate::shared::error::ApiError;

/// Approval stage an actor asks to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStage {
    Manager,
    Admin,
}

/// Columns to write when an approval is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalEffect {
    pub approval: ApprovalStatus,
    pub status: Option<TicketStatus>,
}

/// Role-gated approval transition table. Staff may only perform the
/// manager stage. The ticket's current approval state is deliberately
/// not consulted: an admin approval fast-tracks a ticket that never
/// passed the manager stage.
pub fn approval_effect(actor: UserRole, stage: ApprovalStage) -> Result<ApprovalEffect, ApiError> {
    if !actor.is_responder() {
        return Err(ApiError::Unauthorized(
            "This action requires a staff or admin account".to_string(),
        ));
    }
    match stage {
        ApprovalStage::Manager => Ok(ApprovalEffect {
            approval: ApprovalStatus::PendingAdmin,
            status: None,
        }),
        ApprovalStage::Admin => {
            if actor != UserRole::Admin {
                return Err(ApiError::Unauthorized(
                    "Only administrators may grant final approval".to_string(),
                ));
            }
            Ok(ApprovalEffect {
                approval: ApprovalStatus::Approved,
                status: Some(TicketStatus::InProgress),
            })
        }
    }
}

/// Resolution input guards: an artisan must be identified and the cost
/// cannot be negative.
pub fn validate_resolution(
    artisan_name: Option<&str>,
    artisan_phone: Option<&str>,
    cost_cents: Option<i64>,
) -> Result<(), ApiError> {
    let named = artisan_name.map(str::trim).filter(|s| !s.is_empty());
    let phoned = artisan_phone.map(str::trim).filter(|s| !s.is_empty());
    if named.is_none() || phoned.is_none() {
        return Err(ApiError::Validation(
            "Artisan name and phone are required".to_string(),
        ));
    }
    if cost_cents.is_some_and(|c| c < 0) {
        return Err(ApiError::Validation(
            "Cost cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// A landlord expense accrues iff the landlord pays and the cost is
/// positive.
pub fn expense_required(payer: Option<PayerType>, cost_cents: Option<i64>) -> bool {
    payer == Some(PayerType::Landlord) && cost_cents.is_some_and(|c| c > 0)
}

/// The reporting tenant confirms their own ticket; admins may confirm
/// on their behalf.
pub fn can_confirm(actor_id: Uuid, actor_role: UserRole, ticket_tenant: Uuid) -> bool {
    actor_id == ticket_tenant || actor_role == UserRole::Admin
}

pub const DISPUTE_TAG: &str = "[DISPUTE RAISED]";

pub fn dispute_comment(reason: &str) -> String {
    format!("{DISPUTE_TAG} {}", reason.trim())
}

/// Who gets notified about a new comment: the tenant's messages go to
/// the claimant (if any), a responder's messages always go to the
/// reporting tenant.
pub fn comment_recipient(
    author_id: Uuid,
    ticket_tenant: Uuid,
    claimed_by: Option<Uuid>,
) -> Option<Uuid> {
    if author_id == ticket_tenant {
        claimed_by
    } else {
        Some(ticket_tenant)
    }
}
