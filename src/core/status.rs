//! Status transitions for the administrative surface.
//!
//! Wraps cancel/reactivate behind one entry point that takes the desired status plus
//! the operator's credit flags and reports, in words, what happened to the customer's
//! credit. Holds no state; all writes go through [`super::registration`].

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use super::registration;
use crate::{
    entities::{CreditGroup, RegistrationStatus, registration as registration_entity},
    errors::{Error, Result},
};

/// Requested status change with the operator's credit policy for it.
///
/// `return_credit` only applies to cancellation and `deduct_credit` only to
/// reactivation; the other flag is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StatusChange {
    /// Target status
    pub status: RegistrationStatus,
    /// Give a credit-paid booking its credit back on cancel
    #[serde(default)]
    pub return_credit: bool,
    /// Charge one credit on reactivation
    #[serde(default)]
    pub deduct_credit: bool,
}

/// What a status change does to the customer's credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CreditEffect {
    /// The balance is untouched
    Unchanged,
    /// One credit goes back to the group
    Returned {
        /// Group credited
        group: CreditGroup,
    },
    /// The booking was paid with credit and the operator keeps it consumed
    Consumed {
        /// Group the credit was drawn from
        group: CreditGroup,
    },
    /// One credit is charged from the group
    Deducted {
        /// Group debited
        group: CreditGroup,
    },
}

impl CreditEffect {
    /// Confirmation text for `user_id` when moving to `status`.
    #[must_use]
    pub fn describe(self, status: RegistrationStatus, user_id: &str) -> String {
        let action = match status {
            RegistrationStatus::Active => "Registration reactivated",
            RegistrationStatus::Cancelled => "Registration cancelled",
        };
        match self {
            Self::Unchanged if status == RegistrationStatus::Cancelled => {
                format!("{action}; no credit was used, so {user_id}'s balance is unchanged.")
            }
            Self::Unchanged => format!("{action}; no credit deducted from {user_id}."),
            Self::Returned { group } => {
                format!("{action}; 1 {group} credit returned to {user_id}.")
            }
            Self::Consumed { group } => format!(
                "{action}; {user_id}'s {group} credit is consumed and not returned."
            ),
            Self::Deducted { group } => {
                format!("{action}; 1 {group} credit deducted from {user_id}.")
            }
        }
    }
}

/// Result of a previewed or applied status change.
#[derive(Debug, Clone, Serialize)]
pub struct StatusTransitionOutcome {
    /// Registration after the change (unchanged for a preview)
    pub registration: registration_entity::Model,
    /// Effect on the customer's credit
    pub credit_effect: CreditEffect,
    /// Human-readable summary for confirmation dialogs
    pub summary: String,
}

/// Works out the credit effect of `change`, rejecting no-op transitions.
pub fn plan_credit_effect(
    current: &registration_entity::Model,
    change: StatusChange,
) -> Result<CreditEffect> {
    if current.status() == change.status {
        return Err(Error::validation(format!(
            "registration {} is already {}",
            current.id, change.status
        )));
    }
    if change.status == RegistrationStatus::Active
        && change.deduct_credit
        && !current.credit_group().holds_balance()
    {
        return Err(Error::validation(format!(
            "registration {} has no credit group to deduct from",
            current.id
        )));
    }
    Ok(credit_effect_of(current, change))
}

/// Effect of `change` on a registration row; on a row written by the change itself
/// this is what the ledger actually did.
fn credit_effect_of(registration: &registration_entity::Model, change: StatusChange) -> CreditEffect {
    let group = registration.credit_group();
    match change.status {
        RegistrationStatus::Cancelled if !registration.used_credit => CreditEffect::Unchanged,
        RegistrationStatus::Cancelled if change.return_credit => CreditEffect::Returned { group },
        RegistrationStatus::Cancelled => CreditEffect::Consumed { group },
        RegistrationStatus::Active if change.deduct_credit => CreditEffect::Deducted { group },
        RegistrationStatus::Active => CreditEffect::Unchanged,
    }
}

/// Describes what [`apply_status_change`] would do without writing anything.
pub async fn preview_status_change(
    db: &DatabaseConnection,
    registration_id: i64,
    change: StatusChange,
) -> Result<StatusTransitionOutcome> {
    let current = registration::require_registration(db, registration_id).await?;
    let credit_effect = plan_credit_effect(&current, change)?;
    let summary = credit_effect.describe(change.status, &current.user_id);
    Ok(StatusTransitionOutcome {
        registration: current,
        credit_effect,
        summary,
    })
}

/// Moves a registration to `change.status` with the requested credit policy.
///
/// Validation and the credit effect both come from the ledger transaction, so the
/// reported effect always matches the row that was written. Capacity, duplicate and
/// balance rejections are passed through unchanged.
pub async fn apply_status_change(
    db: &DatabaseConnection,
    registration_id: i64,
    change: StatusChange,
) -> Result<StatusTransitionOutcome> {
    let updated = match change.status {
        RegistrationStatus::Cancelled => {
            registration::cancel_registration(db, registration_id, change.return_credit).await?
        }
        RegistrationStatus::Active => {
            registration::reactivate_registration(db, registration_id, change.deduct_credit)
                .await?
        }
    };

    let credit_effect = credit_effect_of(&updated, change);
    let summary = credit_effect.describe(change.status, &updated.user_id);
    Ok(StatusTransitionOutcome {
        registration: updated,
        credit_effect,
        summary,
    })
}
