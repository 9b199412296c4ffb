//! Credit transaction entity - append-only audit log of every balance change.
//!
//! The signed sum of `delta` over a (user, group) always equals the materialized
//! `remaining_credits` on the matching [`super::credit_balance`] row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::errors::Error;

/// Why a credit transaction was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditReason {
    /// Credits purchased or granted
    Issue,
    /// One credit consumed by a booking (or a reactivation)
    BookingDebit,
    /// Credit handed back when a booking was cancelled
    CancelCredit,
    /// Operator correction, either sign
    ManualAdjustment,
}

impl CreditReason {
    /// Stored column value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::BookingDebit => "booking_debit",
            Self::CancelCredit => "cancel_credit",
            Self::ManualAdjustment => "manual_adjustment",
        }
    }
}

impl fmt::Display for CreditReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreditReason {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue" => Ok(Self::Issue),
            "booking_debit" => Ok(Self::BookingDebit),
            "cancel_credit" => Ok(Self::CancelCredit),
            "manual_adjustment" => Ok(Self::ManualAdjustment),
            other => Err(Error::validation(format!("unknown credit reason '{other}'"))),
        }
    }
}

/// Credit transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the credits
    pub user_id: String,
    /// `"group"` or `"private"`
    pub credit_group: String,
    /// Signed change in credits (negative for debits)
    pub delta: i64,
    /// One of the [`CreditReason`] names
    pub reason: String,
    /// Registration that caused the change, if any
    pub registration_id: Option<i64>,
    /// Operator note for manual entries
    pub note: Option<String>,
    /// When the transaction was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `CreditTransaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A transaction may be linked to the registration that caused it
    #[sea_orm(
        belongs_to = "super::registration::Entity",
        from = "Column::RegistrationId",
        to = "super::registration::Column::Id"
    )]
    Registration,
}

impl Related<super::registration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Registration.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
