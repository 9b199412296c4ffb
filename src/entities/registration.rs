//! Registration entity - a user's booking of one session occurrence.
//!
//! `status` is the only column mutated after creation. The text columns `status`,
//! `credit_group` and `payment_method` hold the snake-case names of their enums;
//! use [`Model::status`] and [`Model::credit_group`] to read them back typed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::credit_balance::CreditGroup;
use crate::errors::Error;

/// Lifecycle state of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Holds a spot in its slot
    Active,
    /// Released its spot
    Cancelled,
}

impl RegistrationStatus {
    /// Stored column value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::validation(format!(
                "unknown registration status '{other}'"
            ))),
        }
    }
}

/// Registration database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "registrations")]
pub struct Model {
    /// Unique identifier for the registration
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Booking user
    pub user_id: String,
    /// Booked session template
    pub session_id: i64,
    /// Class the customer is paying for
    pub class_id: i64,
    /// Occurrence date
    pub selected_date: Date,
    /// Occurrence start time
    pub selected_time: Time,
    /// `"active"` or `"cancelled"`
    pub status: String,
    /// Price charged at booking time (0 when paid with credit)
    pub purchase_price: f64,
    /// Whether a credit was debited for this booking
    pub used_credit: bool,
    /// `"group"`, `"private"` or `"none"`
    pub credit_group: String,
    /// Free-form payment method label (e.g., `"card"`, `"credit"`)
    pub payment_method: String,
    /// When the booking was made
    pub created_at: DateTimeUtc,
    /// When the status last changed
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Typed status; unknown stored values read as cancelled so they never hold a spot.
    #[must_use]
    pub fn status(&self) -> RegistrationStatus {
        self.status
            .parse()
            .unwrap_or(RegistrationStatus::Cancelled)
    }

    /// Typed credit group; unknown stored values read as [`CreditGroup::None`].
    #[must_use]
    pub fn credit_group(&self) -> CreditGroup {
        self.credit_group.parse().unwrap_or(CreditGroup::None)
    }

    /// Whether this registration currently holds a spot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status() == RegistrationStatus::Active
    }
}

/// Defines relationships between Registration and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each registration belongs to one session
    #[sea_orm(
        belongs_to = "super::session_template::Entity",
        from = "Column::SessionId",
        to = "super::session_template::Column::Id"
    )]
    Session,
    /// A registration has the credit transactions it caused
    #[sea_orm(has_many = "super::credit_transaction::Entity")]
    CreditTransactions,
}

impl Related<super::session_template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::credit_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CreditTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
