//! Credit balance entity - materialized per-user, per-group credit totals.
//!
//! Rows are only ever written by [`crate::core::credit`] in the same database
//! transaction as the [`super::credit_transaction`] row that explains the change.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::errors::Error;

/// Category of pre-purchased credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditGroup {
    /// Group-class credit
    Group,
    /// Private-class credit
    Private,
    /// No credit involved
    #[default]
    None,
}

impl CreditGroup {
    /// Stored column value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Private => "private",
            Self::None => "none",
        }
    }

    /// Whether balances can exist for this group.
    #[must_use]
    pub const fn holds_balance(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for CreditGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreditGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" => Ok(Self::Group),
            "private" => Ok(Self::Private),
            "none" => Ok(Self::None),
            other => Err(Error::validation(format!("unknown credit group '{other}'"))),
        }
    }
}

/// Credit balance database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_balances")]
pub struct Model {
    /// Unique identifier for the balance row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the credits
    pub user_id: String,
    /// `"group"` or `"private"`
    pub credit_group: String,
    /// Credits still available to spend, never negative
    pub remaining_credits: i64,
    /// Credits ever issued to this user/group
    pub total_issued: i64,
    /// When the balance last changed
    pub updated_at: DateTimeUtc,
}

/// `CreditBalance` has no navigable relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
