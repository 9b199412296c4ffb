//! Slot lock entity - one row per (session, date, time) that has ever been booked.
//!
//! Booking and reactivation transactions bump `version` before counting active
//! registrations, so two writers for the same slot are serialized on this row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Slot lock database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "slot_locks")]
pub struct Model {
    /// Unique identifier for the lock row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Session of the slot
    pub session_id: i64,
    /// Calendar date of the slot
    pub slot_date: Date,
    /// Start time of the slot
    pub slot_time: Time,
    /// Incremented by every writer that takes the lock
    pub version: i64,
    /// Last time a writer took the lock
    pub updated_at: DateTimeUtc,
}

/// `SlotLock` has no navigable relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
