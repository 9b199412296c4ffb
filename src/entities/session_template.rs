//! Session template entity - a recurring weekly class definition.
//!
//! A template names the time window, the weekdays it runs on (stored as a bitmask,
//! see [`crate::core::schedule::WeekdaySet`]) and the capacity of every occurrence.
//! Templates are never physically deleted; `is_active` is the soft-delete flag.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::schedule::WeekdaySet;

/// Session template database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "session_templates")]
pub struct Model {
    /// Unique identifier for the session
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Morning Flow")
    pub name: String,
    /// Free-form description shown to customers
    pub description: String,
    /// Local start time of every occurrence
    pub start_time: Time,
    /// Local end time of every occurrence
    pub end_time: Time,
    /// Weekdays the session runs on, bit 0 = Sunday through bit 6 = Saturday
    pub weekday_mask: i32,
    /// Maximum number of active registrations per occurrence
    pub max_capacity: i32,
    /// Room or studio location
    pub location: String,
    /// Soft delete flag - inactive sessions have no occurrences
    pub is_active: bool,
    /// When the session was created
    pub created_at: DateTimeUtc,
    /// When the session was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Weekdays this session runs on.
    #[must_use]
    pub fn weekdays(&self) -> WeekdaySet {
        WeekdaySet::from_mask(self.weekday_mask)
    }
}

/// Defines relationships between `SessionTemplate` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One session has many class links
    #[sea_orm(has_many = "super::session_class_link::Entity")]
    ClassLinks,
    /// One session has many registrations
    #[sea_orm(has_many = "super::registration::Entity")]
    Registrations,
}

impl Related<super::session_class_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClassLinks.def()
    }
}

impl Related<super::registration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Registrations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
