//! Class offering entity - the bookable product a customer pays for.
//!
//! A class carries the price and curriculum; it is attached to one or more
//! session templates through [`super::session_class_link`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class offering database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "class_offerings")]
pub struct Model {
    /// Unique identifier for the class
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Class name (e.g., "Beginner Pilates")
    #[sea_orm(unique)]
    pub name: String,
    /// Curriculum description
    pub description: String,
    /// Drop-in price in dollars
    pub price: f64,
    /// Soft delete flag
    pub is_active: bool,
    /// When the class was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ClassOffering` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One class has many session links
    #[sea_orm(has_many = "super::session_class_link::Entity")]
    SessionLinks,
}

impl Related<super::session_class_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SessionLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
