//! Session/class link entity - many-to-many association between session
//! templates and class offerings, each link independently active.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Session/class link database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "session_class_links")]
pub struct Model {
    /// Unique identifier for the link
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Linked session template
    pub session_id: i64,
    /// Linked class offering
    pub class_id: i64,
    /// Whether the class is currently bookable through this session
    pub is_active: bool,
}

/// Defines relationships between `SessionClassLink` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each link belongs to one session
    #[sea_orm(
        belongs_to = "super::session_template::Entity",
        from = "Column::SessionId",
        to = "super::session_template::Column::Id"
    )]
    Session,
    /// Each link belongs to one class
    #[sea_orm(
        belongs_to = "super::class_offering::Entity",
        from = "Column::ClassId",
        to = "super::class_offering::Column::Id"
    )]
    Class,
}

impl Related<super::session_template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::class_offering::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
