//! Session business logic - session templates, class offerings and their links.
//!
//! Administrators create and edit templates here; nothing in this module computes
//! occurrences or capacity. Templates and classes are soft-deleted only, because
//! registrations keep referring to them.

use chrono::NaiveTime;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::{info, instrument};

use super::schedule::WeekdaySet;
use crate::{
    entities::{
        ClassOffering, SessionClassLink, SessionTemplate, class_offering, session_class_link,
        session_template,
    },
    errors::{Error, Result},
};

/// Editable fields of a session template.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionArgs {
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Local start time
    pub start_time: NaiveTime,
    /// Local end time
    pub end_time: NaiveTime,
    /// Days the session runs
    pub weekdays: WeekdaySet,
    /// Capacity of every occurrence
    pub max_capacity: i32,
    /// Room or studio
    #[serde(default)]
    pub location: String,
}

/// Checks template invariants. `active` templates must run on at least one weekday.
pub fn validate_session_args(args: &SessionArgs, active: bool) -> Result<()> {
    if args.name.trim().is_empty() {
        return Err(Error::validation("session name cannot be empty"));
    }
    if args.max_capacity <= 0 {
        return Err(Error::validation(format!(
            "max capacity must be positive, got {}",
            args.max_capacity
        )));
    }
    if args.start_time >= args.end_time {
        return Err(Error::validation(format!(
            "start time {} must be before end time {}",
            args.start_time, args.end_time
        )));
    }
    if active && args.weekdays.is_empty() {
        return Err(Error::validation(
            "an active session must run on at least one weekday",
        ));
    }
    Ok(())
}

/// Creates a new active session template.
#[instrument(skip(db))]
pub async fn create_session(
    db: &DatabaseConnection,
    args: SessionArgs,
) -> Result<session_template::Model> {
    validate_session_args(&args, true)?;

    let now = chrono::Utc::now();
    let session = session_template::ActiveModel {
        name: Set(args.name.trim().to_string()),
        description: Set(args.description),
        start_time: Set(args.start_time),
        end_time: Set(args.end_time),
        weekday_mask: Set(args.weekdays.mask()),
        max_capacity: Set(args.max_capacity),
        location: Set(args.location),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let result = session.insert(db).await?;
    info!(session_id = result.id, name = %result.name, "Created session");
    Ok(result)
}

/// Replaces the editable fields of a session, re-checking the invariants that apply
/// to its current active state.
///
/// Lowering capacity below the bookings already held does not cancel anyone; it only
/// stops new bookings until the slot drains.
#[instrument(skip(db))]
pub async fn update_session(
    db: &DatabaseConnection,
    session_id: i64,
    args: SessionArgs,
) -> Result<session_template::Model> {
    let existing = require_session(db, session_id).await?;
    validate_session_args(&args, existing.is_active)?;

    let mut session: session_template::ActiveModel = existing.into();
    session.name = Set(args.name.trim().to_string());
    session.description = Set(args.description);
    session.start_time = Set(args.start_time);
    session.end_time = Set(args.end_time);
    session.weekday_mask = Set(args.weekdays.mask());
    session.max_capacity = Set(args.max_capacity);
    session.location = Set(args.location);
    session.updated_at = Set(chrono::Utc::now());

    let result = session.update(db).await?;
    info!(session_id, "Updated session");
    Ok(result)
}

/// Soft-deletes a session; it stops producing occurrences but keeps its history.
pub async fn deactivate_session(
    db: &DatabaseConnection,
    session_id: i64,
) -> Result<session_template::Model> {
    let mut session: session_template::ActiveModel =
        require_session(db, session_id).await?.into();
    session.is_active = Set(false);
    session.updated_at = Set(chrono::Utc::now());
    let result = session.update(db).await?;
    info!(session_id, "Deactivated session");
    Ok(result)
}

/// Re-enables a soft-deleted session.
pub async fn reactivate_session(
    db: &DatabaseConnection,
    session_id: i64,
) -> Result<session_template::Model> {
    let existing = require_session(db, session_id).await?;
    if existing.weekdays().is_empty() {
        return Err(Error::validation(
            "an active session must run on at least one weekday",
        ));
    }
    let mut session: session_template::ActiveModel = existing.into();
    session.is_active = Set(true);
    session.updated_at = Set(chrono::Utc::now());
    let result = session.update(db).await?;
    info!(session_id, "Reactivated session");
    Ok(result)
}

/// Finds a session by ID regardless of its active flag.
pub async fn get_session<C>(db: &C, session_id: i64) -> Result<Option<session_template::Model>>
where
    C: ConnectionTrait,
{
    SessionTemplate::find_by_id(session_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_session`] but a missing row is [`Error::NotFound`].
pub async fn require_session<C>(db: &C, session_id: i64) -> Result<session_template::Model>
where
    C: ConnectionTrait,
{
    get_session(db, session_id)
        .await?
        .ok_or_else(|| Error::not_found("session", session_id))
}

/// Finds a session by exact name.
pub async fn get_session_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<session_template::Model>> {
    SessionTemplate::find()
        .filter(session_template::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All active sessions ordered by start time, then name.
pub async fn list_active_sessions(db: &DatabaseConnection) -> Result<Vec<session_template::Model>> {
    SessionTemplate::find()
        .filter(session_template::Column::IsActive.eq(true))
        .order_by_asc(session_template::Column::StartTime)
        .order_by_asc(session_template::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a bookable class offering.
pub async fn create_class(
    db: &DatabaseConnection,
    name: String,
    description: String,
    price: f64,
) -> Result<class_offering::Model> {
    if name.trim().is_empty() {
        return Err(Error::validation("class name cannot be empty"));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(Error::validation(format!("invalid class price {price}")));
    }

    let class = class_offering::ActiveModel {
        name: Set(name.trim().to_string()),
        description: Set(description),
        price: Set(price),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let result = class.insert(db).await?;
    info!(class_id = result.id, name = %result.name, "Created class");
    Ok(result)
}

/// Finds a class by exact name.
pub async fn get_class_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<class_offering::Model>> {
    ClassOffering::find()
        .filter(class_offering::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Links a class to a session, re-enabling an existing inactive link.
pub async fn link_class(
    db: &DatabaseConnection,
    session_id: i64,
    class_id: i64,
) -> Result<session_class_link::Model> {
    require_session(db, session_id).await?;
    ClassOffering::find_by_id(class_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("class", class_id))?;

    if let Some(existing) = find_link(db, session_id, class_id).await? {
        if existing.is_active {
            return Ok(existing);
        }
        return set_link_active(db, session_id, class_id, true).await;
    }

    let link = session_class_link::ActiveModel {
        session_id: Set(session_id),
        class_id: Set(class_id),
        is_active: Set(true),
        ..Default::default()
    };
    let result = link.insert(db).await?;
    info!(session_id, class_id, "Linked class to session");
    Ok(result)
}

async fn find_link<C>(
    db: &C,
    session_id: i64,
    class_id: i64,
) -> Result<Option<session_class_link::Model>>
where
    C: ConnectionTrait,
{
    SessionClassLink::find()
        .filter(session_class_link::Column::SessionId.eq(session_id))
        .filter(session_class_link::Column::ClassId.eq(class_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Enables or disables an existing session/class link.
pub async fn set_link_active(
    db: &DatabaseConnection,
    session_id: i64,
    class_id: i64,
    active: bool,
) -> Result<session_class_link::Model> {
    let existing = find_link(db, session_id, class_id)
        .await?
        .ok_or_else(|| Error::not_found("session class link", format!("{session_id}/{class_id}")))?;

    let mut link: session_class_link::ActiveModel = existing.into();
    link.is_active = Set(active);
    let result = link.update(db).await?;
    info!(session_id, class_id, active, "Updated session class link");
    Ok(result)
}

/// Active classes bookable through a session, ordered by name.
pub async fn active_classes_for_session<C>(
    db: &C,
    session_id: i64,
) -> Result<Vec<class_offering::Model>>
where
    C: ConnectionTrait,
{
    ClassOffering::find()
        .inner_join(SessionClassLink)
        .filter(session_class_link::Column::SessionId.eq(session_id))
        .filter(session_class_link::Column::IsActive.eq(true))
        .filter(class_offering::Column::IsActive.eq(true))
        .order_by_asc(class_offering::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Active session IDs a class can be booked through.
pub async fn active_session_ids_for_class<C>(db: &C, class_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let links = SessionClassLink::find()
        .filter(session_class_link::Column::ClassId.eq(class_id))
        .filter(session_class_link::Column::IsActive.eq(true))
        .all(db)
        .await?;
    Ok(links.into_iter().map(|l| l.session_id).collect())
}

/// Picks the class a booking pays for.
///
/// With an explicit `class_id` the class must be actively linked to the session.
/// Without one, the single active linked class is chosen automatically; zero or
/// several candidates is a validation error.
pub async fn resolve_class<C>(
    db: &C,
    session_id: i64,
    class_id: Option<i64>,
) -> Result<class_offering::Model>
where
    C: ConnectionTrait,
{
    let mut classes = active_classes_for_session(db, session_id).await?;

    match class_id {
        Some(wanted) => classes
            .into_iter()
            .find(|c| c.id == wanted)
            .ok_or_else(|| Error::not_found("class", wanted)),
        None if classes.len() == 1 => Ok(classes.remove(0)),
        None if classes.is_empty() => Err(Error::validation(format!(
            "session {session_id} has no bookable class"
        ))),
        None => Err(Error::validation(format!(
            "session {session_id} offers {} classes; choose one",
            classes.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Weekday;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_validate_session_args() {
        let mut args = session_args("Flow", &[Weekday::Mon], 10);
        assert!(validate_session_args(&args, true).is_ok());

        args.max_capacity = 0;
        assert!(matches!(
            validate_session_args(&args, true),
            Err(Error::Validation { .. })
        ));

        args.max_capacity = 5;
        args.end_time = args.start_time;
        assert!(validate_session_args(&args, true).is_err());

        let no_days = session_args("Flow", &[], 10);
        assert!(validate_session_args(&no_days, true).is_err());
        assert!(validate_session_args(&no_days, false).is_ok());

        let blank = session_args("   ", &[Weekday::Mon], 10);
        assert!(validate_session_args(&blank, true).is_err());
    }

    #[tokio::test]
    async fn test_create_session_rejects_before_touching_db() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let result = create_session(&db, session_args("Flow", &[Weekday::Mon], -1)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_and_update_session() -> Result<()> {
        let db = setup_test_db().await?;
        let session = create_session(&db, session_args(" Flow ", &[Weekday::Mon], 10)).await?;
        assert_eq!(session.name, "Flow");
        assert!(session.is_active);
        assert!(session.weekdays().contains(Weekday::Mon));

        let updated = update_session(
            &db,
            session.id,
            session_args("Flow", &[Weekday::Tue, Weekday::Thu], 4),
        )
        .await?;
        assert_eq!(updated.max_capacity, 4);
        assert!(!updated.weekdays().contains(Weekday::Mon));
        assert!(updated.weekdays().contains(Weekday::Thu));

        let missing = update_session(&db, 999, session_args("X", &[Weekday::Mon], 1)).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_deactivate_and_reactivate_session() -> Result<()> {
        let (db, session) = setup_with_session(&[Weekday::Mon], 2).await?;

        let inactive = deactivate_session(&db, session.id).await?;
        assert!(!inactive.is_active);
        assert!(list_active_sessions(&db).await?.is_empty());
        assert!(get_session(&db, session.id).await?.is_some());

        let active = reactivate_session(&db, session.id).await?;
        assert!(active.is_active);
        assert_eq!(list_active_sessions(&db).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_class_auto_selects_single_link() -> Result<()> {
        let (db, session) = setup_with_session(&[Weekday::Mon], 2).await?;
        let only = active_classes_for_session(&db, session.id).await?;
        assert_eq!(only.len(), 1);

        let resolved = resolve_class(&db, session.id, None).await?;
        assert_eq!(resolved.id, only[0].id);

        let second = create_class(&db, "Advanced".to_string(), String::new(), 30.0).await?;
        link_class(&db, session.id, second.id).await?;

        let ambiguous = resolve_class(&db, session.id, None).await;
        assert!(matches!(ambiguous, Err(Error::Validation { .. })));

        let chosen = resolve_class(&db, session.id, Some(second.id)).await?;
        assert_eq!(chosen.name, "Advanced");

        set_link_active(&db, session.id, second.id, false).await?;
        let unlinked = resolve_class(&db, session.id, Some(second.id)).await;
        assert!(matches!(unlinked, Err(Error::NotFound { .. })));
        assert_eq!(resolve_class(&db, session.id, None).await?.id, only[0].id);
        Ok(())
    }

    #[tokio::test]
    async fn test_link_class_is_idempotent() -> Result<()> {
        let (db, session) = setup_with_session(&[Weekday::Mon], 2).await?;
        let class = create_class(&db, "Private".to_string(), String::new(), 60.0).await?;

        let first = link_class(&db, session.id, class.id).await?;
        let second = link_class(&db, session.id, class.id).await?;
        assert_eq!(first.id, second.id);

        set_link_active(&db, session.id, class.id, false).await?;
        let revived = link_class(&db, session.id, class.id).await?;
        assert_eq!(revived.id, first.id);
        assert!(revived.is_active);

        assert_eq!(
            active_session_ids_for_class(&db, class.id).await?,
            vec![session.id]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_create_class_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        assert!(create_class(&db, String::new(), String::new(), 10.0).await.is_err());
        assert!(create_class(&db, "X".to_string(), String::new(), -1.0).await.is_err());
        assert!(
            create_class(&db, "X".to_string(), String::new(), f64::NAN)
                .await
                .is_err()
        );
        Ok(())
    }
}
