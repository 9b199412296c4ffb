//! Availability calculator - remaining capacity per (session, date, time) slot.
//!
//! Capacity comes from the session template; the active count is always a live count
//! of `active` registrations, never a cached counter. Batched forms group the count
//! query so a whole date or date range costs one round trip. Nothing here writes.

use chrono::{NaiveDate, NaiveTime};
use sea_orm::{PaginatorTrait, QuerySelect, prelude::*};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::{schedule, session};
use crate::{
    entities::{
        ClassOffering, Registration, RegistrationStatus, SessionTemplate, registration,
        session_template,
    },
    errors::{Error, Result},
};

/// Capacity snapshot for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotAvailability {
    /// Session of the slot
    pub session_id: i64,
    /// Date of the slot
    pub date: NaiveDate,
    /// Start time of the slot
    pub time: NaiveTime,
    /// Configured maximum capacity
    pub capacity: i32,
    /// Active registrations holding the slot
    pub active_count: i64,
    /// `max(0, capacity - active_count)`
    pub available: i64,
}

impl SlotAvailability {
    /// Builds a snapshot, clamping `available` at zero.
    #[must_use]
    pub fn new(
        session_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        capacity: i32,
        active_count: i64,
    ) -> Self {
        Self {
            session_id,
            date,
            time,
            capacity,
            active_count,
            available: (i64::from(capacity) - active_count).max(0),
        }
    }

    /// Whether no spot is left.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.available == 0
    }
}

type SlotKey = (i64, NaiveDate, NaiveTime);

/// Counts active registrations for one slot.
pub async fn count_active<C>(db: &C, session_id: i64, date: NaiveDate, time: NaiveTime) -> Result<i64>
where
    C: ConnectionTrait,
{
    let count = Registration::find()
        .filter(registration::Column::SessionId.eq(session_id))
        .filter(registration::Column::SelectedDate.eq(date))
        .filter(registration::Column::SelectedTime.eq(time))
        .filter(registration::Column::Status.eq(RegistrationStatus::Active.as_str()))
        .count(db)
        .await?;
    Ok(i64::try_from(count).unwrap_or(i64::MAX))
}

/// Active counts for every slot of `session_ids` between `from` and `to`, in one query.
async fn active_counts<C>(
    db: &C,
    session_ids: &[i64],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HashMap<SlotKey, i64>>
where
    C: ConnectionTrait,
{
    if session_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i64, NaiveDate, NaiveTime, i64)> = Registration::find()
        .select_only()
        .column(registration::Column::SessionId)
        .column(registration::Column::SelectedDate)
        .column(registration::Column::SelectedTime)
        .column_as(registration::Column::Id.count(), "active_count")
        .filter(registration::Column::SessionId.is_in(session_ids.iter().copied()))
        .filter(registration::Column::SelectedDate.between(from, to))
        .filter(registration::Column::Status.eq(RegistrationStatus::Active.as_str()))
        .group_by(registration::Column::SessionId)
        .group_by(registration::Column::SelectedDate)
        .group_by(registration::Column::SelectedTime)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(session_id, date, time, count)| ((session_id, date, time), count))
        .collect())
}

fn slots_in_range(
    session: &session_template::Model,
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
    counts: &HashMap<SlotKey, i64>,
) -> Vec<SlotAvailability> {
    schedule::occurrences(session, from, to, today)
        .map(|o| {
            let active = counts
                .get(&(o.session_id, o.date, o.start_time))
                .copied()
                .unwrap_or(0);
            SlotAvailability::new(o.session_id, o.date, o.start_time, session.max_capacity, active)
        })
        .collect()
}

/// Remaining capacity of a single slot.
///
/// Only an unknown session is an error; any date and time produce a value, zero
/// bookings included.
pub async fn spots_remaining<C>(
    db: &C,
    session_id: i64,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<SlotAvailability>
where
    C: ConnectionTrait,
{
    let session = session::require_session(db, session_id).await?;
    let active = count_active(db, session_id, date, time).await?;
    Ok(SlotAvailability::new(
        session_id,
        date,
        time,
        session.max_capacity,
        active,
    ))
}

/// Every slot the session offers on `date`, keyed by start time.
///
/// Empty when the session does not run that day, is inactive, or `date` is past.
pub async fn spots_for_date(
    db: &DatabaseConnection,
    session_id: i64,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<BTreeMap<NaiveTime, SlotAvailability>> {
    let session = session::require_session(db, session_id).await?;
    let counts = active_counts(db, &[session_id], date, date).await?;
    Ok(slots_in_range(&session, date, date, today, &counts)
        .into_iter()
        .map(|slot| (slot.time, slot))
        .collect())
}

/// Every slot on `date` across all active sessions a class can be booked through,
/// ordered by time and then session.
pub async fn spots_for_class_date(
    db: &DatabaseConnection,
    class_id: i64,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<SlotAvailability>> {
    ClassOffering::find_by_id(class_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("class", class_id))?;

    let session_ids = session::active_session_ids_for_class(db, class_id).await?;
    let counts = active_counts(db, &session_ids, date, date).await?;

    let sessions = SessionTemplate::find()
        .filter(session_template::Column::Id.is_in(session_ids.clone()))
        .filter(session_template::Column::IsActive.eq(true))
        .all(db)
        .await?;

    let mut slots: Vec<SlotAvailability> = sessions
        .iter()
        .flat_map(|session| slots_in_range(session, date, date, today, &counts))
        .collect();
    slots.sort_by_key(|s| (s.time, s.session_id));
    Ok(slots)
}

/// Occurrence dates between `from` and `to` that still have at least one spot.
pub async fn available_dates(
    db: &DatabaseConnection,
    session_id: i64,
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<NaiveDate>> {
    let occupancy = session_occupancy(db, session_id, from, to, today).await?;
    let dates: Vec<NaiveDate> = occupancy
        .into_iter()
        .filter(|slot| !slot.is_full())
        .map(|slot| slot.date)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    debug!(session_id, %from, %to, count = dates.len(), "Computed available dates");
    Ok(dates)
}

/// Availability of every occurrence of a session in a range, for administrative views.
pub async fn session_occupancy(
    db: &DatabaseConnection,
    session_id: i64,
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<SlotAvailability>> {
    let session = session::require_session(db, session_id).await?;
    if from > to {
        return Ok(Vec::new());
    }
    let counts = active_counts(db, &[session_id], from.max(today), to).await?;
    Ok(slots_in_range(&session, from, to, today, &counts))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Weekday;

    #[test]
    fn test_available_is_clamped() {
        let slot = SlotAvailability::new(1, date(2026, 10, 19), time(9, 0), 2, 5);
        assert_eq!(slot.available, 0);
        assert!(slot.is_full());

        let open = SlotAvailability::new(1, date(2026, 10, 19), time(9, 0), 3, 1);
        assert_eq!(open.available, 2);
        assert!(!open.is_full());
    }

    #[tokio::test]
    async fn test_spots_remaining_unknown_session() -> Result<()> {
        let db = setup_test_db().await?;
        let result = spots_remaining(&db, 404, date(2026, 10, 19), time(9, 0)).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_spots_remaining_counts_only_active() -> Result<()> {
        let (db, session) = setup_with_session(&[Weekday::Mon], 3).await?;
        let clock = test_clock();
        let monday = date(2026, 10, 26);

        book(&db, &clock, &session, "alice", monday).await?;
        let bob = book(&db, &clock, &session, "bob", monday).await?;
        crate::core::registration::cancel_registration(&db, bob.id, false).await?;

        let slot = spots_remaining(&db, session.id, monday, session.start_time).await?;
        assert_eq!(slot.capacity, 3);
        assert_eq!(slot.active_count, 1);
        assert_eq!(slot.available, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_spots_for_date_only_on_running_days() -> Result<()> {
        let (db, session) = setup_with_session(&[Weekday::Mon], 2).await?;
        let today = test_clock().today();

        let monday = spots_for_date(&db, session.id, date(2026, 10, 26), today).await?;
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[&session.start_time].available, 2);

        let tuesday = spots_for_date(&db, session.id, date(2026, 10, 27), today).await?;
        assert!(tuesday.is_empty());

        let past = spots_for_date(&db, session.id, date(2026, 10, 12), today).await?;
        assert!(past.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_available_dates_drop_full_occurrences() -> Result<()> {
        let (db, session) = setup_with_session(&[Weekday::Mon, Weekday::Wed], 1).await?;
        let clock = test_clock();

        book(&db, &clock, &session, "alice", date(2026, 10, 21)).await?;

        let dates =
            available_dates(&db, session.id, date(2026, 10, 19), date(2026, 10, 28), clock.today())
                .await?;
        assert_eq!(
            dates,
            vec![date(2026, 10, 19), date(2026, 10, 26), date(2026, 10, 28)]
        );

        let occupancy =
            session_occupancy(&db, session.id, date(2026, 10, 19), date(2026, 10, 28), clock.today())
                .await?;
        assert_eq!(occupancy.len(), 4);
        assert!(occupancy[1].is_full());
        assert_eq!(occupancy[1].active_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_spots_for_class_date_spans_linked_sessions() -> Result<()> {
        let (db, morning) = setup_with_session(&[Weekday::Mon], 2).await?;
        let class = crate::core::session::resolve_class(&db, morning.id, None).await?;

        let mut args = session_args("Evening", &[Weekday::Mon], 5);
        args.start_time = time(18, 0);
        args.end_time = time(19, 0);
        let evening = crate::core::session::create_session(&db, args).await?;
        crate::core::session::link_class(&db, evening.id, class.id).await?;
        book(&db, &test_clock(), &morning, "alice", date(2026, 10, 26)).await?;

        let slots =
            spots_for_class_date(&db, class.id, date(2026, 10, 26), test_clock().today()).await?;
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].session_id, morning.id);
        assert_eq!(slots[0].active_count, 1);
        assert_eq!(slots[0].available, 1);
        assert_eq!(slots[1].session_id, evening.id);
        assert_eq!(slots[1].capacity, 5);
        assert_eq!(slots[1].active_count, 0);

        crate::core::session::deactivate_session(&db, evening.id).await?;
        let slots =
            spots_for_class_date(&db, class.id, date(2026, 10, 26), test_clock().today()).await?;
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].session_id, morning.id);

        let unknown = spots_for_class_date(&db, 999, date(2026, 10, 26), test_clock().today()).await;
        assert!(matches!(unknown, Err(Error::NotFound { .. })));
        Ok(())
    }
}
