//! Session listing and availability endpoints

use axum::{
    Json,
    extract::State,
};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{
    AppState,
    error::ApiResult,
    extract::{ApiPath, ApiQuery},
};
use crate::{
    core::{
        availability::{self, SlotAvailability},
        schedule::WeekdaySet,
        session,
    },
    entities::session_template,
};

/// Default look-ahead when a range query omits `to`.
const DEFAULT_RANGE_DAYS: u64 = 28;

/// Public view of a session template
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Session ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Description
    pub description: String,
    /// Local start time
    pub start_time: NaiveTime,
    /// Local end time
    pub end_time: NaiveTime,
    /// Days the session runs
    pub weekdays: WeekdaySet,
    /// Capacity per occurrence
    pub max_capacity: i32,
    /// Room or studio
    pub location: String,
}

impl From<session_template::Model> for SessionResponse {
    fn from(model: session_template::Model) -> Self {
        Self {
            id: model.id,
            weekdays: model.weekdays(),
            name: model.name,
            description: model.description,
            start_time: model.start_time,
            end_time: model.end_time,
            max_capacity: model.max_capacity,
            location: model.location,
        }
    }
}

/// `?from&to` query; `from` defaults to today and `to` to four weeks after `from`
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// First date, inclusive
    pub from: Option<NaiveDate>,
    /// Last date, inclusive
    pub to: Option<NaiveDate>,
}

impl RangeQuery {
    fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let from = self.from.unwrap_or(today);
        let to = self.to.unwrap_or_else(|| {
            from.checked_add_days(Days::new(DEFAULT_RANGE_DAYS))
                .unwrap_or(NaiveDate::MAX)
        });
        (from, to)
    }
}

/// `?date` query
#[derive(Debug, Deserialize)]
pub struct DateQuery {
    /// Calendar date
    pub date: NaiveDate,
}

/// A date with at least one open spot
#[derive(Debug, Serialize)]
pub struct OpenDate {
    /// Occurrence date
    pub date: NaiveDate,
}

/// Counts for a single time slot
#[derive(Debug, Serialize)]
pub struct SlotCounts {
    /// Configured capacity
    pub capacity: i32,
    /// Active registrations
    pub active_count: i64,
    /// Spots left
    pub available: i64,
}

impl From<SlotAvailability> for SlotCounts {
    fn from(slot: SlotAvailability) -> Self {
        Self {
            capacity: slot.capacity,
            active_count: slot.active_count,
            available: slot.available,
        }
    }
}

/// List active sessions
pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<Vec<SessionResponse>>> {
    let sessions = session::list_active_sessions(&state.db).await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

/// Dates in range that still have capacity
pub async fn get_occurrences(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<i64>,
    ApiQuery(range): ApiQuery<RangeQuery>,
) -> ApiResult<Json<Vec<OpenDate>>> {
    let today = state.clock.today();
    let (from, to) = range.resolve(today);
    let dates = availability::available_dates(&state.db, session_id, from, to, today).await?;
    Ok(Json(dates.into_iter().map(|date| OpenDate { date }).collect()))
}

/// Per-time slot counts for one date
pub async fn get_availability(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> ApiResult<Json<BTreeMap<NaiveTime, SlotCounts>>> {
    let slots =
        availability::spots_for_date(&state.db, session_id, query.date, state.clock.today())
            .await?;
    Ok(Json(
        slots
            .into_iter()
            .map(|(time, slot)| (time, slot.into()))
            .collect(),
    ))
}

/// Every slot a class can be booked in on one date
pub async fn get_class_availability(
    State(state): State<AppState>,
    ApiPath(class_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> ApiResult<Json<Vec<SlotAvailability>>> {
    let slots =
        availability::spots_for_class_date(&state.db, class_id, query.date, state.clock.today())
            .await?;
    Ok(Json(slots))
}

/// Occupancy of every occurrence in range, for administrators
pub async fn get_occupancy(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<i64>,
    ApiQuery(range): ApiQuery<RangeQuery>,
) -> ApiResult<Json<Vec<SlotAvailability>>> {
    let today = state.clock.today();
    let (from, to) = range.resolve(today);
    let slots = availability::session_occupancy(&state.db, session_id, from, to, today).await?;
    Ok(Json(slots))
}
