//! Shared test utilities for the booking service.
//!
//! This module provides common helper functions for setting up test databases
//! and creating sessions, classes and bookings with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        registration::{self, NewRegistration, PaymentDetails},
        schedule::{StudioClock, WeekdaySet},
        session::{self, SessionArgs},
    },
    entities::{CreditGroup, registration as registration_entity, session_template},
    errors::Result,
};
use chrono::{NaiveDate, NaiveTime, Weekday};
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly tracing subscriber; safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Shorthand for a calendar date.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Shorthand for a wall-clock time.
pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// Clock pinned to Monday 2026-10-19 in Chicago.
pub fn test_clock() -> StudioClock {
    StudioClock::pinned(chrono_tz::America::Chicago, date(2026, 10, 19))
}

/// An in-memory session model for pure schedule tests.
///
/// # Defaults
/// * id: 1
/// * 09:00 to 10:00, capacity 2, active
pub fn session_model(days: &[Weekday]) -> session_template::Model {
    let now = chrono::Utc::now();
    session_template::Model {
        id: 1,
        name: "Morning Flow".to_string(),
        description: String::new(),
        start_time: time(9, 0),
        end_time: time(10, 0),
        weekday_mask: days.iter().copied().collect::<WeekdaySet>().mask(),
        max_capacity: 2,
        location: "Studio A".to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Session arguments running 09:00 to 10:00 on `days`.
pub fn session_args(name: &str, days: &[Weekday], max_capacity: i32) -> SessionArgs {
    SessionArgs {
        name: name.to_string(),
        description: String::new(),
        start_time: time(9, 0),
        end_time: time(10, 0),
        weekdays: days.iter().copied().collect(),
        max_capacity,
        location: "Studio A".to_string(),
    }
}

/// Creates a session named "Morning Flow" linked to a single 25.00 drop-in class.
pub async fn create_test_session(
    db: &DatabaseConnection,
    days: &[Weekday],
    max_capacity: i32,
) -> Result<session_template::Model> {
    let created = session::create_session(db, session_args("Morning Flow", days, max_capacity))
        .await?;
    let class = session::create_class(db, "Drop-in".to_string(), String::new(), 25.0).await?;
    session::link_class(db, created.id, class.id).await?;
    Ok(created)
}

/// Sets up a complete test environment with one bookable session.
/// Returns (db, session) for common test scenarios.
pub async fn setup_with_session(
    days: &[Weekday],
    max_capacity: i32,
) -> Result<(DatabaseConnection, session_template::Model)> {
    let db = setup_test_db().await?;
    let created = create_test_session(&db, days, max_capacity).await?;
    Ok((db, created))
}

/// A direct-payment booking request with the class chosen automatically.
pub fn booking_request(
    session_id: i64,
    user_id: &str,
    date: NaiveDate,
    time: NaiveTime,
) -> NewRegistration {
    NewRegistration {
        user_id: user_id.to_string(),
        session_id,
        class_id: None,
        date,
        time,
        payment: PaymentDetails::default(),
    }
}

/// Books the session's start time on `date`, paying directly.
pub async fn book(
    db: &DatabaseConnection,
    clock: &StudioClock,
    session: &session_template::Model,
    user_id: &str,
    date: NaiveDate,
) -> Result<registration_entity::Model> {
    let request = booking_request(session.id, user_id, date, session.start_time);
    registration::create_registration(db, clock, request).await
}

/// Books the session's start time on `date`, paying with one group credit.
pub async fn book_with_credit(
    db: &DatabaseConnection,
    clock: &StudioClock,
    session: &session_template::Model,
    user_id: &str,
    date: NaiveDate,
) -> Result<registration_entity::Model> {
    let mut request = booking_request(session.id, user_id, date, session.start_time);
    request.payment.used_credit = true;
    request.payment.credit_group = CreditGroup::Group;
    registration::create_registration(db, clock, request).await
}

/// Issues `amount` credits of `group` to `user_id`.
pub async fn issue_test_credits(
    db: &DatabaseConnection,
    user_id: &str,
    group: CreditGroup,
    amount: i64,
) -> Result<()> {
    crate::core::credit::issue_credits(db, user_id, group, amount, Some("test pack".to_string()))
        .await?;
    Ok(())
}
