//! Registration ledger - the authoritative store of bookings.
//!
//! A booking decision (occurrence check, duplicate check, capacity check, insert and
//! optional credit debit) runs inside one database transaction that first takes the
//! slot's lock row, so concurrent requests for the same (session, date, time) are
//! serialized and capacity can never be exceeded. Cancellation and reactivation move
//! the registration between `active` and `cancelled` together with their credit
//! side effect, in the same transaction.

use chrono::{NaiveDate, NaiveTime};
use sea_orm::{QueryOrder, Set, SqlErr, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{availability, credit, schedule, schedule::StudioClock, session};
use crate::{
    entities::{
        CreditGroup, CreditReason, Registration, RegistrationStatus, SlotLock, registration,
        slot_lock,
    },
    errors::{Error, Result, with_conflict_retry},
};

/// How a booking is paid for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentDetails {
    /// Label of the payment method; defaults to `"credit"` or `"direct"`
    #[serde(default)]
    pub payment_method: String,
    /// Draw one credit from `credit_group` instead of charging the class price
    #[serde(default)]
    pub used_credit: bool,
    /// Credit group to draw from
    #[serde(default)]
    pub credit_group: CreditGroup,
}

/// A booking request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRegistration {
    /// Booking user
    pub user_id: String,
    /// Session to book
    pub session_id: i64,
    /// Class to pay for; chosen automatically when the session offers exactly one
    #[serde(default)]
    pub class_id: Option<i64>,
    /// Occurrence date
    pub date: NaiveDate,
    /// Occurrence start time
    pub time: NaiveTime,
    /// Payment information
    #[serde(flatten)]
    pub payment: PaymentDetails,
}

fn validate_request(request: &NewRegistration) -> Result<()> {
    if request.user_id.trim().is_empty() {
        return Err(Error::validation("user id cannot be empty"));
    }
    if request.payment.used_credit && !request.payment.credit_group.holds_balance() {
        return Err(Error::validation(
            "a credit group is required when paying with credit",
        ));
    }
    Ok(())
}

/// Takes the write lock on the slot's lock row, creating the row on first use.
async fn lock_slot<C>(db: &C, session_id: i64, date: NaiveDate, time: NaiveTime) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    let bumped = SlotLock::update_many()
        .col_expr(
            slot_lock::Column::Version,
            Expr::col(slot_lock::Column::Version).add(1),
        )
        .col_expr(slot_lock::Column::UpdatedAt, Expr::value(now))
        .filter(slot_lock::Column::SessionId.eq(session_id))
        .filter(slot_lock::Column::SlotDate.eq(date))
        .filter(slot_lock::Column::SlotTime.eq(time))
        .exec(db)
        .await?;

    if bumped.rows_affected > 0 {
        return Ok(());
    }

    let lock = slot_lock::ActiveModel {
        session_id: Set(session_id),
        slot_date: Set(date),
        slot_time: Set(time),
        version: Set(1),
        updated_at: Set(now),
        ..Default::default()
    };
    match lock.insert(db).await {
        Ok(_) => Ok(()),
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Err(Error::Conflict {
                message: format!("slot {session_id}/{date}/{time} lock created concurrently"),
            })
        }
        Err(e) => Err(e.into()),
    }
}

async fn find_active<C>(
    db: &C,
    user_id: &str,
    session_id: i64,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<Option<registration::Model>>
where
    C: ConnectionTrait,
{
    Registration::find()
        .filter(registration::Column::UserId.eq(user_id))
        .filter(registration::Column::SessionId.eq(session_id))
        .filter(registration::Column::SelectedDate.eq(date))
        .filter(registration::Column::SelectedTime.eq(time))
        .filter(registration::Column::Status.eq(RegistrationStatus::Active.as_str()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Rejects the booking if `user_id` already holds the slot or the slot is full.
/// Callers must hold the slot lock.
async fn ensure_bookable<C>(
    db: &C,
    user_id: &str,
    session_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    capacity: i32,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if find_active(db, user_id, session_id, date, time)
        .await?
        .is_some()
    {
        warn!(user_id, session_id, %date, %time, "Rejected booking: duplicate");
        return Err(Error::DuplicateBooking {
            user_id: user_id.to_string(),
            session_id,
            date,
            time,
        });
    }

    let active_count = availability::count_active(db, session_id, date, time).await?;
    if active_count >= i64::from(capacity) {
        warn!(session_id, %date, %time, active_count, capacity, "Rejected booking: slot full");
        return Err(Error::SlotFull {
            capacity,
            active_count,
        });
    }
    Ok(())
}

async fn book_once(
    db: &DatabaseConnection,
    request: &NewRegistration,
    today: NaiveDate,
) -> Result<registration::Model> {
    let (date, time) = (request.date, request.time);
    let txn = db.begin().await?;

    let session = session::require_session(&txn, request.session_id).await?;
    if schedule::occurrence_at(&session, date, time, today).is_none() {
        return Err(Error::InvalidSlot {
            session_id: session.id,
            date,
            time,
        });
    }
    let class = session::resolve_class(&txn, session.id, request.class_id).await?;

    lock_slot(&txn, session.id, date, time).await?;
    ensure_bookable(
        &txn,
        &request.user_id,
        session.id,
        date,
        time,
        session.max_capacity,
    )
    .await?;

    let payment = &request.payment;
    let payment_method = match (payment.payment_method.trim(), payment.used_credit) {
        ("", true) => "credit".to_string(),
        ("", false) => "direct".to_string(),
        (method, _) => method.to_string(),
    };
    let now = chrono::Utc::now();
    let booking = registration::ActiveModel {
        user_id: Set(request.user_id.clone()),
        session_id: Set(session.id),
        class_id: Set(class.id),
        selected_date: Set(date),
        selected_time: Set(time),
        status: Set(RegistrationStatus::Active.as_str().to_string()),
        purchase_price: Set(if payment.used_credit { 0.0 } else { class.price }),
        used_credit: Set(payment.used_credit),
        credit_group: Set(payment.credit_group.as_str().to_string()),
        payment_method: Set(payment_method),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = match booking.insert(&txn).await {
        Ok(created) => created,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(Error::DuplicateBooking {
                user_id: request.user_id.clone(),
                session_id: session.id,
                date,
                time,
            });
        }
        Err(e) => return Err(e.into()),
    };

    if payment.used_credit {
        // Dropping `txn` on failure rolls the registration back with the debit
        credit::debit(
            &txn,
            &created.user_id,
            payment.credit_group,
            1,
            CreditReason::BookingDebit,
            Some(created.id),
        )
        .await?;
    }

    txn.commit().await?;
    info!(
        registration_id = created.id,
        user_id = %created.user_id,
        session_id = created.session_id,
        %date,
        %time,
        used_credit = created.used_credit,
        "Created registration"
    );
    Ok(created)
}

/// Books one occurrence of a session for a user.
///
/// Checks, in order: the session exists, `date`/`time` is a real non-past occurrence
/// ([`Error::InvalidSlot`]), the class resolves, the user holds no active booking for
/// the slot ([`Error::DuplicateBooking`]) and a spot remains ([`Error::SlotFull`]).
/// When paying with credit one credit is debited in the same transaction; if the
/// balance cannot cover it nothing is written and [`Error::InsufficientCredit`] is
/// returned.
#[instrument(skip(db, clock))]
pub async fn create_registration(
    db: &DatabaseConnection,
    clock: &StudioClock,
    request: NewRegistration,
) -> Result<registration::Model> {
    validate_request(&request)?;
    let today = clock.today();
    with_conflict_retry("create registration", || book_once(db, &request, today)).await
}

/// Sets the status column, but only if the row is still in `from`.
async fn transition<C>(
    db: &C,
    registration_id: i64,
    from: RegistrationStatus,
    to: RegistrationStatus,
    mark_used_credit: bool,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut update = Registration::update_many()
        .col_expr(registration::Column::Status, Expr::value(to.as_str()))
        .col_expr(
            registration::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        );
    if mark_used_credit {
        update = update.col_expr(registration::Column::UsedCredit, Expr::value(true));
    }
    let result = update
        .filter(registration::Column::Id.eq(registration_id))
        .filter(registration::Column::Status.eq(from.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::validation(format!(
            "registration {registration_id} is no longer {from}"
        )));
    }
    Ok(())
}

/// Cancels an active registration.
///
/// With `return_credit` and a booking that was paid with credit, one credit goes back
/// to the original group, linked to this registration. Without it the credit stays
/// consumed and no ledger entry is written.
#[instrument(skip(db))]
pub async fn cancel_registration(
    db: &DatabaseConnection,
    registration_id: i64,
    return_credit: bool,
) -> Result<registration::Model> {
    let txn = db.begin().await?;
    let existing = require_registration(&txn, registration_id).await?;
    if !existing.is_active() {
        return Err(Error::validation(format!(
            "registration {registration_id} is already cancelled"
        )));
    }

    transition(
        &txn,
        registration_id,
        RegistrationStatus::Active,
        RegistrationStatus::Cancelled,
        false,
    )
    .await?;

    if return_credit && existing.used_credit {
        credit::credit(
            &txn,
            &existing.user_id,
            existing.credit_group(),
            1,
            CreditReason::CancelCredit,
            Some(registration_id),
        )
        .await?;
    }

    let updated = require_registration(&txn, registration_id).await?;
    txn.commit().await?;
    info!(
        registration_id,
        returned_credit = return_credit && existing.used_credit,
        "Cancelled registration"
    );
    Ok(updated)
}

async fn reactivate_once(
    db: &DatabaseConnection,
    registration_id: i64,
    deduct_credit: bool,
) -> Result<registration::Model> {
    let txn = db.begin().await?;
    let existing = require_registration(&txn, registration_id).await?;
    if existing.is_active() {
        return Err(Error::validation(format!(
            "registration {registration_id} is already active"
        )));
    }
    let group = existing.credit_group();
    if deduct_credit && !group.holds_balance() {
        return Err(Error::validation(format!(
            "registration {registration_id} has no credit group to deduct from"
        )));
    }

    let session = session::require_session(&txn, existing.session_id).await?;
    let (date, time) = (existing.selected_date, existing.selected_time);

    lock_slot(&txn, session.id, date, time).await?;
    ensure_bookable(
        &txn,
        &existing.user_id,
        session.id,
        date,
        time,
        session.max_capacity,
    )
    .await?;

    transition(
        &txn,
        registration_id,
        RegistrationStatus::Cancelled,
        RegistrationStatus::Active,
        deduct_credit,
    )
    .await?;

    if deduct_credit {
        credit::debit(
            &txn,
            &existing.user_id,
            group,
            1,
            CreditReason::BookingDebit,
            Some(registration_id),
        )
        .await?;
    }

    let updated = require_registration(&txn, registration_id).await?;
    txn.commit().await?;
    info!(registration_id, deduct_credit, "Reactivated registration");
    Ok(updated)
}

/// Moves a cancelled registration back to active.
///
/// Capacity is re-checked under the slot lock because the spot may have been taken
/// since cancellation; a full slot leaves the registration cancelled and debits
/// nothing. With `deduct_credit` one credit is debited from the registration's group
/// and the booking is marked as paid with credit.
#[instrument(skip(db))]
pub async fn reactivate_registration(
    db: &DatabaseConnection,
    registration_id: i64,
    deduct_credit: bool,
) -> Result<registration::Model> {
    with_conflict_retry("reactivate registration", || {
        reactivate_once(db, registration_id, deduct_credit)
    })
    .await
}

/// Finds a registration by ID.
pub async fn get_registration<C>(db: &C, registration_id: i64) -> Result<Option<registration::Model>>
where
    C: ConnectionTrait,
{
    Registration::find_by_id(registration_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_registration`] but a missing row is [`Error::NotFound`].
pub async fn require_registration<C>(db: &C, registration_id: i64) -> Result<registration::Model>
where
    C: ConnectionTrait,
{
    get_registration(db, registration_id)
        .await?
        .ok_or_else(|| Error::not_found("registration", registration_id))
}

/// A user's registrations, upcoming dates first.
pub async fn registrations_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<registration::Model>> {
    Registration::find()
        .filter(registration::Column::UserId.eq(user_id))
        .order_by_desc(registration::Column::SelectedDate)
        .order_by_desc(registration::Column::SelectedTime)
        .order_by_desc(registration::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every registration for a slot, in booking order, regardless of status.
pub async fn registrations_for_slot(
    db: &DatabaseConnection,
    session_id: i64,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<Vec<registration::Model>> {
    Registration::find()
        .filter(registration::Column::SessionId.eq(session_id))
        .filter(registration::Column::SelectedDate.eq(date))
        .filter(registration::Column::SelectedTime.eq(time))
        .order_by_asc(registration::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
