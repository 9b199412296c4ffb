//! Credit ledger - per-user, per-group credit balances backed by an append-only log.
//!
//! Every change to a balance is a [`credit_transaction`] row, and the materialized
//! [`credit_balance`] row is updated in the same database transaction. Both `debit`
//! and `credit` open their own (nested) transaction, so they are atomic on a bare
//! connection and compose as a savepoint inside a caller's booking transaction.

use sea_orm::{
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    entities::{
        CreditBalance, CreditGroup, CreditReason, CreditTransaction, credit_balance,
        credit_transaction,
    },
    errors::{Error, Result, with_conflict_retry},
};

fn validate_entry(user_id: &str, group: CreditGroup, amount: i64) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::validation("user id cannot be empty"));
    }
    if !group.holds_balance() {
        return Err(Error::validation("credit group 'none' has no balance"));
    }
    if amount <= 0 {
        return Err(Error::validation(format!(
            "credit amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

async fn find_balance<C>(
    db: &C,
    user_id: &str,
    group: CreditGroup,
) -> Result<Option<credit_balance::Model>>
where
    C: ConnectionTrait,
{
    CreditBalance::find()
        .filter(credit_balance::Column::UserId.eq(user_id))
        .filter(credit_balance::Column::CreditGroup.eq(group.as_str()))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn insert_entry<C>(
    db: &C,
    user_id: &str,
    group: CreditGroup,
    delta: i64,
    reason: CreditReason,
    registration_id: Option<i64>,
    note: Option<String>,
) -> Result<credit_transaction::Model>
where
    C: ConnectionTrait,
{
    let entry = credit_transaction::ActiveModel {
        user_id: Set(user_id.to_string()),
        credit_group: Set(group.as_str().to_string()),
        delta: Set(delta),
        reason: Set(reason.as_str().to_string()),
        registration_id: Set(registration_id),
        note: Set(note),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    entry.insert(db).await.map_err(Into::into)
}

/// Creates the zero balance row for a first-ever credit. Losing the race to a
/// concurrent first credit is reported as [`Error::Conflict`] so the caller retries
/// against the row the winner created.
async fn insert_balance_row<C>(db: &C, user_id: &str, group: CreditGroup) -> Result<()>
where
    C: ConnectionTrait,
{
    let balance = credit_balance::ActiveModel {
        user_id: Set(user_id.to_string()),
        credit_group: Set(group.as_str().to_string()),
        remaining_credits: Set(0),
        total_issued: Set(0),
        updated_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    match balance.insert(db).await {
        Ok(_) => Ok(()),
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Err(Error::Conflict {
                message: format!("{group} balance of {user_id} created concurrently"),
            })
        }
        Err(e) => Err(e.into()),
    }
}

async fn apply_debit<C>(
    db: &C,
    user_id: &str,
    group: CreditGroup,
    amount: i64,
    reason: CreditReason,
    registration_id: Option<i64>,
    note: Option<String>,
) -> Result<credit_transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    validate_entry(user_id, group, amount)?;
    let txn = db.begin().await?;

    // Conditional decrement: the row only changes if it can cover the amount
    let updated = CreditBalance::update_many()
        .col_expr(
            credit_balance::Column::RemainingCredits,
            Expr::col(credit_balance::Column::RemainingCredits).sub(amount),
        )
        .col_expr(
            credit_balance::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(credit_balance::Column::UserId.eq(user_id))
        .filter(credit_balance::Column::CreditGroup.eq(group.as_str()))
        .filter(credit_balance::Column::RemainingCredits.gte(amount))
        .exec(&txn)
        .await?;

    if updated.rows_affected == 0 {
        let remaining = find_balance(&txn, user_id, group)
            .await?
            .map_or(0, |b| b.remaining_credits);
        warn!(user_id, %group, remaining, amount, "Rejected debit: insufficient credit");
        return Err(Error::InsufficientCredit {
            group: group.as_str().to_string(),
            remaining,
            required: amount,
        });
    }

    let entry = insert_entry(&txn, user_id, group, -amount, reason, registration_id, note).await?;
    txn.commit().await?;

    info!(user_id, %group, amount, %reason, ?registration_id, "Debited credits");
    Ok(entry)
}

async fn apply_credit<C>(
    db: &C,
    user_id: &str,
    group: CreditGroup,
    amount: i64,
    reason: CreditReason,
    registration_id: Option<i64>,
    note: Option<String>,
) -> Result<credit_transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    validate_entry(user_id, group, amount)?;
    let txn = db.begin().await?;

    if find_balance(&txn, user_id, group).await?.is_none() {
        insert_balance_row(&txn, user_id, group).await?;
    }

    let issued_delta = if reason == CreditReason::Issue { amount } else { 0 };
    CreditBalance::update_many()
        .col_expr(
            credit_balance::Column::RemainingCredits,
            Expr::col(credit_balance::Column::RemainingCredits).add(amount),
        )
        .col_expr(
            credit_balance::Column::TotalIssued,
            Expr::col(credit_balance::Column::TotalIssued).add(issued_delta),
        )
        .col_expr(
            credit_balance::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(credit_balance::Column::UserId.eq(user_id))
        .filter(credit_balance::Column::CreditGroup.eq(group.as_str()))
        .exec(&txn)
        .await?;

    let entry = insert_entry(&txn, user_id, group, amount, reason, registration_id, note).await?;
    txn.commit().await?;

    info!(user_id, %group, amount, %reason, ?registration_id, "Credited credits");
    Ok(entry)
}

/// Removes `amount` credits from a user's balance and records the transaction.
///
/// Fails with [`Error::InsufficientCredit`] without writing anything when the balance
/// is below `amount`.
#[instrument(skip(db))]
pub async fn debit<C>(
    db: &C,
    user_id: &str,
    group: CreditGroup,
    amount: i64,
    reason: CreditReason,
    registration_id: Option<i64>,
) -> Result<credit_transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    apply_debit(db, user_id, group, amount, reason, registration_id, None).await
}

/// Adds `amount` credits to a user's balance and records the transaction.
///
/// There is no upper bound; issuance limits are a policy concern of the caller.
/// A race on a user's first balance row is retried once.
#[instrument(skip(db))]
pub async fn credit<C>(
    db: &C,
    user_id: &str,
    group: CreditGroup,
    amount: i64,
    reason: CreditReason,
    registration_id: Option<i64>,
) -> Result<credit_transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    with_conflict_retry("credit", || {
        apply_credit(db, user_id, group, amount, reason, registration_id, None)
    })
    .await
}

/// Issues purchased or granted credits, counting them towards `total_issued`.
pub async fn issue_credits(
    db: &DatabaseConnection,
    user_id: &str,
    group: CreditGroup,
    amount: i64,
    note: Option<String>,
) -> Result<credit_transaction::Model> {
    with_conflict_retry("issue credits", || {
        apply_credit(db, user_id, group, amount, CreditReason::Issue, None, note.clone())
    })
    .await
}

/// Applies a signed operator correction. A negative adjustment cannot take the
/// balance below zero.
pub async fn adjust_credits(
    db: &DatabaseConnection,
    user_id: &str,
    group: CreditGroup,
    delta: i64,
    note: Option<String>,
) -> Result<credit_transaction::Model> {
    match delta {
        0 => Err(Error::validation("adjustment cannot be zero")),
        d if d > 0 => {
            with_conflict_retry("adjust credits", || {
                apply_credit(
                    db,
                    user_id,
                    group,
                    d,
                    CreditReason::ManualAdjustment,
                    None,
                    note.clone(),
                )
            })
            .await
        }
        d => {
            apply_debit(db, user_id, group, -d, CreditReason::ManualAdjustment, None, note).await
        }
    }
}

/// Current materialized balance; users without a row have zero.
pub async fn balance_for<C>(db: &C, user_id: &str, group: CreditGroup) -> Result<i64>
where
    C: ConnectionTrait,
{
    Ok(find_balance(db, user_id, group)
        .await?
        .map_or(0, |b| b.remaining_credits))
}

/// All balance rows for a user, ordered by group.
pub async fn balances_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<credit_balance::Model>> {
    CreditBalance::find()
        .filter(credit_balance::Column::UserId.eq(user_id))
        .order_by_asc(credit_balance::Column::CreditGroup)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A user's ledger entries, newest first, optionally limited to one group.
pub async fn transactions_for_user(
    db: &DatabaseConnection,
    user_id: &str,
    group: Option<CreditGroup>,
) -> Result<Vec<credit_transaction::Model>> {
    let mut query =
        CreditTransaction::find().filter(credit_transaction::Column::UserId.eq(user_id));
    if let Some(group) = group {
        query = query.filter(credit_transaction::Column::CreditGroup.eq(group.as_str()));
    }
    query
        .order_by_desc(credit_transaction::Column::CreatedAt)
        .order_by_desc(credit_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Ledger entries caused by one registration, oldest first.
pub async fn transactions_for_registration<C>(
    db: &C,
    registration_id: i64,
) -> Result<Vec<credit_transaction::Model>>
where
    C: ConnectionTrait,
{
    CreditTransaction::find()
        .filter(credit_transaction::Column::RegistrationId.eq(registration_id))
        .order_by_asc(credit_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Balance derived from the log alone: the signed sum of all deltas.
pub async fn recompute_balance<C>(db: &C, user_id: &str, group: CreditGroup) -> Result<i64>
where
    C: ConnectionTrait,
{
    // SUM over no rows is NULL
    let total: Option<Option<i64>> = CreditTransaction::find()
        .select_only()
        .column_as(credit_transaction::Column::Delta.sum(), "total")
        .filter(credit_transaction::Column::UserId.eq(user_id))
        .filter(credit_transaction::Column::CreditGroup.eq(group.as_str()))
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

/// Whether the materialized balance agrees with the log.
pub async fn verify_balance<C>(db: &C, user_id: &str, group: CreditGroup) -> Result<bool>
where
    C: ConnectionTrait,
{
    let materialized = balance_for(db, user_id, group).await?;
    let recomputed = recompute_balance(db, user_id, group).await?;
    if materialized != recomputed {
        warn!(user_id, %group, materialized, recomputed, "Credit balance drift detected");
    } else {
        debug!(user_id, %group, materialized, "Credit balance verified");
    }
    Ok(materialized == recomputed)
}
