//! Database configuration module for the booking service.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables come from the entity definitions through `Schema::create_table_from_entity`;
//! the composite and partial unique indexes SeaORM cannot express on an entity are
//! issued as plain SQL afterwards. Every statement is idempotent so startup can run
//! it against an existing database.

use crate::entities::{
    ClassOffering, CreditBalance, CreditTransaction, Registration, SessionClassLink,
    SessionTemplate, SlotLock,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/studio_booking.sqlite?mode=rwc";

/// Indexes that back the booking and ledger invariants.
const INDEX_STATEMENTS: [&str; 4] = [
    // At most one active registration per user per slot
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_registration_active_slot_user \
     ON registrations (session_id, selected_date, selected_time, user_id) \
     WHERE status = 'active'",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_slot_lock_slot \
     ON slot_locks (session_id, slot_date, slot_time)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_credit_balance_user_group \
     ON credit_balances (user_id, credit_group)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_session_class_link \
     ON session_class_links (session_id, class_id)",
];

/// Gets the database URL from the `DATABASE_URL` environment variable or returns
/// the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and invariant-backing indexes.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, SessionTemplate).await?;
    create_table(db, &schema, ClassOffering).await?;
    create_table(db, &schema, SessionClassLink).await?;
    create_table(db, &schema, Registration).await?;
    create_table(db, &schema, SlotLock).await?;
    create_table(db, &schema, CreditBalance).await?;
    create_table(db, &schema, CreditTransaction).await?;

    for statement in INDEX_STATEMENTS {
        db.execute_unprepared(statement).await?;
    }

    info!("Database tables and indexes ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{RegistrationModel, SessionTemplateModel};
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<SessionTemplateModel> = SessionTemplate::find().limit(1).all(&db).await?;
        let _: Vec<RegistrationModel> = Registration::find().limit(1).all(&db).await?;
        let _ = CreditBalance::find().limit(1).all(&db).await?;
        let _ = CreditTransaction::find().limit(1).all(&db).await?;
        let _ = SlotLock::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
