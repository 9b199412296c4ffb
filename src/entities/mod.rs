//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod class_offering;
pub mod credit_balance;
pub mod credit_transaction;
pub mod registration;
pub mod session_class_link;
pub mod session_template;
pub mod slot_lock;

// Re-export specific types to avoid conflicts
pub use class_offering::{
    Column as ClassOfferingColumn, Entity as ClassOffering, Model as ClassOfferingModel,
};
pub use credit_balance::{
    Column as CreditBalanceColumn, CreditGroup, Entity as CreditBalance,
    Model as CreditBalanceModel,
};
pub use credit_transaction::{
    Column as CreditTransactionColumn, CreditReason, Entity as CreditTransaction,
    Model as CreditTransactionModel,
};
pub use registration::{
    Column as RegistrationColumn, Entity as Registration, Model as RegistrationModel,
    RegistrationStatus,
};
pub use session_class_link::{
    Column as SessionClassLinkColumn, Entity as SessionClassLink, Model as SessionClassLinkModel,
};
pub use session_template::{
    Column as SessionTemplateColumn, Entity as SessionTemplate, Model as SessionTemplateModel,
};
pub use slot_lock::{Column as SlotLockColumn, Entity as SlotLock, Model as SlotLockModel};
