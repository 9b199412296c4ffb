/// Database configuration and connection management
pub mod database;

/// Studio configuration (timezone, classes, seeded sessions) loaded from studio.toml
pub mod studio;
