//! Studio configuration loading from studio.toml
//!
//! The file names the studio's timezone and lists the class offerings and recurring
//! session templates to seed on startup. Seeding is idempotent by name: existing
//! rows are left untouched, missing ones are created and class links are ensured.
//! A session an administrator deactivated stays deactivated across restarts.

use crate::{
    core::{
        schedule::StudioClock,
        session::{self, SessionArgs},
    },
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::{collections::HashMap, path::Path};
use tracing::{debug, info, instrument};

const DEFAULT_STUDIO_CONFIG: &str = "studio.toml";

/// Configuration structure representing the entire studio.toml file
#[derive(Debug, Deserialize)]
pub struct StudioConfig {
    /// Studio identity and timezone
    pub studio: StudioSection,
    /// Class offerings to seed
    #[serde(default)]
    pub classes: Vec<ClassConfig>,
    /// Session templates to seed
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
}

/// The `[studio]` table
#[derive(Debug, Deserialize, Clone)]
pub struct StudioSection {
    /// Display name of the studio
    pub name: String,
    /// IANA timezone name, e.g. `"America/Chicago"`
    pub timezone: String,
}

/// Configuration for a single class offering
#[derive(Debug, Deserialize, Clone)]
pub struct ClassConfig {
    /// Unique class name
    pub name: String,
    /// Price charged for a direct-payment booking
    pub price: f64,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// Configuration for a single session template
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Template fields
    #[serde(flatten)]
    pub args: SessionArgs,
    /// Names of the classes bookable through this session
    #[serde(default)]
    pub classes: Vec<String>,
}

impl StudioConfig {
    /// Clock for the configured studio timezone.
    pub fn clock(&self) -> Result<StudioClock> {
        StudioClock::from_timezone_name(&self.studio.timezone)
    }
}

/// Path of the studio file, from `STUDIO_CONFIG` or `./studio.toml`.
#[must_use]
pub fn get_config_path() -> String {
    std::env::var("STUDIO_CONFIG").unwrap_or_else(|_| DEFAULT_STUDIO_CONFIG.to_string())
}

/// Parses studio configuration from TOML text.
///
/// # Errors
/// Returns an error if the TOML syntax is invalid, required fields are missing or
/// the timezone is not a known IANA name.
pub fn parse_config(contents: &str) -> Result<StudioConfig> {
    let config: StudioConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse studio config: {e}"),
    })?;
    config.clock()?;
    Ok(config)
}

/// Loads studio configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or fails [`parse_config`].
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StudioConfig> {
    let path = path.as_ref();
    debug!("Loading studio configuration from {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;
    parse_config(&contents)
}

/// Creates the configured classes and sessions that do not exist yet and links them.
#[instrument(skip_all, fields(studio = %config.studio.name))]
pub async fn seed_from_config(db: &DatabaseConnection, config: &StudioConfig) -> Result<()> {
    info!(
        "Seeding studio: {} classes, {} sessions configured",
        config.classes.len(),
        config.sessions.len()
    );

    let mut class_ids = HashMap::new();
    for class in &config.classes {
        let existing = session::get_class_by_name(db, class.name.trim()).await?;
        let model = match existing {
            Some(model) => model,
            None => {
                session::create_class(
                    db,
                    class.name.clone(),
                    class.description.clone(),
                    class.price,
                )
                .await?
            }
        };
        class_ids.insert(model.name.clone(), model.id);
    }

    for entry in &config.sessions {
        let name = entry.args.name.trim();
        let model = match session::get_session_by_name(db, name).await? {
            Some(existing) => {
                if !existing.is_active {
                    debug!(session = name, "Configured session is deactivated; leaving it off");
                }
                existing
            }
            None => session::create_session(db, entry.args.clone()).await?,
        };

        for class_name in &entry.classes {
            let class_id = class_ids.get(class_name.trim()).copied().ok_or_else(|| {
                Error::Config {
                    message: format!(
                        "session '{name}' references unknown class '{class_name}'"
                    ),
                }
            })?;
            session::link_class(db, model.id, class_id).await?;
        }
    }

    info!("Finished seeding studio configuration");
    Ok(())
}
