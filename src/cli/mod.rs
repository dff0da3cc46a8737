pub mod commands;
pub mod reclaim;
pub mod scan;
pub mod schedule;
pub mod submit;
pub mod tasks;
pub mod work;

pub use commands::{Cli, Commands};

use crate::config::HiveConfig;
use crate::db::Database;
use crate::errors::HiveError;

/// Resolve the store: CLI override wins over the environment-derived config.
pub(crate) fn open_db(config: &HiveConfig, override_path: &Option<String>) -> Result<Database, HiveError> {
    let path = override_path.as_deref().unwrap_or(&config.db_path);
    Database::open(path)
}
