use super::commands::ScheduleArgs;
use super::open_db;
use crate::config::HiveConfig;
use crate::errors::HiveError;
use crate::scheduler::Scheduler;

pub async fn handle_schedule(args: ScheduleArgs) -> Result<(), HiveError> {
    let config = HiveConfig::from_env()?;
    let db = open_db(&config, &args.db)?;
    Scheduler::new(db, config).run().await;
    Ok(())
}
