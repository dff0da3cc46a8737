use super::commands::SubmitArgs;
use super::open_db;
use crate::config::HiveConfig;
use crate::errors::HiveError;

pub async fn handle_submit(args: SubmitArgs) -> Result<(), HiveError> {
    let config = HiveConfig::from_env()?;
    let db = open_db(&config, &args.db)?;

    let id = args
        .id
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()[..12].to_string());
    db.submit_task(&id, &args.target, &args.note)?;
    println!("queued task {} for {}", id, args.target);
    Ok(())
}
