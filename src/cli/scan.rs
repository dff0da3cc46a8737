use std::sync::Arc;
use std::time::Duration;

use super::commands::ScanArgs;
use super::open_db;
use crate::config::HiveConfig;
use crate::errors::HiveError;
use crate::models::AssetKind;
use crate::pipeline::{PipelineEngine, SubprocessRunner};

/// One-shot scan: submit, claim, and run a single task inline, then print a
/// summary. Uses the same claim path as the supervisor so a concurrently
/// running worker can never pick up the same task.
pub async fn handle_scan(args: ScanArgs) -> Result<(), HiveError> {
    let config = HiveConfig::from_env()?;
    let db = open_db(&config, &args.db)?;

    let id = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();
    db.submit_task(&id, &args.target, "one-shot")?;

    if !db.claim_task(&id)? {
        println!("task {} already claimed by another worker", id);
        return Ok(());
    }
    let (task_id, target) = (id, args.target.clone());

    let tools = Arc::new(SubprocessRunner::new(Duration::from_secs(config.tool_timeout_secs)));
    let engine = PipelineEngine::new(db.clone(), tools, config);
    let outcome = engine.run(&task_id, &target).await;

    let task = db.get_task(&task_id)?;
    if let Some(task) = task {
        println!("task {}: {} ({})", task.id, task.status, task.note);
    }
    println!(
        "hosts: {}  urls: {}  findings: {}",
        db.count_assets(&task_id, AssetKind::Host)?,
        db.count_assets(&task_id, AssetKind::Url)?,
        db.count_findings(&task_id)?,
    );
    outcome
}
