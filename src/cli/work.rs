use std::sync::Arc;
use std::time::Duration;

use super::commands::WorkArgs;
use super::open_db;
use crate::config::HiveConfig;
use crate::dispatch::DispatchQueue;
use crate::errors::HiveError;
use crate::pipeline::{PipelineEngine, SubprocessRunner};
use crate::scheduler::Scheduler;
use crate::supervisor::Supervisor;

const DISPATCH_MAX_DELIVERIES: u32 = 5;

pub async fn handle_work(args: WorkArgs) -> Result<(), HiveError> {
    let mut config = HiveConfig::from_env()?;
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    let db = open_db(&config, &args.db)?;

    let tools = Arc::new(SubprocessRunner::new(Duration::from_secs(config.tool_timeout_secs)));
    let engine = Arc::new(PipelineEngine::new(db.clone(), tools, config.clone()));
    let mut supervisor = Supervisor::new(
        db.clone(),
        engine,
        config.concurrency,
        Duration::from_secs(config.poll_secs),
    );

    if args.with_scheduler {
        let queue = DispatchQueue::new(DISPATCH_MAX_DELIVERIES);
        supervisor = supervisor.with_dispatch(queue.clone());
        let scheduler = Scheduler::new(db, config).with_dispatch(queue);
        tokio::spawn(scheduler.run());
    }

    supervisor.run().await;
    Ok(())
}
