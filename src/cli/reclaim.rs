use super::commands::ReclaimArgs;
use super::open_db;
use crate::config::HiveConfig;
use crate::errors::HiveError;

/// Operator-invoked reclaim rule: any task still `running` with a heartbeat
/// older than the stale threshold is forcibly returned to `queued`. This is
/// deliberately not automatic — see the supervisor's liveness notes.
pub async fn handle_reclaim(args: ReclaimArgs) -> Result<(), HiveError> {
    let config = HiveConfig::from_env()?;
    let db = open_db(&config, &args.db)?;
    let stale = args.stale_secs.unwrap_or(config.stale_heartbeat_secs);
    let n = db.requeue_stale(stale)?;
    println!("requeued {} stale task(s) (heartbeat older than {}s)", n, stale);
    Ok(())
}
