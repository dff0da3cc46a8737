use super::commands::TasksArgs;
use super::open_db;
use crate::config::HiveConfig;
use crate::errors::HiveError;
use crate::models::AssetKind;

pub async fn handle_tasks(args: TasksArgs) -> Result<(), HiveError> {
    let config = HiveConfig::from_env()?;
    let db = open_db(&config, &args.db)?;

    if let Some(id) = &args.id {
        let Some(task) = db.get_task(id)? else {
            println!("no such task: {}", id);
            return Ok(());
        };
        println!("task {}  target={}  status={}  note={}", task.id, task.target, task.status, task.note);
        println!(
            "hosts: {}  urls: {}",
            db.count_assets(id, AssetKind::Host)?,
            db.count_assets(id, AssetKind::Url)?,
        );
        for f in db.list_findings(id)? {
            println!(
                "  [{:>3}] {:<8} {:<10} {}  {}",
                f.score,
                f.severity,
                f.label,
                f.title,
                f.detail
            );
            println!("        {}", f.reasons.join(" "));
        }
        return Ok(());
    }

    for task in db.list_tasks(args.limit)? {
        println!(
            "{}  {:<8} {:<24} {}",
            task.id, task.status, task.target, task.note
        );
    }
    Ok(())
}
