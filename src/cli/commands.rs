use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "reconhive", version, about = "Continuous attack-surface discovery and scan scheduling engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the worker supervisor loop
    Work(WorkArgs),
    /// Run the target scheduler loop
    Schedule(ScheduleArgs),
    /// Submit a single task
    Submit(SubmitArgs),
    /// Run one pipeline inline against a target and wait for it
    Scan(ScanArgs),
    /// List tasks and their status
    Tasks(TasksArgs),
    /// Return stale running tasks to the queue
    Reclaim(ReclaimArgs),
}

#[derive(Args, Clone)]
pub struct WorkArgs {
    /// Override the SQLite store path
    #[arg(long)]
    pub db: Option<String>,

    /// Override worker concurrency
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Also run the target scheduler in this process, wired to the
    /// supervisor through the push-dispatch queue
    #[arg(long)]
    pub with_scheduler: bool,
}

#[derive(Args, Clone)]
pub struct ScheduleArgs {
    /// Override the SQLite store path
    #[arg(long)]
    pub db: Option<String>,
}

#[derive(Args, Clone)]
pub struct SubmitArgs {
    /// Seed domain to scan
    #[arg(short, long)]
    pub target: String,

    /// Task id (generated when omitted); resubmitting an id is a no-op
    #[arg(long)]
    pub id: Option<String>,

    /// Free-text note
    #[arg(long, default_value = "manual")]
    pub note: String,

    /// Override the SQLite store path
    #[arg(long)]
    pub db: Option<String>,
}

#[derive(Args, Clone)]
pub struct ScanArgs {
    /// Seed domain to scan
    #[arg(short, long)]
    pub target: String,

    /// Override the SQLite store path
    #[arg(long)]
    pub db: Option<String>,
}

#[derive(Args, Clone)]
pub struct TasksArgs {
    /// Show one task in detail, including its findings
    #[arg(long)]
    pub id: Option<String>,

    /// Max rows to list
    #[arg(long, default_value = "50")]
    pub limit: usize,

    /// Override the SQLite store path
    #[arg(long)]
    pub db: Option<String>,
}

#[derive(Args, Clone)]
pub struct ReclaimArgs {
    /// Heartbeat age in seconds after which a running task is reclaimed
    #[arg(long)]
    pub stale_secs: Option<i64>,

    /// Override the SQLite store path
    #[arg(long)]
    pub db: Option<String>,
}
