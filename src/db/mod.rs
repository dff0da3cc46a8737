mod assets;
mod connection;
mod findings;
mod schema;
mod targets;
mod tasks;

pub use connection::Database;

/// Current wall-clock time as epoch seconds, the unit every persisted
/// timestamp uses.
pub(crate) fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
