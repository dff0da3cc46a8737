mod finding;
mod probe;
mod task;

pub use finding::{fingerprint, label_for, Finding, Severity};
pub use probe::ProbeMeta;
pub use task::{Asset, AssetKind, Target, Task, TaskStatus};
