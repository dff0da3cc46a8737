mod retry;
mod types;

pub use retry::{retrying_write, RetryPolicy};
pub use types::HiveError;
