mod engine;
mod tasklog;
mod tools;

pub use engine::PipelineEngine;
pub use tasklog::TaskLog;
pub use tools::{SubprocessRunner, ToolOutput, ToolRunner};
