pub mod cli;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod scope;
pub mod scoring;
pub mod supervisor;
