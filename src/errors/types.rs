use thiserror::Error;

#[derive(Debug, Error)]
pub enum HiveError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Collaborator error: {0}")]
    Tool(String),

    #[error("Feed fetch error: {0}")]
    Feed(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HiveError {
    /// Whether the error is transient storage contention worth retrying.
    pub fn is_contention(&self) -> bool {
        match self {
            HiveError::Database(msg) => {
                let m = msg.to_ascii_lowercase();
                m.contains("locked") || m.contains("busy")
            }
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for HiveError {
    fn from(e: rusqlite::Error) -> Self {
        HiveError::Database(e.to_string())
    }
}
