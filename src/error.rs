use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Authentication required")]
    AuthenticationMissing,

    #[error("Model service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Model service rejected the request: {0}")]
    UpstreamRejected(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Policy violation: {reason}")]
    PolicyViolation { reason: String, candidate: String },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Max attempts ({attempts}) exceeded: {error}")]
    MaxAttemptsExceeded {
        attempts: u8,
        query: String,
        error: String,
    },

    #[error("Interpretation error: {0}")]
    Interpretation(String),

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AssistantError>;
