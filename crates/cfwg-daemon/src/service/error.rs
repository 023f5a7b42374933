//! Service controller error types.

/// Errors from querying or changing the tunnel unit.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed (exit {code}): {output}")]
    Command {
        command: String,
        code: String,
        output: String,
    },

    #[error("unexpected state for {unit}: {output}")]
    UnexpectedState { unit: String, output: String },

    #[error("{unit} is not active after {action}")]
    NotActiveAfter { unit: String, action: &'static str },

    #[error("preflight failed: {0}")]
    Preflight(String),
}
