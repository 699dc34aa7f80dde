use crate::config::ConfigError;
use filterjoin_dsl::JoinError;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Join(#[from] JoinError),

    #[error("line {line}: {source}")]
    Line { line: usize, source: JoinError },

    #[error("line {line}: invalid JSON: {message}")]
    InvalidJson { line: usize, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CompileError {
    /// The join validation error underneath, if there is one.
    pub fn join_error(&self) -> Option<&JoinError> {
        match self {
            CompileError::Join(err) | CompileError::Line { source: err, .. } => Some(err),
            CompileError::InvalidJson { .. } | CompileError::Config(_) => None,
        }
    }
}
