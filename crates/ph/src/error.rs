use ph_core::error::{CacheError, ConfigError, PanhandlerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Panhandler(#[from] PanhandlerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("database error at {path}: {message}")]
    Database { path: String, message: String },
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("failed to write output: {message}")]
    Output { message: String },
}

impl CliError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Output {
            message: err.to_string(),
        }
    }
}
