use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Spawn error: {0}")]
    Spawn(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VigilError {
    /// Spawn failures are the only errors the supervisor surfaces to its caller.
    pub fn is_spawn(&self) -> bool {
        matches!(self, VigilError::Spawn(_))
    }
}

pub type VigilResult<T> = Result<T, VigilError>;
