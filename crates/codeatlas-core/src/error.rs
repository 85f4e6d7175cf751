use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodeAtlasError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Vector error: {0}")]
    Vector(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, CodeAtlasError>;
