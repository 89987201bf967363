//! Error types shared by the gateways, configuration and the front-end.

/// Failures raised by the external collaborators (document store, vector
/// index, embedding server, language model).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("model returned no text")]
    EmptyResponse,

    #[error("prompt error: {0}")]
    Prompt(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing settings: {}. Set them in the environment or a .env file", .0.join(", "))]
    MissingSettings(Vec<String>),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Raised by the caller-side precondition on user questions.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question too short: {actual} characters, at least {min} required")]
    TooShort { min: usize, actual: usize },
}
