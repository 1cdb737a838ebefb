use thiserror::Error;

pub type Result<T> = std::result::Result<T, FinFocusError>;

/// Error kinds surfaced by the core engine (spec.md §7).
#[derive(Error, Debug)]
pub enum FinFocusError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("failed to parse plan or state document: {0}")]
    IngestParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("router validation failed: {0}")]
    RouterValidation(String),

    #[error("plugin transport error calling {plugin}: {message}")]
    PluginTransport { plugin: String, message: String },

    #[error("plugin {plugin} returned no cost data")]
    PluginEmptyResult { plugin: String },

    #[error("plugin {plugin} rejected the request: {message}")]
    PluginRejected { plugin: String, message: String },

    #[error("dismissal store is corrupted: {0}")]
    StoreCorrupted(String),

    #[error("dismissal store lock could not be acquired: {0}")]
    LockTimeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl FinFocusError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        FinFocusError::ConfigInvalid(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        FinFocusError::Internal(msg.into())
    }
}
