use thiserror::Error;

/// Why a dispatch produced no reply.
///
/// Both kinds are terminal for the attempt: nothing is retried and the
/// transcript is left alone. The caller decides how to show them.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The endpoint answered with a non-2xx status.
    #[error("API Error: {body}")]
    Api { status: u16, body: String },

    /// Transport-level failure: timeout, DNS, refused or reset connection,
    /// or a success response whose body could not be read.
    #[error("Connection Error: {0}")]
    Connection(String),
}

impl DispatchError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Connection(format!("request timed out: {err}"))
        } else {
            Self::Connection(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("No API key configured. Set OPENROUTER_API_KEY or add \"api_key\" to {0}")]
    MissingApiKey(String),

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid config value: {field} must be at least 1 second")]
    ZeroDuration { field: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that stops a dispatcher from being built at startup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] DispatchError),
}
