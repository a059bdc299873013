use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or missing required configuration. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic transient provider failure.
    #[error("Collector error: {0}")]
    Collector(String),

    /// Provider throttled us. `retry_after` is the provider-declared wait in seconds.
    #[error("Rate limit error: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    /// Provider rejected our credentials. Never retried.
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Discriminant of [`AppError`], used to declare which failures a retry policy retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Collector,
    RateLimit,
    Authentication,
    Analysis,
    InsufficientData,
    Transport,
    Decode,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Configuration(_) => ErrorKind::Configuration,
            AppError::Collector(_) => ErrorKind::Collector,
            AppError::RateLimit { .. } => ErrorKind::RateLimit,
            AppError::Authentication(_) => ErrorKind::Authentication,
            AppError::Analysis(_) => ErrorKind::Analysis,
            AppError::InsufficientData(_) => ErrorKind::InsufficientData,
            AppError::Http(_) | AppError::Io(_) => ErrorKind::Transport,
            AppError::Json(_) | AppError::Url(_) => ErrorKind::Decode,
        }
    }

    /// True for the provider-failure family: generic, rate-limit and auth failures.
    pub fn is_collector(&self) -> bool {
        matches!(
            self,
            AppError::Collector(_) | AppError::RateLimit { .. } | AppError::Authentication(_)
        )
    }

    /// Provider-declared wait, only ever present on rate-limit failures.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Status-code classification for provider HTTP responses.
    /// Returns None for 2xx.
    pub fn from_status(provider: &str, status: u16, retry_after: Option<u64>, body: &str) -> Option<Self> {
        match status {
            200..=299 => None,
            429 => Some(AppError::RateLimit {
                message: format!("{provider} API rate limit exceeded"),
                retry_after: Some(retry_after.unwrap_or(crate::config::DEFAULT_RETRY_AFTER_SECS)),
            }),
            401 | 403 => Some(AppError::Authentication(format!("Invalid {provider} credentials"))),
            _ => {
                let sample: String = body.chars().take(200).collect();
                Some(AppError::Collector(format!("{provider} API error: {status} - {sample}")))
            }
        }
    }
}
