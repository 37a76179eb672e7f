use thiserror::Error;

/// Errors raised while loading or validating a [`PrefetchConfig`](crate::PrefetchConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Programmer errors surfaced at construction. Public scheduler methods never fail.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no tokio runtime available: the scheduler must be built inside a runtime context")]
    NoRuntime,
}
