use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("max_concurrency must be a positive integer")]
    InvalidConcurrency,

    #[error("stack_size_kb = {0} does not fit in a byte count")]
    InvalidStackSize(usize),
}
