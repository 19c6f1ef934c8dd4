use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Fetch timed out after {0}s")]
    FetchTimeout(u64),

    #[error("Symbol resolution error: {0}")]
    Resolver(String),

    #[error("Price lookup error: {0}")]
    Price(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Transient errors worth retrying on the next scan cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Fetch(_) | Error::FetchTimeout(_) | Error::Price(_) | Error::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::FetchTimeout(30).is_retryable());
        assert!(Error::Fetch("rpc down".to_string()).is_retryable());
        assert!(!Error::Config("bad wallet".to_string()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = Error::FetchTimeout(30);
        assert_eq!(err.to_string(), "Fetch timed out after 30s");
    }
}
