// Error taxonomy for the SheepIt client. The website only gives us three
// meaningful failure classes (transport, bad credentials, project cap), so
// everything else lands in `Unexpected`. Callers match on the variant instead
// of comparing message strings.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure or timeout. Retryable in principle, but the client
    /// never retries on its own.
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the username/password pair.
    #[error("login failed: {0}")]
    Login(String),

    /// Business-rule rejection on upload, e.g. the maximum number of
    /// simultaneous projects has been reached.
    #[error("upload rejected: {0}")]
    UploadLimit(String),

    /// Anything the client has no dedicated category for (unreadable
    /// archive file, surprising server response, ...).
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Network("timed out".into())
        } else {
            Error::Network("failed connecting to the sheepit server".into())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Unexpected(err.to_string())
    }
}
