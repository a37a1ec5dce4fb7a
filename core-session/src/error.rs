use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Secure storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Session already initialized")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, SessionError>;
