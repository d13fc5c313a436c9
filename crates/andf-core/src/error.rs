//! Failures at the backend boundary.
//!
//! Nothing in here ever reaches the renderer as a raised condition: the health
//! monitor folds these into a [`ConnectivityStatus`](crate::ConnectivityStatus)
//! and the exchange controller folds them into an error message.

/// Errors from talking to the answering service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request never produced an HTTP response (refused, DNS, reset...)
    #[error("impossible de joindre le serveur : {0}")]
    Transport(String),
    #[error("le serveur n'a pas répondu à temps")]
    Timeout,
    /// The service answered with a non-2xx status
    #[error("le serveur a répondu avec le statut {0}")]
    Status(u16),
    /// 2xx response whose body is not a usable answer
    #[error("réponse invalide du serveur : {0}")]
    Malformed(String),
    /// The spawned exchange task panicked or was aborted
    #[error("l'échange a été interrompu : {0}")]
    TaskFailed(String),
}

impl BackendError {
    /// Network-level failure, as opposed to a service that answered badly
    pub fn is_connectivity(&self) -> bool {
        matches!(self, BackendError::Transport(_) | BackendError::Timeout)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if let Some(status) = err.status() {
            BackendError::Status(status.as_u16())
        } else if err.is_decode() {
            BackendError::Malformed(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for BackendError {
    fn from(err: tokio::task::JoinError) -> Self {
        BackendError::TaskFailed(err.to_string())
    }
}
