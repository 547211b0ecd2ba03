//! Server error types.

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;

/// Errors raised while starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind or the server loop failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The dispatcher was already taken by an earlier `listen` call.
    #[error("server is already listening")]
    AlreadyListening,

    /// Prometheus recorder installation failed.
    #[error("metrics recorder error: {0}")]
    Metrics(#[from] BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = ServerError::from(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "address in use",
        ));
        assert!(err.to_string().contains("address in use"));
    }

    #[test]
    fn already_listening_display() {
        assert_eq!(ServerError::AlreadyListening.to_string(), "server is already listening");
    }
}
