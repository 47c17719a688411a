#![warn(clippy::pedantic)]

pub mod cli;
pub mod http_server;
pub mod kubernetes;
pub mod metrics;
pub mod otel;
pub mod ssh_access;
pub mod synthesis;

/*
 * ============================================================================
 * Error
 * ============================================================================
 */
#[derive(Debug)]
pub enum Error {
    Kube(kube::Error),
    MissingObjectKey(&'static str),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Kube(e) => write!(f, "kube error: {e}"),
            Error::MissingObjectKey(key) => write!(f, "missing object key: {key}"),
        }
    }
}

/*
 * ============================================================================
 * Result
 * ============================================================================
 */
pub type Result<T, E = Error> = std::result::Result<T, E>;
