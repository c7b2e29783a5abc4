//! Error taxonomy shared by the scan client.
//!
//! Errors raised while starting a scan (`Validation`, `Network`, `Backend`,
//! `ScanInFlight`) are returned to the caller directly and leave no session
//! behind. Errors raised mid-poll are recorded on the session as
//! `error_message` instead of crossing the controller boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Target syntax or policy rejected before any network call
    #[error("Invalid scan target: {0}")]
    Validation(String),

    /// Transport failure reaching the backend
    #[error("Could not reach the scan backend: {0}")]
    Network(String),

    /// Backend responded with an error body
    #[error("Scan backend error: {0}")]
    Backend(String),

    /// Polling gave up without observing a terminal status
    #[error("Scan status polling exhausted after {attempts} attempts")]
    PollingExhausted { attempts: u32 },

    /// A scan is already validating, requesting, or polling
    #[error("A scan is already in progress")]
    ScanInFlight,

    /// Operation requires a terminal session state
    #[error("Operation not valid in the current state: {0}")]
    InvalidState(&'static str),

    /// Internal cancellation signal; surfaced as the `Cancelled` phase,
    /// never as a user-facing failure
    #[error("Scan was cancelled")]
    Cancelled,
}

impl Error {
    /// User-friendly message suitable for direct display.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(msg) => {
                format!("The scan target is not valid: {}", msg)
            }
            Error::Network(msg) => format!(
                "Could not reach the scan backend: {}\n\nCheck that the backend is running and the API URL is correct.",
                msg
            ),
            Error::Backend(msg) => format!("The scan backend reported an error: {}", msg),
            Error::PollingExhausted { attempts } => format!(
                "The scan did not finish after {} status checks. It may still be running on the backend.",
                attempts
            ),
            Error::ScanInFlight => {
                "A scan is already in progress. Cancel it or wait for it to finish.".to_string()
            }
            Error::InvalidState(op) => format!("{} is not available right now", op),
            Error::Cancelled => "The scan was cancelled.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
