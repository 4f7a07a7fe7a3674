//! Error types for quakemap.
//!
//! Uses `thiserror` for library-style error definitions. Every variant is
//! recoverable: the orchestrator turns them into an empty map or an
//! "unavailable" status line.

use thiserror::Error;

/// Errors that can occur while talking to the quake API.
#[derive(Error, Debug)]
pub enum QuakeError {
    /// HTTP request failed (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Body was not JSON
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// API answered with a non-success status
    #[error("quake API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// JSON had the wrong shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
