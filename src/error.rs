use reqwest::StatusCode;
use thiserror::Error;

/// Failures the sync flow distinguishes; everything else travels as `anyhow::Error`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The landing page had no usable sign-in form.
    #[error("Login page has no sign-in form with an action URL")]
    LoginFormMissing,

    #[error("Error logging in! Got status {status}")]
    LoginFailed { status: StatusCode },

    #[error("{service} API returned {status}: {body}")]
    Api {
        service: &'static str,
        status: StatusCode,
        body: String,
    },
}
