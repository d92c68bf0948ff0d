//! Error taxonomy for the catalog synchronization pipeline
//!
//! Field-level extraction misses never surface here: they degrade to absent
//! values. These variants cover product-level failures (fatal for one
//! product) and session failures (fatal for the run).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Network/HTTP failure retrieving a datasheet.
    #[error("failed to fetch datasheet {url}{}: {message}", fmt_status(.status))]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// A datasheet document could not be decoded into text.
    #[error("failed to decode datasheet ({context}): {message}")]
    Parse { context: String, message: String },

    /// The marketplace session resource could not be acquired or driven.
    #[error("scrape session failure: {message}")]
    Session { message: String },

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SyncError {
    pub fn fetch_failure(url: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.to_string(),
            status,
            message: message.into(),
        }
    }

    pub fn parse_failure(context: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.to_string(),
            message: message.into(),
        }
    }

    pub fn session_failure(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}
