use serde::Serialize;
use thiserror::Error;

use crate::States;

/// Reasons a resource retrieval can fail. Once formatted into an error
/// message these are no longer distinguishable; use a custom
/// [ErrorFormatter](crate::ErrorFormatter) to keep them apart.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The request could not be completed at all, or its body could not be
    /// read
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a status that does not indicate success.
    /// Displays as `{"code":<code>,"text":"<reason phrase>"}`.
    #[error("{}", status_line(.code, .text))]
    Unsuccessful {
        /// The numeric status code
        code: u16,
        /// The reason phrase of the status, empty when there is none
        text: String,
    },

    /// The body could not be turned into the requested data type
    #[error("{0}")]
    Decode(#[from] serde_json::Error),
}

impl ResourceError {
    pub(crate) fn unsuccessful(status: reqwest::StatusCode) -> Self {
        ResourceError::Unsuccessful {
            code: status.as_u16(),
            text: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Serialize)]
struct StatusLine<'a> {
    code: u16,
    text: &'a str,
}

fn status_line(code: &u16, text: &str) -> String {
    // Serializing two plain fields into a String cannot fail
    serde_json::to_string(&StatusLine { code: *code, text }).unwrap_or_default()
}

/// A set of state flags in which not exactly one flag is set
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Expected exactly one state flag to be set, got {0:?}")]
pub struct InvalidStates(pub States);
