//! Error types for the editor

use pageweave_common::CommonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    /// Pasted or generated template input failed its shape check
    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    #[error("Node not found: {0}")]
    UnknownNode(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::Common(CommonError::Json(e))
    }
}

impl From<std::io::Error> for EditorError {
    fn from(e: std::io::Error) -> Self {
        EditorError::Common(CommonError::Io(e))
    }
}

pub type EditorResult<T> = Result<T, EditorError>;
