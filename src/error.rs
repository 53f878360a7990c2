use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::{gemini::GeminiError, ingest::IngestError};

pub const GENERATION_FAILED_MESSAGE: &str =
    "An error occurred while generating the image. Please try again.";
pub const NO_CATEGORY_MESSAGE: &str =
    "Select at least one item to include in the collage.";

#[derive(Debug, Error)]
pub enum CollageError {
    #[error("no categories selected")]
    Validation,
    #[error("synthesis failed: {0}")]
    RemoteData(#[source] GeminiError),
    #[error("analysis failed: {0}")]
    Analysis(#[source] GeminiError),
    #[error("a generation request is already in progress")]
    Busy,
    #[error("image upload failed: {0}")]
    Ingest(#[from] IngestError),
    #[error("no reference image at index {0}")]
    ImageIndex(usize),
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("no generated image available")]
    NoResult,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CollageError {
    /// Text safe to show in the browser. Remote failures collapse to one
    /// generic message; the detail only goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation => NO_CATEGORY_MESSAGE.to_string(),
            Self::RemoteData(_) | Self::Analysis(_) | Self::Internal(_) => GENERATION_FAILED_MESSAGE.to_string(),
            Self::Busy => "A collage is already being generated. Please wait.".to_string(),
            Self::Ingest(e) => format!("Could not read the selected images: {e}"),
            Self::ImageIndex(_) => "That reference image no longer exists.".to_string(),
            Self::UnknownCategory(c) => format!("Unknown category: {c}"),
            Self::NoResult => "No collage has been generated yet.".to_string(),
            Self::InvalidInput(msg) => msg.clone(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation | Self::Ingest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UnknownCategory(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::RemoteData(_) | Self::Analysis(_) => StatusCode::BAD_GATEWAY,
            Self::Busy => StatusCode::CONFLICT,
            Self::ImageIndex(_) | Self::NoResult => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CollageError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.user_message() }))).into_response()
    }
}
