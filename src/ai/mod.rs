//! AI-assisted photo edits.
//!
//! | Piece | Role |
//! |---|---|
//! | [`DataUri`] | `data:<mime>;base64,...` values going in and out of the model |
//! | [`GenerativeModel`] | The seam: ordered prompt parts in, images out |
//! | [`GeminiClient`] | Blocking `generateContent` client with a request timeout |
//! | [`flows`] | Face centering, background removal, and the passport composition |
//!
//! Every flow makes one model call per step with no retries. A response
//! without an image is an error, never an empty success.

pub mod client;
pub mod data_uri;
pub mod flows;

pub use client::{GeminiClient, GenerateRequest, GenerateResponse, GenerativeModel, Modality, Part};
pub use data_uri::DataUri;
pub use flows::{
    FaceCenterInput, FaceCenterOutput, RemoveBackgroundInput, RemoveBackgroundOutput, face_center,
    passport_photo, remove_background, validate_hex_color,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{0}")]
    EmptyResponse(String),
    #[error("No API key found; set one of {}", .0.join(", "))]
    MissingApiKey(Vec<String>),
    #[error("Malformed model response: {0}")]
    Json(#[from] serde_json::Error),
}
