//! Session controller errors.

use thiserror::Error;

use crate::backend::BackendError;
use crate::session::ValidationReport;

/// Errors returned by session operations.
///
/// None of these end the session: on error the controller keeps its prior
/// state and shows a status message.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Image index {index} is out of range (total {total})")]
    OutOfRange { index: usize, total: usize },

    #[error("No image is loaded")]
    NoImageLoaded,

    #[error("Box too small ({dx:.1} x {dy:.1}, minimum {min})")]
    BoxTooSmall { dx: f64, dy: f64, min: f64 },

    #[error("Not drawing a custom box")]
    NotDrawing,

    #[error("{0}")]
    Invalid(ValidationReport),

    #[error("Could not find annotation in saved data")]
    AnnotationNotFound,

    #[error("No saved annotation is selected")]
    NoSavedAnnotation,

    #[error("Unknown {field} value '{value}'")]
    UnknownOption { field: &'static str, value: String },

    #[error("Category {category} instance {instance} does not exist")]
    CategoryOutOfRange { category: usize, instance: usize },

    #[error("Response arrived after the session moved on")]
    Stale,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SessionError {
    pub fn unknown_option(field: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownOption {
            field,
            value: value.into(),
        }
    }
}
