//! Wire shapes and endpoint paths of the annotation backend API.
//!
//! All endpoints speak JSON. Every request carries a session-constant
//! `cache` query parameter so intermediaries never serve stale bodies.

use serde::{Deserialize, Serialize};
use web_time::{SystemTime, UNIX_EPOCH};

use crate::backend::BackendError;
use crate::model::{AnnotationRecord, CategoryId, ImageId, ImageRecord};

/// Session-constant cache-busting token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheBuster(u128);

impl CacheBuster {
    /// Token derived from the current wall-clock time.
    pub fn new() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self(millis)
    }

    /// Token with a fixed value.
    pub fn fixed(value: u128) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for CacheBuster {
    fn default() -> Self {
        Self::new()
    }
}

/// Backend endpoints used by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /api/image/{index}`
    Image(usize),
    /// `GET /api/saved_data`
    SavedData,
    /// `GET /api/all_images_metadata`
    AllImagesMetadata,
    /// `GET /api/last_created_annotation_index`
    LastCreatedAnnotationIndex,
    /// `POST /api/save_reference`
    SaveReference,
    /// `POST /api/delete_annotation`
    DeleteAnnotation,
    /// `GET /api/excluded_categories`
    ExcludedCategories,
    /// `POST /api/save_excluded_categories`
    SaveExcludedCategories,
}

impl Endpoint {
    /// HTTP method for this endpoint.
    pub fn method(&self) -> &'static str {
        match self {
            Endpoint::SaveReference
            | Endpoint::DeleteAnnotation
            | Endpoint::SaveExcludedCategories => "POST",
            _ => "GET",
        }
    }

    /// Request path including the cache-busting query parameter.
    pub fn path(&self, cache: CacheBuster) -> String {
        let base = match self {
            Endpoint::Image(index) => format!("/api/image/{}", index),
            Endpoint::SavedData => "/api/saved_data".to_string(),
            Endpoint::AllImagesMetadata => "/api/all_images_metadata".to_string(),
            Endpoint::LastCreatedAnnotationIndex => {
                "/api/last_created_annotation_index".to_string()
            }
            Endpoint::SaveReference => "/api/save_reference".to_string(),
            Endpoint::DeleteAnnotation => "/api/delete_annotation".to_string(),
            Endpoint::ExcludedCategories => "/api/excluded_categories".to_string(),
            Endpoint::SaveExcludedCategories => "/api/save_excluded_categories".to_string(),
        };
        format!("{}?cache={}", base, cache.value())
    }
}

/// A successfully served image together with the collection size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedImage {
    /// Size of the full, unfiltered image list
    pub total_images: usize,
    #[serde(flatten)]
    pub image: ImageRecord,
}

/// Body of `GET /api/image/{index}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageResponse {
    Failed { error: String },
    Loaded(LoadedImage),
}

impl ImageResponse {
    pub fn into_result(self) -> Result<LoadedImage, BackendError> {
        match self {
            ImageResponse::Failed { error } => Err(BackendError::server(error)),
            ImageResponse::Loaded(loaded) => Ok(loaded),
        }
    }
}

/// Body of `GET /api/last_created_annotation_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LastIndexResponse {
    Failed { error: String },
    Found { index: usize },
}

impl LastIndexResponse {
    pub fn into_result(self) -> Result<usize, BackendError> {
        match self {
            LastIndexResponse::Failed { error } => Err(BackendError::server(error)),
            LastIndexResponse::Found { index } => Ok(index),
        }
    }
}

/// Body of `POST /api/save_reference`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveBody {
    pub image_id: ImageId,
    pub annotation: AnnotationRecord,
}

/// Body of `POST /api/delete_annotation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBody {
    pub image_id: ImageId,
    pub annotation_id: String,
}

/// Body of `GET /api/excluded_categories` and `POST /api/save_excluded_categories`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedCategoriesBody {
    #[serde(default)]
    pub excluded_categories: Vec<CategoryId>,
}

/// Acknowledgment returned by mutating endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Reply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Whether the backend reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        !self.success
            && self
                .message
                .as_deref()
                .is_some_and(|m| m.to_ascii_lowercase().contains("not found"))
    }

    /// Convert a failed reply into an error.
    pub fn into_result(self) -> Result<Reply, BackendError> {
        if self.success {
            Ok(self)
        } else {
            Err(BackendError::rejected(
                self.message.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}
