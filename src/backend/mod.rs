//! Persistence backend seam.
//!
//! The session controller never talks HTTP itself. It calls a [`Backend`],
//! which a host implements on top of whatever transport it has (browser
//! fetch, an HTTP client, or the in-process [`LocalBackend`]).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use refcap::backend::LocalBackend;
//! use refcap::{Session, SessionConfig};
//!
//! let mut backend = LocalBackend::from_dataset_json(&json)?;
//! let mut session = Session::start(&mut backend, SessionConfig::default());
//! session.select_catalogued(0, 1)?;
//! ```

mod api;
mod error;
mod local;

pub use api::{
    CacheBuster, DeleteBody, Endpoint, ExcludedCategoriesBody, ImageResponse, LastIndexResponse,
    LoadedImage, Reply, SaveBody,
};
pub use error::BackendError;
pub use local::LocalBackend;

use crate::model::{CategoryId, ImageMetadata, SavedData};

/// Operations the session controller needs from the persistence backend.
///
/// Each method corresponds to one endpoint in [`Endpoint`]. Methods that
/// mutate return the backend's [`Reply`] as-is; interpreting `success: false`
/// (including the "not found" case on delete) is left to the controller.
pub trait Backend {
    /// Fetch the image at a zero-based index of the full collection.
    fn fetch_image(&mut self, index: usize) -> Result<LoadedImage, BackendError>;

    /// Fetch every saved annotation, grouped by image.
    fn fetch_saved_data(&mut self) -> Result<SavedData, BackendError>;

    /// Fetch metadata for every image, in collection order.
    fn fetch_all_images_metadata(&mut self) -> Result<Vec<ImageMetadata>, BackendError>;

    /// Index of the image whose annotation was created most recently.
    fn fetch_last_created_index(&mut self) -> Result<usize, BackendError>;

    /// Persist one annotation record.
    fn save_annotation(&mut self, body: &SaveBody) -> Result<Reply, BackendError>;

    /// Delete one annotation record by identifier.
    fn delete_annotation(&mut self, body: &DeleteBody) -> Result<Reply, BackendError>;

    /// Load the persisted category filter.
    fn fetch_excluded_categories(&mut self) -> Result<Vec<CategoryId>, BackendError>;

    /// Persist the category filter.
    fn save_excluded_categories(&mut self, body: &ExcludedCategoriesBody)
    -> Result<Reply, BackendError>;
}
