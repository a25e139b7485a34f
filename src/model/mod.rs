//! Data models for the annotation session.

mod annotation;
mod image;
mod saved;

pub use annotation::{AnnotationRecord, Categories, problem_statement};
pub use image::{
    CategoryGroup, CategoryId, ImageId, ImageMetadata, ImageRecord, InstanceAttributes,
    attribute_tag,
};
pub use saved::{SavedData, Upsert};
