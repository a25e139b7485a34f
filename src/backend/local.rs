//! In-process backend over a multi-instance dataset.
//!
//! Holds the dataset images and the flat list of saved records in memory and
//! answers the same requests the HTTP backend does, with the same replies.

use serde::Deserialize;

use crate::backend::{
    Backend, BackendError, DeleteBody, ExcludedCategoriesBody, LoadedImage, Reply, SaveBody,
};
use crate::constants::DEFAULT_IMAGE_PREFIX;
use crate::model::{AnnotationRecord, CategoryId, ImageMetadata, ImageRecord, SavedData};

/// Dataset file layout: `{ "images": [ ... ] }`.
#[derive(Debug, Deserialize)]
struct DatasetFile {
    images: Vec<ImageRecord>,
}

/// Backend that keeps everything in memory.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    images: Vec<ImageRecord>,
    records: Vec<AnnotationRecord>,
    excluded: Vec<CategoryId>,
    image_prefix: String,
}

impl LocalBackend {
    /// Create a backend serving the given images, with no saved records.
    pub fn new(images: Vec<ImageRecord>) -> Self {
        Self {
            images,
            records: Vec::new(),
            excluded: Vec::new(),
            image_prefix: DEFAULT_IMAGE_PREFIX.to_string(),
        }
    }

    /// Parse a multi-instance dataset file.
    pub fn from_dataset_json(json: &str) -> Result<Self, BackendError> {
        let dataset: DatasetFile = serde_json::from_str(json)?;
        log::info!("Loaded {} images with multiple instances", dataset.images.len());
        Ok(Self::new(dataset.images))
    }

    /// Seed previously saved records (flat output-file order).
    pub fn with_records(mut self, records: Vec<AnnotationRecord>) -> Self {
        self.records = records;
        self
    }

    /// Parse previously saved records from an output file body.
    pub fn with_records_json(self, json: &str) -> Result<Self, BackendError> {
        let records: Vec<AnnotationRecord> = serde_json::from_str(json)?;
        Ok(self.with_records(records))
    }

    /// Set the prefix that joins file names into record image references.
    pub fn with_image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.image_prefix = prefix.into();
        self
    }

    /// Saved records in storage order.
    pub fn records(&self) -> &[AnnotationRecord] {
        &self.records
    }

    /// Serialize saved records the way the output file stores them.
    pub fn records_json(&self) -> Result<String, BackendError> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    pub fn excluded(&self) -> &[CategoryId] {
        &self.excluded
    }

    fn image_key(&self, image: &ImageRecord) -> String {
        format!("{}{}", self.image_prefix, image.file_name)
    }

    fn image_index_of(&self, record: &AnnotationRecord) -> Option<usize> {
        self.images
            .iter()
            .position(|image| self.image_key(image) == record.image)
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Backend for LocalBackend {
    fn fetch_image(&mut self, index: usize) -> Result<LoadedImage, BackendError> {
        let image = self
            .images
            .get(index)
            .ok_or_else(|| BackendError::server("Image not found"))?;

        let mut image = image.clone();
        if image.image_data.is_empty() {
            image.image_data = image.path.clone();
        }

        Ok(LoadedImage {
            total_images: self.images.len(),
            image,
        })
    }

    fn fetch_saved_data(&mut self) -> Result<SavedData, BackendError> {
        let grouped = self
            .images
            .iter()
            .map(|image| {
                let key = self.image_key(image);
                let records = self
                    .records
                    .iter()
                    .filter(|r| r.image == key)
                    .cloned()
                    .collect::<Vec<_>>();
                (image.image_id.clone(), records)
            })
            .collect();
        Ok(grouped)
    }

    fn fetch_all_images_metadata(&mut self) -> Result<Vec<ImageMetadata>, BackendError> {
        Ok(self.images.iter().map(ImageMetadata::from).collect())
    }

    fn fetch_last_created_index(&mut self) -> Result<usize, BackendError> {
        Ok(self
            .records
            .last()
            .and_then(|record| self.image_index_of(record))
            .unwrap_or(0))
    }

    fn save_annotation(&mut self, body: &SaveBody) -> Result<Reply, BackendError> {
        let mut annotation = body.annotation.clone();

        let existing = annotation.annotation_id.as_ref().and_then(|id| {
            self.records.iter().position(|r| {
                r.image == annotation.image && r.annotation_id.as_ref() == Some(id)
            })
        });

        match existing {
            Some(index) => {
                log::debug!("Updating stored record {}", index);
                self.records[index] = annotation;
            }
            None => {
                if annotation.annotation_id.is_none() {
                    let n = self
                        .records
                        .iter()
                        .filter(|r| r.image == annotation.image)
                        .count();
                    annotation.annotation_id = Some(format!("{}_{}", body.image_id, n));
                }
                self.records.push(annotation);
            }
        }

        Ok(Reply::ok("Annotation saved successfully"))
    }

    fn delete_annotation(&mut self, body: &DeleteBody) -> Result<Reply, BackendError> {
        let position = self
            .records
            .iter()
            .position(|r| r.annotation_id.as_deref() == Some(body.annotation_id.as_str()));

        match position {
            Some(index) => {
                self.records.remove(index);
                Ok(Reply::ok("Annotation deleted successfully"))
            }
            None => Ok(Reply::failed("Annotation not found")),
        }
    }

    fn fetch_excluded_categories(&mut self) -> Result<Vec<CategoryId>, BackendError> {
        Ok(self.excluded.clone())
    }

    fn save_excluded_categories(
        &mut self,
        body: &ExcludedCategoriesBody,
    ) -> Result<Reply, BackendError> {
        self.excluded = body.excluded_categories.clone();
        Ok(Reply::ok("Excluded categories saved"))
    }
}
