//! In-memory mirror of every persisted annotation, grouped by image.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{AnnotationRecord, ImageId};

/// Result of inserting a record into the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// An existing record with the same identifier was replaced at this index
    Updated(usize),
    /// The record was appended at this index
    Appended(usize),
}

impl Upsert {
    pub fn index(&self) -> usize {
        match self {
            Upsert::Updated(i) | Upsert::Appended(i) => *i,
        }
    }
}

/// Saved-data mirror: image id to its ordered list of annotation records.
///
/// Loaded once from the backend and then kept in step with every successful
/// save and delete, so navigation never needs a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SavedData(BTreeMap<ImageId, Vec<AnnotationRecord>>);

impl SavedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records saved for an image (empty if none).
    pub fn records(&self, image_id: &ImageId) -> &[AnnotationRecord] {
        self.0.get(image_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn record(&self, image_id: &ImageId, index: usize) -> Option<&AnnotationRecord> {
        self.0.get(image_id).and_then(|list| list.get(index))
    }

    pub fn count(&self, image_id: &ImageId) -> usize {
        self.records(image_id).len()
    }

    pub fn has_annotations(&self, image_id: &ImageId) -> bool {
        self.count(image_id) > 0
    }

    /// Total records across all images.
    pub fn total_annotations(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Number of images with at least one record.
    pub fn annotated_images(&self) -> usize {
        self.0.values().filter(|list| !list.is_empty()).count()
    }

    /// Replace the record with the same identifier, or append it.
    pub fn upsert(&mut self, image_id: &ImageId, record: AnnotationRecord) -> Upsert {
        let list = self.0.entry(image_id.clone()).or_default();

        let existing = record
            .annotation_id
            .as_ref()
            .and_then(|id| list.iter().position(|r| r.annotation_id.as_ref() == Some(id)));

        match existing {
            Some(index) => {
                list[index] = record;
                Upsert::Updated(index)
            }
            None => {
                list.push(record);
                Upsert::Appended(list.len() - 1)
            }
        }
    }

    /// Index of the record with the given identifier.
    pub fn position_by_id(&self, image_id: &ImageId, annotation_id: &str) -> Option<usize> {
        self.records(image_id)
            .iter()
            .position(|r| r.annotation_id.as_deref() == Some(annotation_id))
    }

    /// Index of `target`: by identifier, falling back to caption + solution.
    pub fn position_of(&self, image_id: &ImageId, target: &AnnotationRecord) -> Option<usize> {
        if let Some(index) = target
            .annotation_id
            .as_deref()
            .and_then(|id| self.position_by_id(image_id, id))
        {
            return Some(index);
        }
        self.records(image_id)
            .iter()
            .position(|r| r.matches_structurally(target))
    }

    /// Remove and return the record at `index`.
    pub fn remove(&mut self, image_id: &ImageId, index: usize) -> Option<AnnotationRecord> {
        let list = self.0.get_mut(image_id)?;
        if index >= list.len() {
            return None;
        }
        let removed = list.remove(index);
        if list.is_empty() {
            self.0.remove(image_id);
        }
        Some(removed)
    }

    /// Give the record at `index` an identifier if it lacks one.
    ///
    /// Returns the record's identifier after the call.
    pub fn ensure_identifier(
        &mut self,
        image_id: &ImageId,
        index: usize,
        generate: impl FnOnce() -> String,
    ) -> Option<String> {
        let record = self.0.get_mut(image_id)?.get_mut(index)?;
        if record.annotation_id.is_none() {
            let id = generate();
            log::debug!("Assigned identifier {} to legacy record", id);
            record.annotation_id = Some(id);
        }
        record.annotation_id.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ImageId, &Vec<AnnotationRecord>)> {
        self.0.iter()
    }
}

impl FromIterator<(ImageId, Vec<AnnotationRecord>)> for SavedData {
    fn from_iter<T: IntoIterator<Item = (ImageId, Vec<AnnotationRecord>)>>(iter: T) -> Self {
        Self(iter.into_iter().filter(|(_, list)| !list.is_empty()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Corners;

    fn record(id: Option<&str>, caption: &str) -> AnnotationRecord {
        serde_json::from_value(serde_json::json!({
            "annotation_id": id,
            "normal_caption": caption,
            "solution": [1, 2, 3, 4],
        }))
        .unwrap()
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let img = ImageId::new("a");
        let mut saved = SavedData::new();
        assert_eq!(saved.upsert(&img, record(Some("a_1"), "one")), Upsert::Appended(0));
        assert_eq!(saved.upsert(&img, record(Some("a_2"), "two")), Upsert::Appended(1));
        assert_eq!(saved.upsert(&img, record(Some("a_1"), "uno")), Upsert::Updated(0));
        assert_eq!(saved.count(&img), 2);
        assert_eq!(saved.records(&img)[0].normal_caption, "uno");
        assert_eq!(saved.total_annotations(), 2);
    }

    #[test]
    fn test_upsert_without_id_appends() {
        let img = ImageId::new("a");
        let mut saved = SavedData::new();
        saved.upsert(&img, record(None, "x"));
        saved.upsert(&img, record(None, "x"));
        assert_eq!(saved.count(&img), 2);
    }

    #[test]
    fn test_position_structural_fallback() {
        let img = ImageId::new("a");
        let mut saved = SavedData::new();
        saved.upsert(&img, record(Some("a_1"), "one"));
        saved.upsert(&img, record(None, "legacy"));

        let mut probe = record(None, "legacy");
        assert_eq!(saved.position_of(&img, &probe), Some(1));
        probe.solution = Some(Corners::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(saved.position_of(&img, &probe), None);
        assert_eq!(saved.position_of(&img, &record(Some("a_1"), "renamed")), Some(0));
    }

    #[test]
    fn test_remove_last_drops_image() {
        let img = ImageId::new("a");
        let mut saved = SavedData::new();
        saved.upsert(&img, record(Some("a_1"), "one"));
        assert!(saved.remove(&img, 3).is_none());
        assert!(saved.remove(&img, 0).is_some());
        assert!(!saved.has_annotations(&img));
        assert_eq!(saved.annotated_images(), 0);
    }

    #[test]
    fn test_ensure_identifier_once() {
        let img = ImageId::new("a");
        let mut saved = SavedData::new();
        saved.upsert(&img, record(None, "legacy"));
        let first = saved.ensure_identifier(&img, 0, || "a_100".to_string());
        let second = saved.ensure_identifier(&img, 0, || "a_200".to_string());
        assert_eq!(first.as_deref(), Some("a_100"));
        assert_eq!(second.as_deref(), Some("a_100"));
    }

    #[test]
    fn test_deserialize_mapping() {
        let json = r#"{"img1": [{"annotation_id": "img1_1", "normal_caption": "c"}], "42": []}"#;
        let saved: SavedData = serde_json::from_str(json).unwrap();
        assert_eq!(saved.count(&ImageId::new("img1")), 1);
        assert_eq!(saved.count(&ImageId::new("42")), 0);
    }
}
