//! Image and category records supplied by the backend.
//!
//! These are immutable for the session: they are fetched once per
//! navigation and only read afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::geometry::{BoxXywh, Corners};

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or integer identifier")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }
}

/// Image identifier.
///
/// Datasets use either string ids (Open Images) or integer ids (COCO), and
/// saved-data maps always key them as strings, so both forms deserialize
/// into the same string-backed id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ImageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IdVisitor).map(Self)
    }
}

/// Category identifier, string or integer on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CategoryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IdVisitor).map(Self)
    }
}

/// Per-instance attribute flags, e.g. `{"IsOccluded": 1, "IsTruncated": 0}`.
pub type InstanceAttributes = BTreeMap<String, Value>;

/// Map an instance flag name to the attribute tag it checks.
///
/// `IsOccluded` becomes `occluded`; names without the `Is` prefix are only
/// lowercased.
pub fn attribute_tag(flag: &str) -> String {
    flag.strip_prefix("Is").unwrap_or(flag).to_lowercase()
}

fn flag_is_set(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::Bool(b) => *b,
        _ => false,
    }
}

/// A category with more than one instance in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
    /// Category identifier
    pub category_id: CategoryId,
    /// Display name
    #[serde(default)]
    pub category_name: String,
    /// Number of instances of this category in the image
    #[serde(default)]
    pub count: u32,
    /// Instance boxes in `[x, y, width, height]` form
    #[serde(default)]
    pub instances: Vec<BoxXywh>,
    /// Optional flags parallel to `instances`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_attributes: Option<Vec<InstanceAttributes>>,
}

impl CategoryGroup {
    /// Create a group whose count matches its instance list.
    pub fn new(category_id: impl Into<String>, name: &str, instances: Vec<BoxXywh>) -> Self {
        Self {
            category_id: CategoryId::new(category_id),
            category_name: name.to_string(),
            count: u32::try_from(instances.len()).unwrap_or(u32::MAX),
            instances,
            instance_attributes: None,
        }
    }

    /// Attach per-instance attribute flags.
    pub fn with_attributes(mut self, attributes: Vec<InstanceAttributes>) -> Self {
        self.instance_attributes = Some(attributes);
        self
    }

    /// Corners of the instance at `index`.
    pub fn instance_corners(&self, index: usize) -> Option<Corners> {
        self.instances.get(index).copied().map(Corners::from_xywh)
    }

    /// Attribute tags whose flag equals 1 for the instance at `index`.
    pub fn auto_attributes(&self, index: usize) -> BTreeSet<String> {
        self.instance_attributes
            .as_ref()
            .and_then(|all| all.get(index))
            .map(|flags| {
                flags
                    .iter()
                    .filter(|(_, value)| flag_is_set(value))
                    .map(|(name, _)| attribute_tag(name))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Image metadata and its browsable categories, as served per index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_id: ImageId,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    /// Displayable payload (data URL or path reference)
    #[serde(default)]
    pub image_data: String,
    /// Only categories with more than one instance are listed
    #[serde(rename = "categories_with_multiple_instances", default)]
    pub categories: Vec<CategoryGroup>,
}

impl ImageRecord {
    /// Sum of instance counts over all listed categories.
    pub fn total_instances(&self) -> u32 {
        self.categories.iter().map(|c| c.count).sum()
    }

    /// Find the catalogued instance whose corners equal `corners` exactly.
    pub fn find_instance(&self, corners: &Corners) -> Option<(usize, usize)> {
        self.categories.iter().enumerate().find_map(|(cat_idx, cat)| {
            cat.instances
                .iter()
                .position(|bbox| Corners::from_xywh(*bbox) == *corners)
                .map(|inst_idx| (cat_idx, inst_idx))
        })
    }

    /// Identifiers of all listed categories.
    pub fn category_ids(&self) -> impl Iterator<Item = &CategoryId> {
        self.categories.iter().map(|c| &c.category_id)
    }
}

/// Lightweight per-image metadata used to build filter index maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub image_id: ImageId,
    #[serde(default)]
    pub file_name: String,
    #[serde(rename = "categories_with_multiple_instances", default)]
    pub categories: Vec<CategoryGroup>,
}

impl ImageMetadata {
    pub fn category_ids(&self) -> impl Iterator<Item = &CategoryId> {
        self.categories.iter().map(|c| &c.category_id)
    }
}

impl From<&ImageRecord> for ImageMetadata {
    fn from(record: &ImageRecord) -> Self {
        Self {
            image_id: record.image_id.clone(),
            file_name: record.file_name.clone(),
            categories: record.categories.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_accept_strings_and_integers() {
        let a: ImageId = serde_json::from_str("\"0001eeaf4aed83f9\"").unwrap();
        let b: ImageId = serde_json::from_str("139").unwrap();
        assert_eq!(a.as_str(), "0001eeaf4aed83f9");
        assert_eq!(b, ImageId::new("139"));
        assert_eq!(serde_json::to_string(&b).unwrap(), "\"139\"");
    }

    #[test]
    fn test_new_group_counts_instances() {
        let group = CategoryGroup::new("c1", "cat", vec![[0.0, 0.0, 1.0, 1.0]; 3]);
        assert_eq!(group.count, 3);
        assert_eq!(group.instances.len(), 3);
        assert_eq!(CategoryGroup::new("c2", "cup", Vec::new()).count, 0);
    }

    #[test]
    fn test_attribute_tag() {
        assert_eq!(attribute_tag("IsOccluded"), "occluded");
        assert_eq!(attribute_tag("IsGroupOf"), "groupof");
        assert_eq!(attribute_tag("Inside"), "inside");
    }

    #[test]
    fn test_auto_attributes_only_set_flags() {
        let mut flags = InstanceAttributes::new();
        flags.insert("IsOccluded".into(), Value::from(1));
        flags.insert("IsTruncated".into(), Value::from(0));
        flags.insert("IsDepiction".into(), Value::from(-1));
        let group = CategoryGroup::new("c1", "cat", vec![[0.0, 0.0, 1.0, 1.0]])
            .with_attributes(vec![flags]);

        let attrs = group.auto_attributes(0);
        assert_eq!(attrs.len(), 1);
        assert!(attrs.contains("occluded"));
        assert!(group.auto_attributes(5).is_empty());
    }

    #[test]
    fn test_find_instance_exact_match() {
        let record = ImageRecord {
            image_id: ImageId::new("img"),
            path: String::new(),
            file_name: "img.jpg".into(),
            width: 100,
            height: 100,
            image_data: String::new(),
            categories: vec![
                CategoryGroup::new("a", "cat", vec![[1.0, 2.0, 3.0, 4.0], [10.5, 20.25, 5.0, 5.0]]),
                CategoryGroup::new("b", "dog", vec![[50.0, 50.0, 10.0, 10.0]]),
            ],
        };
        assert_eq!(
            record.find_instance(&Corners::new(10.5, 20.25, 15.5, 25.25)),
            Some((0, 1))
        );
        assert_eq!(
            record.find_instance(&Corners::new(50.0, 50.0, 60.0, 60.0)),
            Some((1, 0))
        );
        assert_eq!(record.find_instance(&Corners::new(50.0, 50.0, 60.0, 61.0)), None);
        assert_eq!(record.total_instances(), 3);
    }

    #[test]
    fn test_image_record_wire_shape() {
        let json = r#"{
            "image_id": "abc",
            "path": "data/abc.jpg",
            "file_name": "abc.jpg",
            "width": 640,
            "height": 480,
            "image_data": "data:image/jpeg;base64,AAAA",
            "categories_with_multiple_instances": [
                {"category_id": 3, "category_name": "car", "count": 2,
                 "instances": [[1, 2, 3, 4], [5, 6, 7, 8]]}
            ]
        }"#;
        let record: ImageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.categories.len(), 1);
        assert_eq!(record.categories[0].category_id, CategoryId::new("3"));
        assert_eq!(record.categories[0].instances[1], [5.0, 6.0, 7.0, 8.0]);
    }
}
