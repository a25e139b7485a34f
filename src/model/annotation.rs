//! Persisted annotation records.
//!
//! The categorical sub-object went through several schema revisions:
//! the first carried an `occluded` radio value and auto-computed
//! `distractors` as display text, later ones added multi-select `attribute`
//! tags and made `distractors` a manually confirmed integer. Records from
//! every revision load into the current [`Categories`] shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::PROBLEM_PREFIX;
use crate::geometry::Corners;
use crate::model::ImageId;

/// Build the problem statement shown for (and stored with) a caption.
///
/// Returns an empty string when the trimmed caption is empty.
pub fn problem_statement(caption: &str) -> String {
    let caption = caption.trim();
    if caption.is_empty() {
        String::new()
    } else {
        format!("{}: {}.", PROBLEM_PREFIX, caption)
    }
}

/// Categorical labels attached to an annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCategories")]
pub struct Categories {
    /// Caption describes something absent from the image
    pub empty_case: bool,
    /// Reasoning hops value
    pub hops: Option<String>,
    /// Referring-expression type tags
    #[serde(rename = "type")]
    pub types: Vec<String>,
    /// Attribute tags
    pub attribute: Vec<String>,
    /// Confirmed distractor count
    pub distractors: Option<u32>,
}

/// Loosely-typed categories as found in persisted records of any revision.
#[derive(Debug, Default, Deserialize)]
struct RawCategories {
    #[serde(default)]
    empty_case: Value,
    #[serde(default)]
    hops: Value,
    #[serde(default, rename = "type")]
    types: Value,
    #[serde(default)]
    occluded: Value,
    #[serde(default)]
    attribute: Value,
    #[serde(default)]
    distractors: Value,
}

fn value_to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes"),
        Value::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    }
}

fn value_to_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_to_label).collect(),
        other => value_to_label(other).into_iter().collect(),
    }
}

fn value_to_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl From<RawCategories> for Categories {
    fn from(raw: RawCategories) -> Self {
        let mut attribute = value_to_tags(&raw.attribute);

        // First revision stored occlusion as its own radio field
        if value_to_bool(&raw.occluded) && !attribute.iter().any(|a| a == "occluded") {
            log::trace!("Migrating legacy occluded flag into attribute tags");
            attribute.push("occluded".to_string());
        }

        Self {
            empty_case: value_to_bool(&raw.empty_case),
            hops: value_to_label(&raw.hops),
            types: value_to_tags(&raw.types),
            attribute,
            distractors: value_to_count(&raw.distractors),
        }
    }
}

/// One persisted annotation: a caption, its solution box and labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Stable key; `{image_id}_{timestamp}` when generated client-side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_id: Option<String>,
    #[serde(default)]
    pub dataset: String,
    #[serde(default)]
    pub text_type: String,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub width: u32,
    /// Caption text
    #[serde(default)]
    pub normal_caption: String,
    /// Source image reference (prefix + file name)
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub file_name: String,
    /// Derived problem statement
    #[serde(default)]
    pub problem: String,
    /// Solution box, `None` for the empty case
    #[serde(default)]
    pub solution: Option<Corners>,
    /// Solution in the 0-1000 coordinate space
    #[serde(default)]
    pub normalized_solution: Option<[u32; 4]>,
    #[serde(default)]
    pub categories: Categories,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_index: Option<ImageId>,
    /// Fields this version does not know about, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotationRecord {
    /// Legacy fallback identity: same caption and same solution box.
    pub fn matches_structurally(&self, other: &AnnotationRecord) -> bool {
        self.normal_caption == other.normal_caption && self.solution == other.solution
    }

    pub fn is_empty_case(&self) -> bool {
        self.categories.empty_case || self.solution.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_statement() {
        assert_eq!(
            problem_statement("  the red car  "),
            "Please provide the bounding box coordinate of the region this sentence describes: the red car."
        );
        assert_eq!(problem_statement("   "), "");
    }

    #[test]
    fn test_first_revision_categories_migrate() {
        let json = r#"{"empty_case": false, "hops": "2", "type": ["spatial"],
                       "occluded": true, "distractors": "3"}"#;
        let cats: Categories = serde_json::from_str(json).unwrap();
        assert_eq!(cats.hops.as_deref(), Some("2"));
        assert_eq!(cats.types, vec!["spatial".to_string()]);
        assert_eq!(cats.attribute, vec!["occluded".to_string()]);
        assert_eq!(cats.distractors, Some(3));
    }

    #[test]
    fn test_na_distractors_and_numeric_hops() {
        let json = r#"{"empty_case": true, "hops": 4, "distractors": "N/A", "occluded": false}"#;
        let cats: Categories = serde_json::from_str(json).unwrap();
        assert!(cats.empty_case);
        assert_eq!(cats.hops.as_deref(), Some("4"));
        assert_eq!(cats.distractors, None);
        assert!(cats.attribute.is_empty());
    }

    #[test]
    fn test_current_categories_serialize_shape() {
        let cats = Categories {
            empty_case: false,
            hops: Some("3".into()),
            types: vec!["verb".into()],
            attribute: vec!["truncated".into()],
            distractors: Some(2),
        };
        let value = serde_json::to_value(&cats).unwrap();
        assert_eq!(value["type"][0], "verb");
        assert_eq!(value["distractors"], 2);
        assert!(value.get("occluded").is_none());

        let back: Categories = serde_json::from_value(value).unwrap();
        assert_eq!(back, cats);
    }

    #[test]
    fn test_legacy_record_without_id_loads() {
        let json = r#"{
            "dataset": "refcocos_test",
            "normal_caption": "a dog",
            "image": "val2017/x.jpg",
            "solution": null,
            "categories": {"empty_case": true, "hops": "2", "type": [], "occluded": false,
                           "distractors": "5"},
            "legacy_note": "kept"
        }"#;
        let record: AnnotationRecord = serde_json::from_str(json).unwrap();
        assert!(record.annotation_id.is_none());
        assert!(record.is_empty_case());
        assert_eq!(record.categories.distractors, Some(5));
        assert_eq!(record.extra["legacy_note"], "kept");

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["legacy_note"], "kept");
    }
}
