//! Caption and label form, and the completeness check gating save.

use std::collections::BTreeSet;
use std::fmt;

use crate::constants::READY_MESSAGE;
use crate::model::{AnnotationRecord, Categories, problem_statement};
use crate::session::Selection;

/// Editable fields of the annotation being worked on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub caption: String,
    pub hops: Option<String>,
    pub types: BTreeSet<String>,
    pub attributes: BTreeSet<String>,
    /// Confirmed distractor count
    pub distractors: Option<u32>,
}

impl FormState {
    /// Form populated from a saved record.
    pub fn from_record(record: &AnnotationRecord) -> Self {
        let categories = &record.categories;
        Self {
            caption: record.normal_caption.clone(),
            hops: categories.hops.clone(),
            types: categories.types.iter().cloned().collect(),
            attributes: categories.attribute.iter().cloned().collect(),
            distractors: categories.distractors,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Derived problem statement for the current caption.
    pub fn problem(&self) -> String {
        problem_statement(&self.caption)
    }

    /// Labels to persist alongside the record.
    pub fn to_categories(&self, empty_case: bool) -> Categories {
        Categories {
            empty_case,
            hops: self.hops.clone(),
            types: self.types.iter().cloned().collect(),
            attribute: self.attributes.iter().cloned().collect(),
            distractors: self.distractors,
        }
    }
}

/// A field that must be filled in before the annotation can be saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Requirement {
    BoundingBox,
    Caption,
    Hops,
    Distractors,
}

impl Requirement {
    pub fn label(&self) -> &'static str {
        match self {
            Requirement::BoundingBox => "bounding box",
            Requirement::Caption => "caption",
            Requirement::Hops => "hops value",
            Requirement::Distractors => "distractor count",
        }
    }
}

/// Outcome of checking the form against the active selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    missing: Vec<Requirement>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing(&self) -> &[Requirement] {
        &self.missing
    }

    /// Status line: the ready message, or the list of missing fields.
    pub fn message(&self) -> String {
        if self.is_valid() {
            return READY_MESSAGE.to_string();
        }
        let labels: Vec<&str> = self.missing.iter().map(Requirement::label).collect();
        format!("Please select/provide: {}", labels.join(", "))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Check that the form and selection together make a complete annotation.
///
/// An empty case needs no box; every other mode needs a committed one. A
/// confirmed distractor count of zero is a value, not a gap.
pub fn validate(selection: &Selection, form: &FormState) -> ValidationReport {
    let mut missing = Vec::new();

    if !selection.is_empty_case() && selection.solution().is_none() {
        missing.push(Requirement::BoundingBox);
    }
    if form.caption.trim().is_empty() {
        missing.push(Requirement::Caption);
    }
    if form.hops.is_none() {
        missing.push(Requirement::Hops);
    }
    if form.distractors.is_none() {
        missing.push(Requirement::Distractors);
    }

    ValidationReport { missing }
}
