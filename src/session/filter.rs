//! Category filter over the image collection.
//!
//! The filter produces two parallel index maps, filtered position to real
//! position and back, rebuilt whenever the filter settings or the saved-data
//! mirror change.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{CategoryId, ImageMetadata, SavedData};

/// Filter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFilter {
    /// Images with any of these multi-instance categories are hidden
    #[serde(default)]
    pub excluded: BTreeSet<CategoryId>,
    /// Only show images that already have annotations
    #[serde(default)]
    pub show_only_annotated: bool,
}

impl ImageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluding(categories: impl IntoIterator<Item = CategoryId>) -> Self {
        Self {
            excluded: categories.into_iter().collect(),
            show_only_annotated: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.excluded.is_empty() || self.show_only_annotated
    }

    /// Whether an image passes the filter.
    ///
    /// With `show_only_annotated`, annotated images always pass and the rest
    /// never do. Otherwise an image passes unless one of its categories is
    /// excluded.
    pub fn admits(&self, image: &ImageMetadata, saved: &SavedData) -> bool {
        if self.show_only_annotated {
            return saved.has_annotations(&image.image_id);
        }
        !image.category_ids().any(|id| self.excluded.contains(id))
    }
}

/// Filtered position to real position maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterIndex {
    filtered_to_real: Vec<usize>,
    real_to_filtered: Vec<Option<usize>>,
}

impl FilterIndex {
    /// Index that passes every image through unchanged.
    pub fn identity(total: usize) -> Self {
        Self {
            filtered_to_real: (0..total).collect(),
            real_to_filtered: (0..total).map(Some).collect(),
        }
    }

    /// Scan all image metadata in order and keep the images the filter admits.
    pub fn build(filter: &ImageFilter, images: &[ImageMetadata], saved: &SavedData) -> Self {
        let mut filtered_to_real = Vec::new();
        let mut real_to_filtered = vec![None; images.len()];

        for (real, image) in images.iter().enumerate() {
            if filter.admits(image, saved) {
                real_to_filtered[real] = Some(filtered_to_real.len());
                filtered_to_real.push(real);
            }
        }

        log::debug!(
            "Filter index rebuilt: {} of {} images visible",
            filtered_to_real.len(),
            images.len()
        );

        Self {
            filtered_to_real,
            real_to_filtered,
        }
    }

    /// Number of visible images.
    pub fn len(&self) -> usize {
        self.filtered_to_real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered_to_real.is_empty()
    }

    /// Real index of a filtered position.
    pub fn real(&self, filtered: usize) -> Option<usize> {
        self.filtered_to_real.get(filtered).copied()
    }

    /// Filtered position of a real index, if visible.
    pub fn filtered(&self, real: usize) -> Option<usize> {
        self.real_to_filtered.get(real).copied().flatten()
    }

    pub fn contains(&self, real: usize) -> bool {
        self.filtered(real).is_some()
    }

    /// First visible real index after `real`.
    pub fn next_after(&self, real: usize) -> Option<usize> {
        let pos = self.filtered_to_real.partition_point(|&r| r <= real);
        self.filtered_to_real.get(pos).copied()
    }

    /// Last visible real index before `real`.
    pub fn prev_before(&self, real: usize) -> Option<usize> {
        let pos = self.filtered_to_real.partition_point(|&r| r < real);
        pos.checked_sub(1).map(|p| self.filtered_to_real[p])
    }

    /// Nearest visible real index, searching outward from `real`.
    ///
    /// At each distance the forward candidate is tried before the backward one.
    pub fn nearest_visible(&self, real: usize) -> Option<usize> {
        if self.contains(real) {
            return Some(real);
        }
        let total = self.real_to_filtered.len();
        for distance in 1..=total {
            let forward = real + distance;
            if forward < total && self.contains(forward) {
                return Some(forward);
            }
            if let Some(backward) = real.checked_sub(distance) {
                if self.contains(backward) {
                    return Some(backward);
                }
            }
        }
        None
    }
}
