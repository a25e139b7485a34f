//! Callback contract between the controller and the presentation layer.
//!
//! The controller owns no drawing primitives. After every transition it hands
//! the presenter read-only views of what should be on screen.

use std::collections::BTreeSet;

use crate::geometry::Corners;
use crate::model::{CategoryGroup, ImageRecord};
use crate::session::Selection;

/// A catalogued instance as it should be drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceBox {
    pub category_index: usize,
    pub instance_index: usize,
    pub corners: Corners,
    pub selected: bool,
}

/// Everything needed to draw the boxes over the current image.
#[derive(Debug, Clone, Copy)]
pub struct BoxesView<'a> {
    pub image: &'a ImageRecord,
    pub selection: &'a Selection,
    pub hidden: &'a BTreeSet<usize>,
    pub show_only_selected: bool,
}

impl BoxesView<'_> {
    /// Catalogued instances to draw, honouring the hidden set and the
    /// show-only-selected toggle.
    pub fn visible_instances(&self) -> Vec<InstanceBox> {
        let selected = self.selection.catalogued();
        let mut boxes = Vec::new();

        for (category_index, group) in self.image.categories.iter().enumerate() {
            if self.hidden.contains(&category_index) {
                continue;
            }
            for instance_index in 0..group.instances.len() {
                let is_selected = selected == Some((category_index, instance_index));
                if self.show_only_selected && !is_selected {
                    continue;
                }
                if let Some(corners) = group.instance_corners(instance_index) {
                    boxes.push(InstanceBox {
                        category_index,
                        instance_index,
                        corners,
                        selected: is_selected,
                    });
                }
            }
        }
        boxes
    }

    /// The committed custom box, drawn separately from catalogued instances.
    pub fn custom_box(&self) -> Option<Corners> {
        self.selection.custom_box()
    }
}

/// Everything needed to draw the category/instance selector list.
#[derive(Debug, Clone, Copy)]
pub struct SelectorView<'a> {
    pub categories: &'a [CategoryGroup],
    pub selection: &'a Selection,
    pub hidden: &'a BTreeSet<usize>,
    pub saved_custom_box: Option<Corners>,
}

/// Presentation layer hooks. Every method defaults to doing nothing.
pub trait Presenter {
    /// Draw boxes for the current image.
    fn render_boxes(&mut self, _view: &BoxesView<'_>) {}

    /// Draw the selector list.
    fn render_selector(&mut self, _view: &SelectorView<'_>) {}

    /// Refresh the distractor input with the current suggestion and value.
    fn refresh_distractors(&mut self, _suggestion: Option<u32>, _value: Option<u32>) {}
}

/// Presenter that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageRecord {
        serde_json::from_value(serde_json::json!({
            "image_id": "a", "path": "a.jpg", "file_name": "a.jpg",
            "width": 100, "height": 100,
            "categories_with_multiple_instances": [
                {"category_id": 1, "category_name": "cat", "count": 2,
                 "instances": [[0, 0, 10, 10], [20, 0, 10, 10]]},
                {"category_id": 2, "category_name": "cup", "count": 2,
                 "instances": [[0, 50, 5, 5], [10, 50, 5, 5]]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_hidden_categories_are_skipped() {
        let image = image();
        let mut hidden = BTreeSet::new();
        hidden.insert(0);
        let view = BoxesView {
            image: &image,
            selection: &Selection::EmptyCase,
            hidden: &hidden,
            show_only_selected: false,
        };
        let boxes = view.visible_instances();
        assert_eq!(boxes.len(), 2);
        assert!(boxes.iter().all(|b| b.category_index == 1));
    }

    #[test]
    fn test_show_only_selected() {
        let image = image();
        let selection = Selection::Catalogued {
            category_index: 0,
            instance_index: 1,
            corners: Corners::new(20.0, 0.0, 30.0, 10.0),
        };
        let hidden = BTreeSet::new();
        let view = BoxesView {
            image: &image,
            selection: &selection,
            hidden: &hidden,
            show_only_selected: true,
        };
        let boxes = view.visible_instances();
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].selected);
        assert_eq!(boxes[0].corners, Corners::new(20.0, 0.0, 30.0, 10.0));
        assert_eq!(view.custom_box(), None);
    }
}
