//! Box selection state.
//!
//! Exactly one selection mode is active at a time. A custom box that the
//! reviewer switches away from is kept in a side slot so switching back to
//! custom mode restores it instead of losing the drawn rectangle.

use crate::geometry::Corners;
use crate::model::CategoryGroup;

/// Which kind of selection is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    EmptyCase,
    Catalogued,
    CustomDrawing,
    CustomSet,
}

/// The active selection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Selection {
    /// Caption describes something absent from the image; no box
    #[default]
    EmptyCase,
    /// A catalogued instance of a multi-instance category
    Catalogued {
        category_index: usize,
        instance_index: usize,
        corners: Corners,
    },
    /// Custom drawing armed, no box committed yet
    CustomDrawing,
    /// A committed custom box
    CustomSet(Corners),
}

impl Selection {
    pub fn mode(&self) -> SelectionMode {
        match self {
            Selection::EmptyCase => SelectionMode::EmptyCase,
            Selection::Catalogued { .. } => SelectionMode::Catalogued,
            Selection::CustomDrawing => SelectionMode::CustomDrawing,
            Selection::CustomSet(_) => SelectionMode::CustomSet,
        }
    }

    /// The box this selection contributes as a solution, if any.
    pub fn solution(&self) -> Option<Corners> {
        match self {
            Selection::Catalogued { corners, .. } => Some(*corners),
            Selection::CustomSet(corners) => Some(*corners),
            Selection::EmptyCase | Selection::CustomDrawing => None,
        }
    }

    pub fn is_empty_case(&self) -> bool {
        matches!(self, Selection::EmptyCase)
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self, Selection::CustomDrawing)
    }

    /// `(category_index, instance_index)` of a catalogued selection.
    pub fn catalogued(&self) -> Option<(usize, usize)> {
        match self {
            Selection::Catalogued {
                category_index,
                instance_index,
                ..
            } => Some((*category_index, *instance_index)),
            _ => None,
        }
    }

    pub fn custom_box(&self) -> Option<Corners> {
        match self {
            Selection::CustomSet(corners) => Some(*corners),
            _ => None,
        }
    }
}

/// Distractor suggestion for a selection over an image's categories.
///
/// Empty case counts every catalogued instance. A catalogued selection counts
/// the other instances of its category. Custom boxes have no suggestion.
pub fn distractor_suggestion(selection: &Selection, categories: &[CategoryGroup]) -> Option<u32> {
    match selection {
        Selection::EmptyCase => Some(categories.iter().map(|c| c.count).sum()),
        Selection::Catalogued { category_index, .. } => categories
            .get(*category_index)
            .map(|c| c.count.saturating_sub(1)),
        Selection::CustomDrawing | Selection::CustomSet(_) => None,
    }
}

/// Active selection plus the remembered custom box.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    current: Selection,
    saved_custom: Option<Corners>,
}

impl SelectionState {
    pub fn current(&self) -> &Selection {
        &self.current
    }

    pub fn saved_custom(&self) -> Option<Corners> {
        self.saved_custom
    }

    /// Back to the empty case with no remembered custom box.
    pub fn reset(&mut self) {
        self.current = Selection::EmptyCase;
        self.saved_custom = None;
    }

    /// Install a selection restored from a saved record.
    pub fn restore(&mut self, selection: Selection) {
        self.current = selection;
        self.saved_custom = None;
    }

    fn stash_custom(&mut self) {
        if let Selection::CustomSet(corners) = self.current {
            self.saved_custom = Some(corners);
        }
    }

    pub fn select_empty_case(&mut self) {
        self.stash_custom();
        self.current = Selection::EmptyCase;
    }

    pub fn select_catalogued(&mut self, category_index: usize, instance_index: usize, corners: Corners) {
        self.stash_custom();
        self.current = Selection::Catalogued {
            category_index,
            instance_index,
            corners,
        };
    }

    /// Switch to custom mode.
    ///
    /// Coming from another mode, a remembered custom box is restored as the
    /// active box; without one, drawing is armed. Selecting custom mode again
    /// while a custom box is active arms drawing for a replacement.
    pub fn select_custom_draw_start(&mut self) {
        match self.current {
            Selection::CustomDrawing => {}
            Selection::CustomSet(_) => {
                self.stash_custom();
                self.current = Selection::CustomDrawing;
            }
            Selection::EmptyCase | Selection::Catalogued { .. } => {
                self.current = match self.saved_custom {
                    Some(corners) => Selection::CustomSet(corners),
                    None => Selection::CustomDrawing,
                };
            }
        }
    }

    /// Commit a finished drawing as the active custom box.
    pub fn commit_custom(&mut self, corners: Corners) {
        self.current = Selection::CustomSet(corners);
    }

    /// Abandon drawing: fall back to the remembered box, else the empty case.
    pub fn cancel_drawing(&mut self) {
        if self.current.is_drawing() {
            self.current = match self.saved_custom {
                Some(corners) => Selection::CustomSet(corners),
                None => Selection::EmptyCase,
            };
        }
    }
}
