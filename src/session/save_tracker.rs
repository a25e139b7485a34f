//! Saved/unsaved tracking for the annotation being edited.
//!
//! Tracks whether the form differs from what the backend last acknowledged
//! and how long ago that acknowledgment arrived, so the host can show a
//! short-lived "saved" indicator.

use std::time::Duration;
use web_time::Instant;

/// Dirty flag plus the time of the last acknowledged save.
///
/// Every edit bumps a revision counter. A save acknowledgment only clears the
/// dirty flag if no edit happened after the save was issued.
#[derive(Debug)]
pub struct SaveTracker {
    /// How long the saved indicator stays visible.
    indicator_window: Duration,

    /// Time of last successful save.
    last_save: Option<Instant>,

    /// Incremented on every edit.
    revision: u64,

    /// Whether there are unsaved changes.
    dirty: bool,
}

impl SaveTracker {
    /// Create a tracker with the given indicator window.
    pub fn new(indicator_window: Duration) -> Self {
        Self {
            indicator_window,
            last_save: None,
            revision: 0,
            dirty: false,
        }
    }

    /// Mark that the form changed.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision += 1;
        log::trace!("Save tracker: marked dirty (revision {})", self.revision);
    }

    /// The form now mirrors a persisted record; no indicator is shown.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
        self.last_save = None;
    }

    /// Revision a save issued now would capture.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mark that a save issued at `revision` was acknowledged.
    ///
    /// Starts the indicator window. Edits made after the save was issued keep
    /// the form dirty.
    pub fn mark_saved(&mut self, revision: u64) {
        self.last_save = Some(Instant::now());
        if revision == self.revision {
            self.dirty = false;
        }
        log::trace!("Save tracker: marked saved (dirty = {})", self.dirty);
    }

    /// Mark that a save failed. The form stays dirty.
    pub fn mark_save_failed(&mut self) {
        self.dirty = true;
        log::trace!("Save tracker: marked save failed");
    }

    /// Check if there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the saved acknowledgment should currently be displayed.
    pub fn indicator_visible(&self) -> bool {
        self.last_save
            .is_some_and(|t| t.elapsed() < self.indicator_window)
    }

    /// Hide the indicator immediately (on navigation).
    pub fn hide_indicator(&mut self) {
        self.last_save = None;
    }

    /// Get time since last save (if any).
    pub fn time_since_last_save(&self) -> Option<Duration> {
        self.last_save.map(|t| t.elapsed())
    }
}

impl Default for SaveTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::constants::SAVED_INDICATOR_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tracker() {
        let tracker = SaveTracker::default();
        assert!(!tracker.is_dirty());
        assert!(!tracker.indicator_visible());
        assert!(tracker.time_since_last_save().is_none());
    }

    #[test]
    fn test_mark_dirty_then_saved() {
        let mut tracker = SaveTracker::default();
        tracker.mark_dirty();
        assert!(tracker.is_dirty());

        tracker.mark_saved(tracker.revision());
        assert!(!tracker.is_dirty());
        assert!(tracker.indicator_visible());
    }

    #[test]
    fn test_edit_during_save_stays_dirty() {
        let mut tracker = SaveTracker::default();
        tracker.mark_dirty();
        let issued = tracker.revision();
        tracker.mark_dirty();
        tracker.mark_saved(issued);
        assert!(tracker.is_dirty());
        assert!(tracker.indicator_visible());
    }

    #[test]
    fn test_zero_window_never_shows_indicator() {
        let mut tracker = SaveTracker::new(Duration::ZERO);
        tracker.mark_saved(tracker.revision());
        assert!(!tracker.indicator_visible());
        assert!(tracker.time_since_last_save().is_some());
    }

    #[test]
    fn test_failed_save_and_navigation() {
        let mut tracker = SaveTracker::default();
        tracker.mark_save_failed();
        assert!(tracker.is_dirty());

        tracker.mark_saved(tracker.revision());
        tracker.hide_indicator();
        assert!(!tracker.indicator_visible());

        tracker.mark_dirty();
        tracker.mark_clean();
        assert!(!tracker.is_dirty());
    }
}
