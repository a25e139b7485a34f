//! Annotation session controller.
//!
//! [`Session`] is the single authority over which image and annotation are
//! current, what is selected, whether the annotation is complete enough to
//! save, and whether it has been saved. All mutation goes through its methods.
//!
//! Backend calls come in two forms. The convenience methods (`enter_image`,
//! `save`, `delete`, ...) call the [`Backend`] synchronously. Hosts with an
//! asynchronous transport use the split `begin_*` / `complete_*` pairs
//! instead; a ticket issued by `begin_*` is checked on completion so a
//! response that arrives after the session moved on never overwrites the
//! newer state.

mod error;
mod filter;
mod form;
mod navigation;
mod persistence;
mod presenter;
mod save_tracker;
mod selection;


pub use error::SessionError;
pub use filter::{FilterIndex, ImageFilter};
pub use form::{FormState, Requirement, ValidationReport};
pub use navigation::{FilterOutcome, ImageTicket};
pub use persistence::{DeleteOutcome, DeleteTicket, SaveOutcome, SaveTicket};
pub use presenter::{BoxesView, InstanceBox, NullPresenter, Presenter, SelectorView};
pub use save_tracker::SaveTracker;
pub use selection::{Selection, SelectionMode, SelectionState, distractor_suggestion};

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use web_time::{SystemTime, UNIX_EPOCH};

use crate::backend::Backend;
use crate::config::SessionConfig;
use crate::constants::{BLANK_MESSAGE, FILTER_RESET_MESSAGE};
use crate::geometry::{CanvasPoint, CanvasScale, Corners, fit_canvas};
use crate::model::{AnnotationRecord, ImageId, ImageMetadata, ImageRecord, SavedData};

/// One reviewer's annotation session.
pub struct Session {
    config: SessionConfig,

    /// Size of the full, unfiltered image list
    total_images: usize,
    /// Real index of the current image
    current_index: Option<usize>,
    image: Option<ImageRecord>,

    /// Position within the current image's saved records (== count when composing a new one)
    annotation_index: usize,
    annotation_id: Option<String>,

    selection: SelectionState,
    form: FormState,
    distractor_suggestion: Option<u32>,
    hidden_categories: BTreeSet<usize>,
    show_only_selected: bool,

    saved: SavedData,
    metadata: Vec<ImageMetadata>,
    filter: ImageFilter,
    filter_index: FilterIndex,

    tracker: SaveTracker,
    status: String,

    next_token: u64,
    pending_image: Option<u64>,
    /// Bumped whenever the current image or annotation changes
    view: u64,
    last_id_millis: u128,

    presenter: Box<dyn Presenter>,
}

impl Session {
    /// Create an idle session with no image loaded.
    pub fn new(config: SessionConfig) -> Self {
        let tracker = SaveTracker::new(Duration::from_millis(config.saved_indicator_ms));
        Self {
            config,
            total_images: 0,
            current_index: None,
            image: None,
            annotation_index: 0,
            annotation_id: None,
            selection: SelectionState::default(),
            form: FormState::default(),
            distractor_suggestion: None,
            hidden_categories: BTreeSet::new(),
            show_only_selected: false,
            saved: SavedData::new(),
            metadata: Vec::new(),
            filter: ImageFilter::default(),
            filter_index: FilterIndex::default(),
            tracker,
            status: String::new(),
            next_token: 0,
            pending_image: None,
            view: 0,
            last_id_millis: 0,
            presenter: Box::new(NullPresenter),
        }
    }

    /// Attach the presentation layer.
    pub fn with_presenter(mut self, presenter: impl Presenter + 'static) -> Self {
        self.presenter = Box::new(presenter);
        self
    }

    /// Load everything the session needs and enter the starting image.
    ///
    /// Each load falls back to an empty value on failure. The starting image
    /// is the one annotated most recently, moved to the nearest image the
    /// persisted filter admits. A persisted filter that admits nothing is
    /// cleared. Load problems stay in the status after the image is entered.
    pub fn start(backend: &mut dyn Backend, config: SessionConfig) -> Self {
        let mut session = Self::new(config);
        let mut notices = Vec::new();

        session.load_saved_data(backend);
        if !session.status.is_empty() {
            notices.push(session.status.clone());
        }
        session.load_metadata(backend);
        session.load_excluded_categories(backend);

        let last = match backend.fetch_last_created_index() {
            Ok(index) => {
                log::debug!("Most recently annotated image found at index {}", index);
                index
            }
            Err(e) => {
                log::warn!("Error finding most recently annotated image: {}", e);
                0
            }
        };

        let start = match session.filter_index.nearest_visible(last) {
            Some(index) => index,
            None if session.filter.is_active() && !session.metadata.is_empty() => {
                log::warn!("Persisted filter admits no image, resetting");
                session.reset_filter(backend);
                notices.push(FILTER_RESET_MESSAGE.to_string());
                session.filter_index.nearest_visible(last).unwrap_or(last)
            }
            None => last,
        };

        let mut entered = session.enter_image(backend, start);
        if let Err(e) = &entered {
            log::warn!("Failed to enter start image {}: {}", start, e);
            if start != 0 {
                entered = session.enter_image(backend, 0);
                if let Err(e) = &entered {
                    log::error!("Failed to enter first image: {}", e);
                }
            }
        }

        if !notices.is_empty() {
            if entered.is_err() {
                notices.push(session.status.clone());
            }
            session.status = notices.join("; ");
        }
        session
    }

    /// Replace the saved-data mirror with the backend's copy.
    pub fn load_saved_data(&mut self, backend: &mut dyn Backend) {
        match backend.fetch_saved_data() {
            Ok(saved) => {
                log::info!(
                    "Loaded {} saved annotations across {} images",
                    saved.total_annotations(),
                    saved.annotated_images()
                );
                self.saved = saved;
            }
            Err(e) => {
                log::warn!("Failed to load saved data: {}", e);
                self.status = format!("Failed to load saved annotations: {}", e);
                self.saved = SavedData::new();
            }
        }
        self.rebuild_filter_index();
    }

    /// Load per-image metadata for the filter.
    pub fn load_metadata(&mut self, backend: &mut dyn Backend) {
        match backend.fetch_all_images_metadata() {
            Ok(metadata) => {
                log::debug!("Loaded metadata for {} images", metadata.len());
                if self.total_images == 0 {
                    self.total_images = metadata.len();
                }
                self.metadata = metadata;
            }
            Err(e) => {
                log::warn!("Failed to load image metadata, filtering disabled: {}", e);
                self.metadata.clear();
            }
        }
        self.rebuild_filter_index();
    }

    /// Load the persisted category exclusions.
    pub fn load_excluded_categories(&mut self, backend: &mut dyn Backend) {
        match backend.fetch_excluded_categories() {
            Ok(excluded) => {
                log::debug!("Loaded {} excluded categories", excluded.len());
                self.filter.excluded = excluded.into_iter().collect();
            }
            Err(e) => log::warn!("Failed to load excluded categories: {}", e),
        }
        self.rebuild_filter_index();
    }

    fn rebuild_filter_index(&mut self) {
        self.filter_index = if self.metadata.is_empty() {
            FilterIndex::identity(self.total_images)
        } else {
            FilterIndex::build(&self.filter, &self.metadata, &self.saved)
        };
    }

    // Annotation entry

    /// Enter an annotation of an image, loading the image first if needed.
    ///
    /// `annotation_index` is clamped into the saved range. An image with no
    /// saved records gets a blank annotation.
    pub fn enter_annotation(
        &mut self,
        backend: &mut dyn Backend,
        index: usize,
        annotation_index: usize,
    ) -> Result<(), SessionError> {
        if self.current_index != Some(index) || self.image.is_none() {
            self.enter_image(backend, index)?;
            return self.enter_annotation(backend, index, annotation_index);
        }
        self.select_annotation(annotation_index)
    }

    /// Enter a saved annotation of the current image.
    pub fn select_annotation(&mut self, annotation_index: usize) -> Result<(), SessionError> {
        let image_id = self.require_image()?;
        let count = self.saved.count(&image_id);
        if count == 0 {
            return self.create_blank_annotation();
        }
        let index = annotation_index.min(count - 1);

        let needs_id = self
            .saved
            .record(&image_id, index)
            .is_some_and(|r| r.annotation_id.is_none());
        if needs_id {
            let id = self.generate_annotation_id(&image_id);
            self.saved.ensure_identifier(&image_id, index, || id);
        }

        let Some(record) = self.saved.record(&image_id, index).cloned() else {
            return Err(self.fail(SessionError::AnnotationNotFound));
        };
        let selection = match self.image.as_ref() {
            Some(image) => resolve_selection(image, &record),
            None => Selection::EmptyCase,
        };

        self.selection.restore(selection);
        self.form = FormState::from_record(&record);
        if record.categories.distractors.is_none() {
            self.form.distractors = self.compute_distractor_suggestion();
        }
        self.annotation_index = index;
        self.annotation_id = record.annotation_id;
        self.view += 1;
        self.tracker.mark_clean();

        log::debug!(
            "Entered annotation {} of {} on image {} ({:?})",
            index + 1,
            count,
            image_id,
            selection.mode()
        );
        self.refresh_derived();
        Ok(())
    }

    /// Start composing a new annotation on the current image.
    pub fn create_blank_annotation(&mut self) -> Result<(), SessionError> {
        let image_id = self.require_image()?;
        self.selection.reset();
        self.form.clear();
        self.form.distractors = self.compute_distractor_suggestion();
        self.annotation_id = None;
        self.annotation_index = self.saved.count(&image_id);
        self.view += 1;
        self.tracker.mark_dirty();

        log::debug!(
            "New annotation {} on image {}",
            self.annotation_index + 1,
            image_id
        );
        self.refresh_derived();
        self.status = BLANK_MESSAGE.to_string();
        Ok(())
    }

    // Selection

    /// Select a catalogued instance and auto-check its attribute flags.
    pub fn select_catalogued(
        &mut self,
        category_index: usize,
        instance_index: usize,
    ) -> Result<(), SessionError> {
        self.require_image()?;
        let picked = self
            .image
            .as_ref()
            .and_then(|image| image.categories.get(category_index))
            .and_then(|group| {
                group
                    .instance_corners(instance_index)
                    .map(|corners| (corners, group.auto_attributes(instance_index)))
            });
        let Some((corners, attributes)) = picked else {
            return Err(self.fail(SessionError::CategoryOutOfRange {
                category: category_index,
                instance: instance_index,
            }));
        };

        self.selection
            .select_catalogued(category_index, instance_index, corners);
        self.form.attributes = attributes;
        self.after_selection();
        Ok(())
    }

    /// Switch to custom-box mode.
    ///
    /// A previously drawn box is restored; otherwise drawing is armed.
    /// Called while a custom box is active, arms drawing for a replacement.
    pub fn select_custom_draw_start(&mut self) -> Result<(), SessionError> {
        self.require_image()?;
        self.selection.select_custom_draw_start();
        self.form.attributes.clear();
        self.after_selection();
        if self.selection.current().is_drawing() {
            self.status = "Click and drag on the image to draw a bounding box".to_string();
        }
        Ok(())
    }

    /// Mark the caption as describing something absent from the image.
    pub fn select_empty_case(&mut self) -> Result<(), SessionError> {
        self.require_image()?;
        self.selection.select_empty_case();
        self.form.attributes.clear();
        self.after_selection();
        Ok(())
    }

    fn after_selection(&mut self) {
        self.form.distractors = self.compute_distractor_suggestion();
        self.tracker.mark_dirty();
        log::debug!("Selection is now {:?}", self.selection.current().mode());
        self.refresh_derived();
    }

    /// Commit a drag as the custom box.
    ///
    /// Drags shorter than the minimum on either axis are rejected and drawing
    /// stays armed.
    pub fn finish_custom_draw(
        &mut self,
        start: CanvasPoint,
        end: CanvasPoint,
        scale: &CanvasScale,
    ) -> Result<Corners, SessionError> {
        if !self.selection.current().is_drawing() {
            return Err(self.fail(SessionError::NotDrawing));
        }

        let dx = (end.x - start.x).abs();
        let dy = (end.y - start.y).abs();
        let min = self.config.min_draw_size;
        if dx < min || dy < min {
            log::debug!("Rejected {:.1}x{:.1} drag (minimum {})", dx, dy, min);
            self.status = "Box too small. Try again with a larger selection.".to_string();
            return Err(SessionError::BoxTooSmall { dx, dy, min });
        }

        let corners = scale.drag_to_corners(start, end);
        self.selection.commit_custom(corners);
        self.tracker.mark_dirty();
        log::debug!("Custom box committed at {:?}", corners.0);
        self.refresh_derived();
        Ok(corners)
    }

    /// Abandon an armed drawing. Returns whether anything changed.
    pub fn cancel_custom_draw(&mut self) -> bool {
        if !self.selection.current().is_drawing() {
            return false;
        }
        self.selection.cancel_drawing();
        log::debug!("Drawing cancelled, back to {:?}", self.selection.current().mode());
        self.refresh_derived();
        true
    }

    /// Distractor suggestion for the current selection.
    pub fn compute_distractor_suggestion(&self) -> Option<u32> {
        let image = self.image.as_ref()?;
        distractor_suggestion(self.selection.current(), &image.categories)
    }

    /// Check the form and selection for everything save needs.
    pub fn validate(&self) -> ValidationReport {
        form::validate(self.selection.current(), &self.form)
    }

    /// Recompute derived state and notify the presenter, in order:
    /// suggestion, distractor input, status line, boxes and selector.
    pub fn refresh_derived(&mut self) {
        self.distractor_suggestion = self.compute_distractor_suggestion();
        self.presenter
            .refresh_distractors(self.distractor_suggestion, self.form.distractors);
        self.status = self.validate().message();
        self.render();
    }

    fn render(&mut self) {
        let Some(image) = self.image.as_ref() else {
            return;
        };
        let selection = self.selection.current();

        self.presenter.render_boxes(&BoxesView {
            image,
            selection,
            hidden: &self.hidden_categories,
            show_only_selected: self.show_only_selected,
        });
        self.presenter.render_selector(&SelectorView {
            categories: &image.categories,
            selection,
            hidden: &self.hidden_categories,
            saved_custom_box: self.selection.saved_custom(),
        });
    }

    // Form edits

    pub fn set_caption(&mut self, caption: impl Into<String>) {
        self.form.caption = caption.into();
        self.after_edit();
    }

    /// Set or clear the hops value.
    pub fn set_hops(&mut self, hops: Option<&str>) -> Result<(), SessionError> {
        if let Some(value) = hops {
            if !SessionConfig::allows(&self.config.hops_options, value) {
                return Err(self.fail(SessionError::unknown_option("hops", value)));
            }
        }
        self.form.hops = hops.map(str::to_string);
        self.after_edit();
        Ok(())
    }

    /// Toggle a type tag. Returns whether it is now checked.
    pub fn toggle_type(&mut self, tag: &str) -> Result<bool, SessionError> {
        if !SessionConfig::allows(&self.config.type_options, tag) {
            return Err(self.fail(SessionError::unknown_option("type", tag)));
        }
        let checked = toggle(&mut self.form.types, tag);
        self.after_edit();
        Ok(checked)
    }

    /// Toggle an attribute tag. Returns whether it is now checked.
    pub fn toggle_attribute(&mut self, tag: &str) -> Result<bool, SessionError> {
        if !SessionConfig::allows(&self.config.attribute_options, tag) {
            return Err(self.fail(SessionError::unknown_option("attribute", tag)));
        }
        let checked = toggle(&mut self.form.attributes, tag);
        self.after_edit();
        Ok(checked)
    }

    pub fn set_distractors(&mut self, distractors: Option<u32>) {
        self.form.distractors = distractors;
        self.after_edit();
    }

    /// Set the distractor count from raw input. Anything but a non-negative
    /// integer clears it.
    pub fn set_distractors_input(&mut self, input: &str) {
        let parsed = input.trim().parse::<u32>().ok();
        if parsed.is_none() && !input.trim().is_empty() {
            log::debug!("Ignoring non-integer distractor input '{}'", input);
        }
        self.set_distractors(parsed);
    }

    fn after_edit(&mut self) {
        self.tracker.mark_dirty();
        self.refresh_derived();
    }

    // Presentation toggles

    /// Hide or show a category's boxes. Returns whether it is now hidden.
    pub fn toggle_category_visibility(&mut self, category_index: usize) -> bool {
        let hidden = if self.hidden_categories.remove(&category_index) {
            false
        } else {
            self.hidden_categories.insert(category_index);
            true
        };
        self.render();
        hidden
    }

    /// Toggle drawing only the selected instance.
    pub fn toggle_show_only_selected(&mut self) -> bool {
        self.show_only_selected = !self.show_only_selected;
        self.render();
        self.show_only_selected
    }

    /// Aspect-preserving canvas fit of the current image into a container.
    pub fn canvas_layout(&self, container_width: f64, container_height: f64) -> Option<CanvasScale> {
        let image = self.image.as_ref()?;
        let (width, height) = (f64::from(image.width), f64::from(image.height));
        Some(CanvasScale::new(
            width,
            height,
            fit_canvas(width, height, container_width, container_height),
        ))
    }

    // Accessors

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn total_images(&self) -> usize {
        self.total_images
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn image(&self) -> Option<&ImageRecord> {
        self.image.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        self.selection.current()
    }

    pub fn state(&self) -> SelectionMode {
        self.selection.current().mode()
    }

    /// Custom box kept aside while another mode is active.
    pub fn saved_custom_box(&self) -> Option<Corners> {
        self.selection.saved_custom()
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Problem statement derived from the current caption.
    pub fn problem(&self) -> String {
        self.form.problem()
    }

    /// Last computed distractor suggestion.
    pub fn distractor_hint(&self) -> Option<u32> {
        self.distractor_suggestion
    }

    pub fn annotation_index(&self) -> usize {
        self.annotation_index
    }

    pub fn annotation_id(&self) -> Option<&str> {
        self.annotation_id.as_deref()
    }

    /// `(position, total)` of the current annotation, one-based.
    ///
    /// While composing a new annotation the total includes it.
    pub fn annotation_progress(&self) -> (usize, usize) {
        let count = self
            .image
            .as_ref()
            .map(|image| self.saved.count(&image.image_id))
            .unwrap_or(0);
        let total = if self.annotation_index >= count {
            count + 1
        } else {
            count
        };
        (self.annotation_index + 1, total)
    }

    /// Number of saved annotations across all images.
    pub fn reference_count(&self) -> usize {
        self.saved.total_annotations()
    }

    pub fn saved_data(&self) -> &SavedData {
        &self.saved
    }

    pub fn hidden_categories(&self) -> &BTreeSet<usize> {
        &self.hidden_categories
    }

    pub fn show_only_selected(&self) -> bool {
        self.show_only_selected
    }

    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty()
    }

    /// Whether the transient saved acknowledgment is showing.
    pub fn saved_indicator_visible(&self) -> bool {
        self.tracker.indicator_visible()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    // Helpers

    fn require_image(&mut self) -> Result<ImageId, SessionError> {
        if let Some(image) = &self.image {
            return Ok(image.image_id.clone());
        }
        Err(self.fail(SessionError::NoImageLoaded))
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        log::warn!("{}", err);
        self.status = err.to_string();
        err
    }

    /// `{image_id}_{millis}`, strictly increasing within the session.
    fn generate_annotation_id(&mut self, image_id: &ImageId) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let millis = now.max(self.last_id_millis + 1);
        self.last_id_millis = millis;
        format!("{}_{}", image_id, millis)
    }

    fn is_current_view(&self, view: u64) -> bool {
        self.view == view
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("current_index", &self.current_index)
            .field("annotation_index", &self.annotation_index)
            .field("selection", self.selection.current())
            .field("dirty", &self.tracker.is_dirty())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Selection a saved record represents on its image.
///
/// A solution box equal to a catalogued instance restores that instance;
/// any other box is a custom box.
fn resolve_selection(image: &ImageRecord, record: &AnnotationRecord) -> Selection {
    match record.solution {
        Some(corners) if !record.categories.empty_case => match image.find_instance(&corners) {
            Some((category_index, instance_index)) => Selection::Catalogued {
                category_index,
                instance_index,
                corners,
            },
            None => Selection::CustomSet(corners),
        },
        _ => Selection::EmptyCase,
    }
}

fn toggle(set: &mut BTreeSet<String>, tag: &str) -> bool {
    if set.remove(tag) {
        false
    } else {
        set.insert(tag.to_string());
        true
    }
}
