//! Image navigation and filtering.

use crate::backend::{Backend, BackendError, ExcludedCategoriesBody, LoadedImage, Reply};
use crate::constants::FILTER_RESET_MESSAGE;
use crate::session::{FilterIndex, ImageFilter, Session, SessionError};

/// Outstanding image request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTicket {
    token: u64,
    index: usize,
}

impl ImageTicket {
    /// Real index the request is for.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// What a filter change did to the current image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Current image is still visible
    Unchanged,
    /// Current image was filtered out; moved to this real index
    Jumped(usize),
    /// Nothing passed the filter; filters were cleared
    Reset,
}

impl Session {
    /// Issue a request for the image at a real index.
    ///
    /// Any earlier outstanding image request becomes stale.
    pub fn begin_enter_image(&mut self, index: usize) -> Result<ImageTicket, SessionError> {
        if self.total_images > 0 && index >= self.total_images {
            return Err(self.fail(SessionError::OutOfRange {
                index,
                total: self.total_images,
            }));
        }
        self.next_token += 1;
        self.pending_image = Some(self.next_token);
        log::debug!("Requesting image {} (token {})", index, self.next_token);
        Ok(ImageTicket {
            token: self.next_token,
            index,
        })
    }

    /// Apply an image response.
    ///
    /// Resets selection, hidden categories and the annotation pointer, then
    /// shows the first saved annotation or a blank one.
    pub fn complete_enter_image(
        &mut self,
        ticket: ImageTicket,
        response: Result<LoadedImage, BackendError>,
    ) -> Result<(), SessionError> {
        if self.pending_image != Some(ticket.token) {
            log::debug!("Discarding stale response for image {}", ticket.index);
            return Err(SessionError::Stale);
        }
        self.pending_image = None;

        let loaded = match response {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("Error loading image {}: {}", ticket.index, e);
                self.status = format!("Error loading image: {}", e);
                return Err(e.into());
            }
        };

        self.total_images = loaded.total_images;
        if self.metadata.is_empty() {
            self.rebuild_filter_index();
        }

        let image_id = loaded.image.image_id.clone();
        log::info!(
            "Entered image {} of {} ({}, {} categories)",
            ticket.index + 1,
            self.total_images,
            image_id,
            loaded.image.categories.len()
        );

        self.image = Some(loaded.image);
        self.current_index = Some(ticket.index);
        self.annotation_index = 0;
        self.annotation_id = None;
        self.selection.reset();
        self.hidden_categories.clear();
        self.tracker.hide_indicator();

        if self.saved.has_annotations(&image_id) {
            self.select_annotation(0)
        } else {
            self.create_blank_annotation()
        }
    }

    /// Enter the image at a real index.
    pub fn enter_image(&mut self, backend: &mut dyn Backend, index: usize) -> Result<(), SessionError> {
        let ticket = self.begin_enter_image(index)?;
        let response = backend.fetch_image(index);
        self.complete_enter_image(ticket, response)
    }

    /// Move to the next visible image. Returns false at the end.
    pub fn next_image(&mut self, backend: &mut dyn Backend) -> Result<bool, SessionError> {
        let Some(current) = self.current_index else {
            return Ok(false);
        };
        match self.filter_index.next_after(current) {
            Some(next) => self.enter_image(backend, next).map(|_| true),
            None => Ok(false),
        }
    }

    /// Move to the previous visible image. Returns false at the start.
    pub fn prev_image(&mut self, backend: &mut dyn Backend) -> Result<bool, SessionError> {
        let Some(current) = self.current_index else {
            return Ok(false);
        };
        match self.filter_index.prev_before(current) {
            Some(prev) => self.enter_image(backend, prev).map(|_| true),
            None => Ok(false),
        }
    }

    /// Jump to a one-based image number.
    pub fn jump_to(&mut self, backend: &mut dyn Backend, number: usize) -> Result<(), SessionError> {
        if number == 0 || number > self.total_images {
            let total = self.total_images;
            log::debug!("Rejected jump to image {}", number);
            self.status = format!("Please enter a valid image number between 1 and {}", total);
            return Err(SessionError::OutOfRange {
                index: number,
                total,
            });
        }
        self.enter_image(backend, number - 1)
    }

    /// Move to the next saved annotation of the current image.
    pub fn next_annotation(&mut self) -> Result<bool, SessionError> {
        let image_id = self.require_image()?;
        if self.annotation_index + 1 < self.saved.count(&image_id) {
            self.select_annotation(self.annotation_index + 1)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Move to the previous saved annotation of the current image.
    pub fn prev_annotation(&mut self) -> Result<bool, SessionError> {
        self.require_image()?;
        if self.annotation_index > 0 {
            self.select_annotation(self.annotation_index - 1)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Apply new filter settings and persist the exclusions.
    ///
    /// If the current image no longer passes, the session moves to the
    /// nearest image that does. If none does, filters are cleared.
    pub fn apply_filter(
        &mut self,
        backend: &mut dyn Backend,
        filter: ImageFilter,
    ) -> Result<FilterOutcome, SessionError> {
        persist_excluded(backend, &filter);
        self.filter = filter;
        self.rebuild_filter_index();

        let Some(current) = self.current_index else {
            return Ok(FilterOutcome::Unchanged);
        };
        if self.filter_index.contains(current) {
            return Ok(FilterOutcome::Unchanged);
        }

        match self.filter_index.nearest_visible(current) {
            Some(target) => {
                log::info!("Image {} filtered out, moving to {}", current, target);
                self.enter_image(backend, target)?;
                Ok(FilterOutcome::Jumped(target))
            }
            None => {
                log::warn!("No images match the current filters, resetting");
                self.reset_filter(backend);
                self.status = FILTER_RESET_MESSAGE.to_string();
                Ok(FilterOutcome::Reset)
            }
        }
    }

    /// Clear the filter and persist the empty exclusion list.
    pub(crate) fn reset_filter(&mut self, backend: &mut dyn Backend) {
        self.filter = ImageFilter::default();
        self.rebuild_filter_index();
        persist_excluded(backend, &self.filter);
    }

    pub fn filter(&self) -> &ImageFilter {
        &self.filter
    }

    pub fn filter_index(&self) -> &FilterIndex {
        &self.filter_index
    }

    /// `(position, visible_count)` of the current image in filtered order.
    pub fn filtered_position(&self) -> Option<(usize, usize)> {
        let current = self.current_index?;
        self.filter_index
            .filtered(current)
            .map(|position| (position, self.filter_index.len()))
    }
}

fn persist_excluded(backend: &mut dyn Backend, filter: &ImageFilter) {
    let body = ExcludedCategoriesBody {
        excluded_categories: filter.excluded.iter().cloned().collect(),
    };
    match backend
        .save_excluded_categories(&body)
        .and_then(Reply::into_result)
    {
        Ok(_) => log::debug!("Saved {} excluded categories", body.excluded_categories.len()),
        Err(e) => log::warn!("Failed to save excluded categories: {}", e),
    }
}
