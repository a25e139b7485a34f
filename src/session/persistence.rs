//! Saving and deleting annotation records.
//!
//! A response always updates the saved-data mirror, since the backend did
//! act on it. It only touches the pointer, selection and dirty flag when the
//! session is still showing the annotation the request was issued for.

use crate::backend::{Backend, BackendError, DeleteBody, Reply, SaveBody};
use crate::geometry::normalize_solution;
use crate::model::{AnnotationRecord, ImageId, Upsert, problem_statement};
use crate::session::{Session, SessionError};

/// Outstanding save request.
#[derive(Debug, Clone)]
pub struct SaveTicket {
    view: u64,
    revision: u64,
    body: SaveBody,
}

impl SaveTicket {
    /// Request body to send.
    pub fn body(&self) -> &SaveBody {
        &self.body
    }
}

/// Outstanding delete request.
#[derive(Debug, Clone)]
pub struct DeleteTicket {
    view: u64,
    image_id: ImageId,
    target: AnnotationRecord,
}

impl DeleteTicket {
    /// Request body to send, or `None` when the record has no identifier and
    /// only the local copy can be removed.
    pub fn body(&self) -> Option<DeleteBody> {
        self.target.annotation_id.as_ref().map(|id| DeleteBody {
            image_id: self.image_id.clone(),
            annotation_id: id.clone(),
        })
    }
}

/// Result of an acknowledged save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub upsert: Upsert,
    /// Whether the current view was updated
    pub applied: bool,
}

/// Result of a reconciled delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub removed_index: usize,
    pub remaining: usize,
    /// Backend had no such record; only the local copy was removed
    pub missing_on_server: bool,
    /// Whether the current view was updated
    pub applied: bool,
}

impl Session {
    /// Validate and build the record to save.
    pub fn begin_save(&mut self) -> Result<SaveTicket, SessionError> {
        let image_id = self.require_image()?;
        let report = self.validate();
        if !report.is_valid() {
            log::debug!("Save blocked: {}", report);
            self.status = report.message();
            return Err(SessionError::Invalid(report));
        }

        let annotation_id = match self.annotation_id.clone() {
            Some(id) => id,
            None => self.generate_annotation_id(&image_id),
        };
        let annotation = self.build_record(annotation_id)?;

        Ok(SaveTicket {
            view: self.view,
            revision: self.tracker.revision(),
            body: SaveBody {
                image_id,
                annotation,
            },
        })
    }

    /// Apply the backend's answer to a save.
    ///
    /// On success the mirror replaces the record with the same identifier or
    /// appends it, and the pointer follows an appended record.
    pub fn complete_save(
        &mut self,
        ticket: SaveTicket,
        response: Result<Reply, BackendError>,
    ) -> Result<SaveOutcome, SessionError> {
        let current = self.is_current_view(ticket.view);

        if let Err(e) = response.and_then(Reply::into_result) {
            log::warn!("Failed to save annotation: {}", e);
            if current {
                self.tracker.mark_save_failed();
                self.status = format!("Failed to save annotation: {}", e);
            }
            return Err(e.into());
        }

        let SaveBody {
            image_id,
            annotation,
        } = ticket.body;
        let annotation_id = annotation.annotation_id.clone();
        let upsert = self.saved.upsert(&image_id, annotation);
        self.rebuild_filter_index();
        log::info!(
            "Saved annotation {} on image {} ({:?})",
            annotation_id.as_deref().unwrap_or("?"),
            image_id,
            upsert
        );

        if !current {
            log::debug!("Save acknowledged after navigation, view left as is");
            // A blank form on the same image stays one past the end
            let same_image = self
                .image
                .as_ref()
                .is_some_and(|image| image.image_id == image_id);
            if same_image
                && self.annotation_id.is_none()
                && matches!(upsert, Upsert::Appended(_))
            {
                self.annotation_index = self.saved.count(&image_id);
            }
            return Ok(SaveOutcome {
                upsert,
                applied: false,
            });
        }

        self.annotation_id = annotation_id;
        self.annotation_index = upsert.index();
        self.tracker.mark_saved(ticket.revision);
        self.refresh_derived();
        self.status = "Annotation saved successfully!".to_string();
        Ok(SaveOutcome {
            upsert,
            applied: true,
        })
    }

    /// Save the current annotation.
    pub fn save(&mut self, backend: &mut dyn Backend) -> Result<SaveOutcome, SessionError> {
        let ticket = self.begin_save()?;
        let response = backend.save_annotation(ticket.body());
        self.complete_save(ticket, response)
    }

    fn build_record(&self, annotation_id: String) -> Result<AnnotationRecord, SessionError> {
        let image = self.image.as_ref().ok_or(SessionError::NoImageLoaded)?;
        let selection = self.selection.current();
        let solution = selection.solution();
        let normalized_solution = solution.map(|corners| {
            normalize_solution(
                &corners,
                image.width,
                image.height,
                self.config.normalized_scale,
            )
        });

        // Unknown fields of the record being replaced survive the update
        let extra = self
            .saved
            .position_by_id(&image.image_id, &annotation_id)
            .and_then(|index| self.saved.record(&image.image_id, index))
            .map(|record| record.extra.clone())
            .unwrap_or_default();

        let caption = self.form.caption.trim().to_string();
        Ok(AnnotationRecord {
            annotation_id: Some(annotation_id),
            dataset: self.config.dataset_tag.clone(),
            text_type: self.config.text_type.clone(),
            height: image.height,
            width: image.width,
            problem: problem_statement(&caption),
            normal_caption: caption,
            image: format!("{}{}", self.config.image_prefix, image.file_name),
            file_name: image.file_name.clone(),
            solution,
            normalized_solution,
            categories: self.form.to_categories(selection.is_empty_case()),
            image_index: Some(image.image_id.clone()),
            extra,
        })
    }

    /// Issue a delete for the record with the given identifier.
    pub fn begin_delete(&mut self, annotation_id: &str) -> Result<DeleteTicket, SessionError> {
        let image_id = self.require_image()?;
        match self.saved.position_by_id(&image_id, annotation_id) {
            Some(index) => self.begin_delete_at(image_id, index),
            None => Err(self.fail(SessionError::AnnotationNotFound)),
        }
    }

    /// Issue a delete for a record, matched by identifier or, for records
    /// without one, by caption and solution.
    pub fn begin_delete_record(
        &mut self,
        target: &AnnotationRecord,
    ) -> Result<DeleteTicket, SessionError> {
        let image_id = self.require_image()?;
        match self.saved.position_of(&image_id, target) {
            Some(index) => self.begin_delete_at(image_id, index),
            None => Err(self.fail(SessionError::AnnotationNotFound)),
        }
    }

    /// Issue a delete for the annotation being shown.
    pub fn begin_delete_current(&mut self) -> Result<DeleteTicket, SessionError> {
        let image_id = self.require_image()?;
        // A blank form has nothing saved to delete
        let index = self.annotation_id.as_deref().and_then(|id| {
            self.saved.position_by_id(&image_id, id).or_else(|| {
                (self.annotation_index < self.saved.count(&image_id))
                    .then_some(self.annotation_index)
            })
        });
        match index {
            Some(index) => self.begin_delete_at(image_id, index),
            None => Err(self.fail(SessionError::NoSavedAnnotation)),
        }
    }

    fn begin_delete_at(
        &mut self,
        image_id: ImageId,
        index: usize,
    ) -> Result<DeleteTicket, SessionError> {
        let Some(target) = self.saved.record(&image_id, index).cloned() else {
            return Err(self.fail(SessionError::AnnotationNotFound));
        };
        Ok(DeleteTicket {
            view: self.view,
            image_id,
            target,
        })
    }

    /// Apply the backend's answer to a delete.
    ///
    /// `None` means no request was sent. A "not found" answer is treated as
    /// already deleted. Afterwards the session shows the record before the
    /// deleted one, the new first record, or a blank annotation.
    pub fn complete_delete(
        &mut self,
        ticket: DeleteTicket,
        response: Option<Result<Reply, BackendError>>,
    ) -> Result<DeleteOutcome, SessionError> {
        let current = self.is_current_view(ticket.view);

        let missing_on_server = match response {
            None => {
                log::debug!("Record has no identifier, removing local copy only");
                false
            }
            Some(Ok(reply)) if reply.success => false,
            Some(Ok(reply)) if reply.is_not_found() => {
                log::warn!(
                    "Backend has no annotation {}, removing local copy",
                    ticket.target.annotation_id.as_deref().unwrap_or("?")
                );
                true
            }
            Some(result) => {
                let err = match result.and_then(Reply::into_result) {
                    Err(e) => e,
                    Ok(_) => BackendError::rejected("unknown error"),
                };
                log::warn!("Failed to delete annotation: {}", err);
                if current {
                    self.status = format!("Failed to delete annotation: {}", err);
                }
                return Err(err.into());
            }
        };

        let Some(index) = self.saved.position_of(&ticket.image_id, &ticket.target) else {
            let err = SessionError::AnnotationNotFound;
            if current {
                self.status = err.to_string();
            }
            return Err(err);
        };
        self.saved.remove(&ticket.image_id, index);
        self.rebuild_filter_index();
        let remaining = self.saved.count(&ticket.image_id);
        log::info!(
            "Deleted annotation {} of image {} ({} left)",
            index + 1,
            ticket.image_id,
            remaining
        );

        let mut outcome = DeleteOutcome {
            removed_index: index,
            remaining,
            missing_on_server,
            applied: false,
        };

        if !current {
            let same_image = self
                .image
                .as_ref()
                .is_some_and(|image| image.image_id == ticket.image_id);
            if same_image && self.annotation_index > index {
                self.annotation_index -= 1;
            }
            return Ok(outcome);
        }

        if remaining == 0 {
            self.create_blank_annotation()?;
        } else {
            let next = if index == 0 {
                0
            } else {
                (index - 1).min(remaining - 1)
            };
            self.select_annotation(next)?;
        }

        self.status = if missing_on_server {
            "Annotation was already gone on the server; removed locally".to_string()
        } else {
            "Annotation deleted successfully!".to_string()
        };
        outcome.applied = true;
        Ok(outcome)
    }

    /// Delete the record with the given identifier.
    pub fn delete(
        &mut self,
        backend: &mut dyn Backend,
        annotation_id: &str,
    ) -> Result<DeleteOutcome, SessionError> {
        let ticket = self.begin_delete(annotation_id)?;
        self.send_delete(backend, ticket)
    }

    /// Delete the annotation being shown.
    pub fn delete_current(&mut self, backend: &mut dyn Backend) -> Result<DeleteOutcome, SessionError> {
        let ticket = self.begin_delete_current()?;
        self.send_delete(backend, ticket)
    }

    /// Delete a record matched by identifier or by caption and solution.
    pub fn delete_record(
        &mut self,
        backend: &mut dyn Backend,
        target: &AnnotationRecord,
    ) -> Result<DeleteOutcome, SessionError> {
        let ticket = self.begin_delete_record(target)?;
        self.send_delete(backend, ticket)
    }

    fn send_delete(
        &mut self,
        backend: &mut dyn Backend,
        ticket: DeleteTicket,
    ) -> Result<DeleteOutcome, SessionError> {
        let response = ticket.body().map(|body| backend.delete_annotation(&body));
        self.complete_delete(ticket, response)
    }
}
