//! refcap - Referring-expression Caption Annotation
//!
//! Client-side session controller for a bounding-box and caption annotation
//! tool. A reviewer steps through an image collection, picks a catalogued
//! instance, draws a custom box or marks the caption as an empty case, fills
//! in labels and saves. The controller keeps selection, per-image annotation
//! lists, validation, filtering and saved/unsaved tracking consistent, and
//! talks to persistence through the [`backend::Backend`] trait.

pub mod backend;
pub mod config;
pub mod constants;
pub mod geometry;
pub mod model;
pub mod session;

pub use config::{ConfigError, LogLevel, SessionConfig};
pub use session::{Selection, SelectionMode, Session, SessionError};
