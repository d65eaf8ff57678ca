//! Bulk translation of UI string resource files through a chat-completions backend.
//!
//! A run walks every target language and input file in turn, decides which strings
//! need (re)translation, packs them into character-bounded batches, sends those
//! through a bounded number of concurrent backend calls and merges the results into
//! the previous output.

pub mod config;
pub mod error;
pub mod model;
pub mod parsers;
pub mod protocol;
pub mod services;

pub use config::{RunConfig, RunConfigOverrides};
pub use error::{AbortReason, BackendError, ResourceError, RunError};
pub use model::{ResourceFormat, StringMap};
pub use services::backend::{Backend, HttpBackend};
pub use services::context::CancelHandle;
pub use services::driver::{Run, RunSummary};
pub use services::progress::{ProgressDelta, ProgressEvent, ProgressSink};
pub use services::qa::{extract_placeholders, validate_translation, ValidationResult};
