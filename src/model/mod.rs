pub mod batch;
pub mod entry;
pub mod resource;
pub mod string_map;

pub use batch::Batch;
pub use entry::{Decision, TranslationRecord};
pub use resource::{ResourceFile, ResourceFormat};
pub use string_map::StringMap;
