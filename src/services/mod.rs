pub mod ai;
pub mod ai_types;
pub mod backend;
pub mod batcher;
pub mod context;
pub mod diff;
pub mod driver;
pub mod encoding;
pub mod files;
pub mod languages;
pub mod merge;
pub mod pipeline;
pub mod progress;
pub mod qa;
pub mod response;
pub mod scheduler;
