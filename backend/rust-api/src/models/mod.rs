pub mod generation;
pub mod module;
pub mod progress;
pub mod reporting;
pub mod user;
