pub mod capture;
pub mod harvest;
pub mod model;
pub mod parse;
pub mod queue;
pub mod service;
pub mod traits;

// Re-export common types for convenience
pub use capture::{InstrumentedRegex, Recorder};
pub use model::*;
pub use service::ExtractionService;
pub use traits::*;
