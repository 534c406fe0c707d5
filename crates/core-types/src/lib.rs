pub mod error;
pub mod record;
pub mod selection;

// Re-export the core types to provide a clean public API.
pub use error::{CoreError, SchemaError};
pub use record::{Period, RawRow, Record};
pub use selection::{FilterSelection, Selection, ALL_SENTINEL};
