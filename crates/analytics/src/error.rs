use core_types::SchemaError;
use thiserror::Error;

/// Errors surfaced by the store and the caches. Aggregations never fail: an
/// empty or under-populated table is returned instead.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Row set does not match the expected schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("No record store has been loaded yet")]
    NotLoaded,
}
