use thiserror::Error;

/// Raised while turning raw rows into records. Fatal to the load cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Row {row}: required field '{field}' is missing")]
    MissingField { row: usize, field: &'static str },

    #[error("Row {row}: field 'ticker' is empty")]
    EmptyTicker { row: usize },

    #[error("Row {row}: cannot parse '{value}' as a date")]
    InvalidDate { row: usize, value: String },

    #[error("Row {row}: field '{field}' has an invalid value '{value}'")]
    InvalidValue {
        row: usize,
        field: &'static str,
        value: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),
}
