use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Insufficient historical data (need {required}+ days, got {actual})")]
    InsufficientData { required: usize, actual: usize },

    #[error("Required column '{0}' is missing from the input data")]
    MissingColumn(String),

    #[error("Unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),
}
