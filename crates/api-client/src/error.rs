use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to perform the HTTP request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("The market data service returned an error: {0}")]
    Upstream(String),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),

    #[error("Failed to read local market data: {0}")]
    Io(#[from] std::io::Error),
}
