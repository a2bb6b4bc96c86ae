use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Strategy received invalid input: {0}")]
    InvalidInput(String),

    #[error("An error occurred while fitting or forecasting: {0}")]
    Execution(String),

    #[error("Strategy dependency unavailable: {0}")]
    DependencyUnavailable(String),
}
