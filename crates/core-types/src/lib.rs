pub mod enums;
pub mod error;
pub mod normalize;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::StrategyKind;
pub use error::CoreError;
pub use normalize::{bars_from_records, Normalizer, MAX_HORIZON, MIN_HISTORY};
pub use structs::{Bar, PricePoint, TimeSeries};
