use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one of the five forecasting strategies.
///
/// Names are resolved case-insensitively. Both the canonical names and the
/// short model aliases (`arima`, `xgboost`, `prophet`, `lstm`, `tft`) map to
/// the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    StatisticalAr,
    GradientBoostedTrees,
    AdditiveDecomposition,
    SequenceNetwork,
    AttentionNetwork,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::StatisticalAr,
        StrategyKind::GradientBoostedTrees,
        StrategyKind::AdditiveDecomposition,
        StrategyKind::SequenceNetwork,
        StrategyKind::AttentionNetwork,
    ];

    /// The canonical, lower-case name of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::StatisticalAr => "statistical-ar",
            StrategyKind::GradientBoostedTrees => "gradient-boosted-trees",
            StrategyKind::AdditiveDecomposition => "additive-decomposition",
            StrategyKind::SequenceNetwork => "sequence-network",
            StrategyKind::AttentionNetwork => "attention-network",
        }
    }

    /// The short model alias the strategy is also known by.
    pub fn alias(&self) -> &'static str {
        match self {
            StrategyKind::StatisticalAr => "arima",
            StrategyKind::GradientBoostedTrees => "xgboost",
            StrategyKind::AdditiveDecomposition => "prophet",
            StrategyKind::SequenceNetwork => "lstm",
            StrategyKind::AttentionNetwork => "tft",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name || kind.alias() == name)
            .ok_or_else(|| CoreError::UnknownStrategy(s.to_string()))
    }
}
