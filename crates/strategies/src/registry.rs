use crate::error::StrategyError;
use crate::ForecastStrategy;
use configuration::StrategiesConfig;
use core_types::StrategyKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reason recorded for strategies switched off in `strategies.disabled`.
pub const DISABLED_REASON: &str = "disabled by configuration";

type Binding = Result<Arc<dyn ForecastStrategy>, String>;

enum Slot {
    Ready(Arc<dyn ForecastStrategy>),
    Unavailable(String),
}

/// Per-strategy availability as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyStatus {
    pub kind: StrategyKind,
    pub name: &'static str,
    pub alias: &'static str,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Maps every `StrategyKind` either to an implementation or to the reason
/// it cannot run.
///
/// The registry is built once at startup and only read afterwards, so it
/// is shared between requests behind an `Arc` without locking.
pub struct StrategyRegistry {
    slots: BTreeMap<StrategyKind, Slot>,
}

impl StrategyRegistry {
    /// A registry in which no strategy is available.
    pub fn empty() -> Self {
        let slots = StrategyKind::ALL
            .into_iter()
            .map(|kind| (kind, Slot::Unavailable("not registered".to_string())))
            .collect();
        Self { slots }
    }

    /// Binds every strategy compiled into this build, honouring the
    /// `disabled` list. A strategy that cannot be constructed is recorded as
    /// unavailable; it never prevents the others from binding.
    pub fn from_config(config: &StrategiesConfig) -> Self {
        let disabled = match config.disabled_kinds() {
            Ok(kinds) => kinds,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid disabled-strategy list.");
                Vec::new()
            }
        };

        let mut registry = Self::empty();
        for kind in StrategyKind::ALL {
            if disabled.contains(&kind) {
                registry = registry.with_unavailable(kind, DISABLED_REASON);
                continue;
            }
            // The compiler will error if a new StrategyKind is added but not handled here.
            let binding = match kind {
                StrategyKind::StatisticalAr => statistical_ar(config),
                StrategyKind::GradientBoostedTrees => gradient_boosted_trees(config),
                StrategyKind::AdditiveDecomposition => additive_decomposition(config),
                StrategyKind::SequenceNetwork => sequence_network(config),
                StrategyKind::AttentionNetwork => attention_network(config),
            };
            registry = match binding {
                Ok(strategy) => registry.with_strategy(strategy),
                Err(reason) => registry.with_unavailable(kind, reason),
            };
        }

        for status in registry.availability() {
            match &status.reason {
                None => tracing::info!(strategy = status.name, "Strategy available."),
                Some(reason) => tracing::warn!(strategy = status.name, %reason, "Strategy unavailable."),
            }
        }
        registry
    }

    /// Registers `strategy` under its own kind, replacing any earlier entry.
    pub fn with_strategy(mut self, strategy: Arc<dyn ForecastStrategy>) -> Self {
        self.slots.insert(strategy.kind(), Slot::Ready(strategy));
        self
    }

    pub fn with_unavailable(mut self, kind: StrategyKind, reason: impl Into<String>) -> Self {
        self.slots.insert(kind, Slot::Unavailable(reason.into()));
        self
    }

    /// Returns the implementation for `kind`, or
    /// [`StrategyError::DependencyUnavailable`] with the recorded reason.
    pub fn get(&self, kind: StrategyKind) -> Result<Arc<dyn ForecastStrategy>, StrategyError> {
        match self.slots.get(&kind) {
            Some(Slot::Ready(strategy)) => Ok(Arc::clone(strategy)),
            Some(Slot::Unavailable(reason)) => Err(StrategyError::DependencyUnavailable(format!(
                "{} is unavailable: {}",
                kind, reason
            ))),
            None => Err(StrategyError::DependencyUnavailable(format!("{} is not registered", kind))),
        }
    }

    pub fn is_available(&self, kind: StrategyKind) -> bool {
        matches!(self.slots.get(&kind), Some(Slot::Ready(_)))
    }

    pub fn available_kinds(&self) -> Vec<StrategyKind> {
        StrategyKind::ALL
            .into_iter()
            .filter(|kind| self.is_available(*kind))
            .collect()
    }

    pub fn availability(&self) -> Vec<StrategyStatus> {
        StrategyKind::ALL
            .into_iter()
            .map(|kind| {
                let reason = match self.slots.get(&kind) {
                    Some(Slot::Ready(_)) => None,
                    Some(Slot::Unavailable(reason)) => Some(reason.clone()),
                    None => Some("not registered".to_string()),
                };
                StrategyStatus {
                    kind,
                    name: kind.as_str(),
                    alias: kind.alias(),
                    available: reason.is_none(),
                    reason,
                }
            })
            .collect()
    }
}

#[allow(dead_code)]
fn not_compiled(feature: &str) -> String {
    format!("built without the `{}` feature", feature)
}

#[cfg(feature = "arima")]
fn statistical_ar(config: &StrategiesConfig) -> Binding {
    crate::arima::Arima::new(config.arima.clone())
        .map(|s| Arc::new(s) as Arc<dyn ForecastStrategy>)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "arima"))]
fn statistical_ar(_: &StrategiesConfig) -> Binding {
    Err(not_compiled("arima"))
}

#[cfg(feature = "gradient-boosting")]
fn gradient_boosted_trees(config: &StrategiesConfig) -> Binding {
    crate::gradient_boosting::GradientBoosting::new(config.gradient_boosting.clone())
        .map(|s| Arc::new(s) as Arc<dyn ForecastStrategy>)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "gradient-boosting"))]
fn gradient_boosted_trees(_: &StrategiesConfig) -> Binding {
    Err(not_compiled("gradient-boosting"))
}

#[cfg(feature = "prophet")]
fn additive_decomposition(config: &StrategiesConfig) -> Binding {
    crate::prophet::Prophet::new(config.prophet.clone())
        .map(|s| Arc::new(s) as Arc<dyn ForecastStrategy>)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "prophet"))]
fn additive_decomposition(_: &StrategiesConfig) -> Binding {
    Err(not_compiled("prophet"))
}

#[cfg(feature = "lstm")]
fn sequence_network(config: &StrategiesConfig) -> Binding {
    crate::lstm::Lstm::new(config.lstm.clone())
        .map(|s| Arc::new(s) as Arc<dyn ForecastStrategy>)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "lstm"))]
fn sequence_network(_: &StrategiesConfig) -> Binding {
    Err(not_compiled("lstm"))
}

#[cfg(feature = "tft")]
fn attention_network(config: &StrategiesConfig) -> Binding {
    crate::tft::Tft::new(config.tft.clone())
        .map(|s| Arc::new(s) as Arc<dyn ForecastStrategy>)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "tft"))]
fn attention_network(_: &StrategiesConfig) -> Binding {
    Err(not_compiled("tft"))
}
