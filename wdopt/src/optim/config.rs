use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schedules::{
    serialize_schedule, ConstantSchedule, CustomObjects, LearningRateSchedule, ScheduleConfig,
};
use crate::tensor::Error;

/// Errors from exporting or importing optimizer configs and state.
#[derive(Debug)]
pub enum ConfigError {
    /// A config could not be (de)serialized.
    Json(serde_json::Error),
    /// A schedule class name that isn't in the [CustomObjects] registry.
    UnknownSchedule(String),
    /// An entry of `exclude_from_weight_decay` is not a valid regex.
    InvalidPattern(regex::Error),
    #[cfg(feature = "safetensors")]
    Safetensors(safetensors::SafeTensorError),
    Io(std::io::Error),
    /// A checkpoint doesn't fit the model it's loaded into.
    StateMismatch(String),
    Tensor(Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid config: {err}"),
            Self::UnknownSchedule(name) => write!(
                f,
                "unknown learning rate schedule `{name}`, register it as a custom object"
            ),
            Self::InvalidPattern(err) => write!(f, "invalid weight decay exclusion pattern: {err}"),
            #[cfg(feature = "safetensors")]
            Self::Safetensors(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::StateMismatch(msg) => write!(f, "optimizer state mismatch: {msg}"),
            Self::Tensor(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InvalidPattern(err) => Some(err),
            #[cfg(feature = "safetensors")]
            Self::Safetensors(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Tensor(err) => Some(err),
            Self::UnknownSchedule(_) | Self::StateMismatch(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<regex::Error> for ConfigError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidPattern(err)
    }
}

#[cfg(feature = "safetensors")]
impl From<safetensors::SafeTensorError> for ConfigError {
    fn from(err: safetensors::SafeTensorError) -> Self {
        Self::Safetensors(err)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<Error> for ConfigError {
    fn from(err: Error) -> Self {
        Self::Tensor(err)
    }
}

/// A learning rate as it appears in a config: either a plain number or a
/// serialized schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LearningRateConfig {
    Value(f64),
    Schedule(ScheduleConfig),
}

impl LearningRateConfig {
    /// Constant schedules are exported as plain numbers.
    pub fn from_schedule(schedule: &dyn LearningRateSchedule) -> Result<Self, ConfigError> {
        let config = serialize_schedule(schedule)?;
        if config.class_name == ConstantSchedule::CLASS_NAME {
            let constant: ConstantSchedule = serde_json::from_value(config.config)?;
            return Ok(Self::Value(constant.learning_rate));
        }
        Ok(Self::Schedule(config))
    }

    pub fn to_schedule(
        &self,
        custom_objects: &CustomObjects,
    ) -> Result<Arc<dyn LearningRateSchedule>, ConfigError> {
        match self {
            Self::Value(lr) => Ok(Arc::new(ConstantSchedule::new(*lr))),
            Self::Schedule(config) => custom_objects.deserialize(config),
        }
    }
}

/// Everything needed to rebuild an [super::AdamWeightDecay], in a form that
/// round-trips through JSON.
///
/// ```rust
/// # use wdopt::optim::*;
/// let json = r#"{
///     "name": "AdamWeightDecay",
///     "learning_rate": 0.001,
///     "beta_1": 0.9,
///     "beta_2": 0.999,
///     "epsilon": 1e-6,
///     "weight_decay_rate": 0.01,
///     "exclude_from_weight_decay": ["layer_norm", "bias"]
/// }"#;
/// let config = OptimizerConfig::from_json(json).unwrap();
/// assert_eq!(config.weight_decay_rate, 0.01);
/// assert_eq!(config.learning_rate, LearningRateConfig::Value(0.001));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub name: String,
    pub learning_rate: LearningRateConfig,
    pub beta_1: f64,
    pub beta_2: f64,
    pub epsilon: f64,
    pub weight_decay_rate: f64,
    #[serde(default)]
    pub exclude_from_weight_decay: Option<Vec<String>>,
}

impl OptimizerConfig {
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
