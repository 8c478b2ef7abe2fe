//! Learning rate schedules: pure functions from the optimizer's step counter
//! to a learning rate.
//!
//! Every schedule can export itself as a [ScheduleConfig], a class name plus a
//! JSON config. Turning a [ScheduleConfig] back into a schedule goes through a
//! [CustomObjects] registry, which maps class names to constructors. The
//! built-in registry knows [ConstantSchedule] and [PolynomialDecay]; schedules
//! that wrap other schedules, like [WarmUp], have to be registered explicitly.
//!
//! ```rust
//! # use wdopt::schedules::*;
//! let schedule = build_schedule(1e-3, 100, 10);
//! assert_eq!(schedule.learning_rate(0), 0.0);
//! assert!((schedule.learning_rate(5) - 5e-4).abs() < 1e-12);
//!
//! let config = serialize_schedule(schedule.as_ref()).unwrap();
//! assert_eq!(config.class_name, "WarmUp");
//!
//! // WarmUp isn't a built-in, so it has to be registered to come back.
//! assert!(CustomObjects::default().deserialize(&config).is_err());
//! let objects = CustomObjects::default().with(WarmUp::CLASS_NAME, WarmUp::from_config);
//! let rebuilt = objects.deserialize(&config).unwrap();
//! assert_eq!(rebuilt.learning_rate(50), schedule.learning_rate(50));
//! ```

mod constant;
mod polynomial_decay;
mod warmup;

pub use constant::ConstantSchedule;
pub use polynomial_decay::PolynomialDecay;
pub use warmup::{WarmUp, WarmUpConfig};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::optim::ConfigError;

/// Maps the optimizer's step counter to a learning rate.
///
/// Schedules are stateless. The same step always gives the same rate.
pub trait LearningRateSchedule: std::fmt::Debug + Send + Sync {
    /// The learning rate to use for the update at `step` (0 based).
    fn learning_rate(&self, step: u64) -> f64;

    /// The name this schedule is registered under in [CustomObjects].
    fn class_name(&self) -> &'static str;

    /// The constructor arguments of this schedule.
    fn get_config(&self) -> Result<serde_json::Value, ConfigError>;
}

/// A serialized schedule: which constructor to use, and what to pass it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub class_name: String,
    pub config: serde_json::Value,
}

/// Builds a schedule from its config. Gets the registry so nested schedules can
/// be rebuilt too.
pub type ScheduleConstructor =
    fn(&serde_json::Value, &CustomObjects) -> Result<Arc<dyn LearningRateSchedule>, ConfigError>;

/// Registry of schedule constructors keyed by class name.
///
/// [CustomObjects::default()] contains the built-in schedules.
#[derive(Debug, Clone)]
pub struct CustomObjects {
    constructors: BTreeMap<String, ScheduleConstructor>,
}

impl Default for CustomObjects {
    fn default() -> Self {
        Self::empty()
            .with(ConstantSchedule::CLASS_NAME, ConstantSchedule::from_config)
            .with(PolynomialDecay::CLASS_NAME, PolynomialDecay::from_config)
    }
}

impl CustomObjects {
    /// A registry that knows nothing, not even the built-ins.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registers `constructor` under `class_name`, replacing any previous entry.
    pub fn register(&mut self, class_name: impl Into<String>, constructor: ScheduleConstructor) {
        self.constructors.insert(class_name.into(), constructor);
    }

    /// Builder version of [CustomObjects::register].
    pub fn with(mut self, class_name: impl Into<String>, constructor: ScheduleConstructor) -> Self {
        self.register(class_name, constructor);
        self
    }

    /// Adds every entry of `other`, which wins on conflicts.
    pub fn extend(&mut self, other: &CustomObjects) {
        self.constructors.extend(
            other
                .constructors
                .iter()
                .map(|(name, constructor)| (name.clone(), *constructor)),
        );
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.constructors.contains_key(class_name)
    }

    /// Rebuilds the schedule described by `config`.
    pub fn deserialize(
        &self,
        config: &ScheduleConfig,
    ) -> Result<Arc<dyn LearningRateSchedule>, ConfigError> {
        let constructor = self
            .constructors
            .get(&config.class_name)
            .ok_or_else(|| ConfigError::UnknownSchedule(config.class_name.clone()))?;
        constructor(&config.config, self)
    }
}

/// Exports `schedule` as a [ScheduleConfig].
pub fn serialize_schedule(
    schedule: &dyn LearningRateSchedule,
) -> Result<ScheduleConfig, ConfigError> {
    Ok(ScheduleConfig {
        class_name: schedule.class_name().to_string(),
        config: schedule.get_config()?,
    })
}

/// The schedule used by [crate::optim::create_optimizer]: linear decay from
/// `init_lr` to `0.0` over `num_train_steps`, preceded by a linear warmup
/// over the first `num_warmup_steps` steps if `num_warmup_steps` is non zero.
pub fn build_schedule(
    init_lr: f64,
    num_train_steps: u64,
    num_warmup_steps: u64,
) -> Arc<dyn LearningRateSchedule> {
    let decay = Arc::new(PolynomialDecay {
        initial_learning_rate: init_lr,
        decay_steps: num_train_steps,
        end_learning_rate: 0.0,
        power: 1.0,
        cycle: false,
        name: None,
    });
    if num_warmup_steps == 0 {
        return decay;
    }
    Arc::new(WarmUp {
        initial_learning_rate: init_lr,
        warmup_steps: num_warmup_steps,
        power: 1.0,
        decay_schedule_fn: decay,
        name: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_schedule_without_warmup_is_decay() {
        let schedule = build_schedule(0.1, 10, 0);
        assert_eq!(schedule.class_name(), PolynomialDecay::CLASS_NAME);
        let decay = PolynomialDecay::new(0.1, 10).with_end_learning_rate(0.0);
        for step in [0, 1, 5, 9, 10, 11, 1000] {
            assert_eq!(schedule.learning_rate(step), decay.learning_rate(step));
        }
        assert_eq!(schedule.learning_rate(0), 0.1);
        assert_eq!(schedule.learning_rate(10), 0.0);
    }

    #[test]
    fn test_build_schedule_with_warmup() {
        let schedule = build_schedule(0.1, 100, 10);
        assert_eq!(schedule.class_name(), WarmUp::CLASS_NAME);
        assert_eq!(schedule.learning_rate(0), 0.0);
        assert!((schedule.learning_rate(1) - 0.01).abs() < 1e-12);
        assert!((schedule.learning_rate(9) - 0.09).abs() < 1e-12);
        // from step 10 on the decay takes over, which is at 0.1 * (1 - 10 / 100)
        assert!((schedule.learning_rate(10) - 0.09).abs() < 1e-12);
        assert_eq!(schedule.learning_rate(100), 0.0);
    }

    #[test]
    fn test_unknown_class_name() {
        let config = ScheduleConfig {
            class_name: "CosineDecay".into(),
            config: serde_json::json!({}),
        };
        let r = CustomObjects::default().deserialize(&config);
        assert!(matches!(r, Err(ConfigError::UnknownSchedule(ref name)) if name == "CosineDecay"));
    }

    #[test]
    fn test_registry_extend_and_contains() {
        let mut objects = CustomObjects::empty();
        assert!(!objects.contains(ConstantSchedule::CLASS_NAME));
        objects.extend(&CustomObjects::default());
        assert!(objects.contains(ConstantSchedule::CLASS_NAME));
        assert!(objects.contains(PolynomialDecay::CLASS_NAME));
        assert!(!objects.contains(WarmUp::CLASS_NAME));
    }

    #[test]
    fn test_schedule_config_json_shape() {
        let config = serialize_schedule(&ConstantSchedule::new(0.5)).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"class_name": "Constant", "config": {"learning_rate": 0.5}})
        );
    }
}
