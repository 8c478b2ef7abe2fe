use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{serialize_schedule, CustomObjects, LearningRateSchedule, ScheduleConfig};
use crate::optim::ConfigError;

/// Ramps the learning rate up from 0 to `initial_learning_rate` over the first
/// `warmup_steps` steps, then hands over to `decay_schedule_fn`.
///
/// During warmup the rate is `initial_learning_rate * (step / warmup_steps)^power`,
/// so a `power` of 1 is a linear ramp. With `warmup_steps == 0` there is no
/// warmup phase at all.
///
/// ```rust
/// # use std::sync::Arc;
/// # use wdopt::schedules::*;
/// let schedule = WarmUp::new(1e-3, 4, Arc::new(ConstantSchedule::new(1e-3)));
/// assert_eq!(schedule.learning_rate(0), 0.0);
/// assert_eq!(schedule.learning_rate(2), 5e-4);
/// assert_eq!(schedule.learning_rate(4), 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct WarmUp {
    pub initial_learning_rate: f64,
    pub warmup_steps: u64,
    pub power: f64,
    pub decay_schedule_fn: Arc<dyn LearningRateSchedule>,
    pub name: Option<String>,
}

fn default_power() -> f64 {
    1.0
}

/// The serialized form of [WarmUp]. The decay schedule is nested as a
/// [ScheduleConfig].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmUpConfig {
    pub initial_learning_rate: f64,
    pub decay_schedule_fn: ScheduleConfig,
    pub warmup_steps: u64,
    #[serde(default = "default_power")]
    pub power: f64,
    #[serde(default)]
    pub name: Option<String>,
}

impl WarmUp {
    pub const CLASS_NAME: &'static str = "WarmUp";

    /// Linear warmup.
    pub fn new(
        initial_learning_rate: f64,
        warmup_steps: u64,
        decay_schedule_fn: Arc<dyn LearningRateSchedule>,
    ) -> Self {
        Self {
            initial_learning_rate,
            warmup_steps,
            power: default_power(),
            decay_schedule_fn,
            name: None,
        }
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Rebuilds a [WarmUp] from its config. The nested decay schedule must be
    /// known to `custom_objects`.
    pub fn from_config(
        config: &serde_json::Value,
        custom_objects: &CustomObjects,
    ) -> Result<Arc<dyn LearningRateSchedule>, ConfigError> {
        let config: WarmUpConfig = serde_json::from_value(config.clone())?;
        let decay_schedule_fn = custom_objects.deserialize(&config.decay_schedule_fn)?;
        Ok(Arc::new(Self {
            initial_learning_rate: config.initial_learning_rate,
            warmup_steps: config.warmup_steps,
            power: config.power,
            decay_schedule_fn,
            name: config.name,
        }))
    }
}

impl LearningRateSchedule for WarmUp {
    fn learning_rate(&self, step: u64) -> f64 {
        if step < self.warmup_steps {
            let percent_done = step as f64 / self.warmup_steps as f64;
            self.initial_learning_rate * percent_done.powf(self.power)
        } else {
            self.decay_schedule_fn.learning_rate(step)
        }
    }

    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn get_config(&self) -> Result<serde_json::Value, ConfigError> {
        let config = WarmUpConfig {
            initial_learning_rate: self.initial_learning_rate,
            decay_schedule_fn: serialize_schedule(self.decay_schedule_fn.as_ref())?,
            warmup_steps: self.warmup_steps,
            power: self.power,
            name: self.name.clone(),
        };
        Ok(serde_json::to_value(config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedules::{ConstantSchedule, PolynomialDecay};

    #[test]
    fn test_warmup_then_decay() {
        let decay = Arc::new(PolynomialDecay::new(1.0, 20).with_end_learning_rate(0.0));
        let s = WarmUp::new(1.0, 10, decay.clone());
        for step in 0..10 {
            assert_eq!(s.learning_rate(step), step as f64 / 10.0);
        }
        for step in 10..30 {
            assert_eq!(s.learning_rate(step), decay.learning_rate(step));
        }
    }

    #[test]
    fn test_warmup_power() {
        let s = WarmUp::new(2.0, 10, Arc::new(ConstantSchedule::new(2.0))).with_power(2.0);
        assert!((s.learning_rate(5) - 0.5).abs() < 1e-12);
        assert!((s.learning_rate(1) - 0.02).abs() < 1e-12);
        assert_eq!(s.learning_rate(10), 2.0);
    }

    #[test]
    fn test_zero_warmup_steps_delegates() {
        let s = WarmUp::new(1.0, 0, Arc::new(ConstantSchedule::new(0.25)));
        assert_eq!(s.learning_rate(0), 0.25);
        assert_eq!(s.learning_rate(1), 0.25);
    }

    #[test]
    fn test_config_nests_decay() {
        let s = WarmUp::new(0.5, 3, Arc::new(PolynomialDecay::new(0.5, 30))).with_name("warmup");
        let config = s.get_config().unwrap();
        assert_eq!(config["warmup_steps"], 3);
        assert_eq!(config["name"], "warmup");
        assert_eq!(config["decay_schedule_fn"]["class_name"], "PolynomialDecay");
        assert_eq!(config["decay_schedule_fn"]["config"]["decay_steps"], 30);
    }

    #[test]
    fn test_from_config() {
        let s = WarmUp::new(0.5, 3, Arc::new(PolynomialDecay::new(0.5, 30))).with_power(0.5);
        let config = s.get_config().unwrap();
        let rebuilt = WarmUp::from_config(&config, &CustomObjects::default()).unwrap();
        assert_eq!(rebuilt.class_name(), WarmUp::CLASS_NAME);
        assert_eq!(rebuilt.get_config().unwrap(), config);
        for step in 0..40 {
            assert_eq!(rebuilt.learning_rate(step), s.learning_rate(step));
        }
    }

    #[test]
    fn test_from_config_needs_nested_class() {
        let s = WarmUp::new(0.5, 3, Arc::new(ConstantSchedule::new(0.5)));
        let config = s.get_config().unwrap();
        let r = WarmUp::from_config(&config, &CustomObjects::empty());
        assert!(matches!(r, Err(ConfigError::UnknownSchedule(ref name)) if name == "Constant"));
    }
}
