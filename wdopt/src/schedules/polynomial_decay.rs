use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{CustomObjects, LearningRateSchedule};
use crate::optim::ConfigError;

fn default_end_learning_rate() -> f64 {
    1e-4
}

fn default_power() -> f64 {
    1.0
}

/// Decays from `initial_learning_rate` to `end_learning_rate` over
/// `decay_steps` following `(1 - step / decay_steps)^power`, and stays at
/// `end_learning_rate` afterwards.
///
/// With `cycle` the decay restarts with a longer period instead: `decay_steps`
/// is multiplied by `ceil(step / decay_steps)`.
///
/// A `decay_steps` of 0 means there is nothing to decay over, so every step
/// gets `end_learning_rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialDecay {
    pub initial_learning_rate: f64,
    pub decay_steps: u64,
    #[serde(default = "default_end_learning_rate")]
    pub end_learning_rate: f64,
    #[serde(default = "default_power")]
    pub power: f64,
    #[serde(default)]
    pub cycle: bool,
    #[serde(default)]
    pub name: Option<String>,
}

impl PolynomialDecay {
    pub const CLASS_NAME: &'static str = "PolynomialDecay";

    /// Linear decay to `1e-4`.
    pub fn new(initial_learning_rate: f64, decay_steps: u64) -> Self {
        Self {
            initial_learning_rate,
            decay_steps,
            end_learning_rate: default_end_learning_rate(),
            power: default_power(),
            cycle: false,
            name: None,
        }
    }

    pub fn with_end_learning_rate(mut self, end_learning_rate: f64) -> Self {
        self.end_learning_rate = end_learning_rate;
        self
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    pub fn with_cycle(mut self, cycle: bool) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn from_config(
        config: &serde_json::Value,
        _: &CustomObjects,
    ) -> Result<Arc<dyn LearningRateSchedule>, ConfigError> {
        let schedule: Self = serde_json::from_value(config.clone())?;
        Ok(Arc::new(schedule))
    }
}

impl LearningRateSchedule for PolynomialDecay {
    fn learning_rate(&self, step: u64) -> f64 {
        if self.decay_steps == 0 {
            return self.end_learning_rate;
        }
        let step = step as f64;
        let mut decay_steps = self.decay_steps as f64;
        let step = if self.cycle {
            let multiplier = (step / decay_steps).ceil().max(1.0);
            decay_steps *= multiplier;
            step
        } else {
            step.min(decay_steps)
        };
        let frac = 1.0 - step / decay_steps;
        (self.initial_learning_rate - self.end_learning_rate) * frac.powf(self.power)
            + self.end_learning_rate
    }

    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn get_config(&self) -> Result<serde_json::Value, ConfigError> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_linear_decay() {
        let s = PolynomialDecay::new(1.0, 4).with_end_learning_rate(0.0);
        let rates: Vec<f64> = (0..7).map(|i| s.learning_rate(i)).collect();
        assert_eq!(rates, [1.0, 0.75, 0.5, 0.25, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_default_end_learning_rate() {
        let s = PolynomialDecay::new(0.1, 10);
        assert_eq!(s.learning_rate(10), 1e-4);
        assert_eq!(s.learning_rate(1_000_000), 1e-4);
    }

    #[test]
    fn test_power() {
        let s = PolynomialDecay::new(1.0, 10)
            .with_end_learning_rate(0.0)
            .with_power(2.0);
        assert!(close(s.learning_rate(5), 0.25));
        assert!(close(s.learning_rate(9), 0.01));
    }

    #[test]
    fn test_cycle() {
        let s = PolynomialDecay::new(1.0, 4)
            .with_end_learning_rate(0.0)
            .with_cycle(true);
        assert_eq!(s.learning_rate(0), 1.0);
        assert_eq!(s.learning_rate(4), 0.0);
        // second period is 8 steps long
        assert!(close(s.learning_rate(5), 1.0 - 5.0 / 8.0));
        assert!(close(s.learning_rate(8), 0.0));
        // third is 12
        assert!(close(s.learning_rate(9), 1.0 - 9.0 / 12.0));
    }

    #[test]
    fn test_zero_decay_steps() {
        let s = PolynomialDecay::new(1.0, 0).with_end_learning_rate(0.3);
        assert_eq!(s.learning_rate(0), 0.3);
        assert_eq!(s.learning_rate(7), 0.3);
        assert_eq!(s.clone().with_cycle(true).learning_rate(7), 0.3);
    }

    #[test]
    fn test_config_defaults() {
        let s = PolynomialDecay::from_config(
            &serde_json::json!({"initial_learning_rate": 0.5, "decay_steps": 2}),
            &CustomObjects::default(),
        )
        .unwrap();
        assert_eq!(s.learning_rate(2), 1e-4);
        assert_eq!(
            s.get_config().unwrap(),
            serde_json::json!({
                "initial_learning_rate": 0.5,
                "decay_steps": 2,
                "end_learning_rate": 1e-4,
                "power": 1.0,
                "cycle": false,
                "name": null
            })
        );
    }
}
