use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{CustomObjects, LearningRateSchedule};
use crate::optim::ConfigError;

/// The same learning rate at every step. Optimizers configured with a plain
/// number use this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantSchedule {
    pub learning_rate: f64,
}

impl ConstantSchedule {
    pub const CLASS_NAME: &'static str = "Constant";

    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    pub fn from_config(
        config: &serde_json::Value,
        _: &CustomObjects,
    ) -> Result<Arc<dyn LearningRateSchedule>, ConfigError> {
        let schedule: Self = serde_json::from_value(config.clone())?;
        Ok(Arc::new(schedule))
    }
}

impl LearningRateSchedule for ConstantSchedule {
    fn learning_rate(&self, _step: u64) -> f64 {
        self.learning_rate
    }

    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn get_config(&self) -> Result<serde_json::Value, ConfigError> {
        Ok(serde_json::to_value(self)?)
    }
}
