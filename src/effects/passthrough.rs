use super::Effect;
use crate::error::{Result, SynthError};
use crate::params::{ParamValue, ParameterSet, Parameterized};

/// Returns a copy of its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passthrough {
    sample_rate: u32,
}

impl Passthrough {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Parameterized for Passthrough {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
    }

    fn apply_parameter(&mut self, key: &str, _value: &ParamValue) -> Result<()> {
        Err(SynthError::UnknownParameter(key.to_string()))
    }
}

impl Effect for Passthrough {
    fn name(&self) -> &str {
        "No Effect"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn process(&self, input: &[f32]) -> Result<Vec<f32>> {
        Ok(input.to_vec())
    }
}
