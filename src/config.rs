#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::DEFAULT_SAMPLE_RATE;

/// Settings shared by one render session.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Output framerate in Hz. Instruments and effects are expected to run at
    /// the same rate.
    pub sample_rate: u32,
    /// Silence appended after the last note when the mix buffer is reserved.
    pub guard_seconds: f64,
    /// Channel count reported to the audio sink. Rendering itself is mono.
    pub channels: u16,
    /// Stop enqueueing notes whose `time_off` goes past this many seconds.
    pub time_limit: Option<f64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            guard_seconds: 1.0,
            channels: 1,
            time_limit: None,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.max(1);
        self
    }

    pub fn with_guard_seconds(mut self, seconds: f64) -> Self {
        self.guard_seconds = seconds.max(0.0);
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels.max(1);
        self
    }

    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    /// Convert a time in seconds to a sample count at this framerate.
    pub fn samples_for(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate as f64).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cd_rate_mono() {
        let config = RenderConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.channels, 1);
        assert!(config.time_limit.is_none());
    }

    #[test]
    fn builder_clamps_nonsense() {
        let config = RenderConfig::new()
            .with_sample_rate(0)
            .with_guard_seconds(-3.0)
            .with_channels(0);
        assert_eq!(config.sample_rate, 1);
        assert_eq!(config.guard_seconds, 0.0);
        assert_eq!(config.channels, 1);
    }

    #[test]
    fn samples_for_rounds() {
        let config = RenderConfig::new().with_sample_rate(1000);
        assert_eq!(config.samples_for(0.0015), 2);
        assert_eq!(config.samples_for(-1.0), 0);
    }
}
