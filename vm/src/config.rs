use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_LOAD_STALL_CYCLES: usize = 2;
pub const DEFAULT_STALL_CYCLES: usize = 1;
pub const DEFAULT_TIMELINE_WIDTH: usize = 15;
pub const NON_PIPELINED_CPI: f64 = 5.0;

/// Tunables for a simulation run
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Wall-clock delay between automatic cycle advances
    pub cycle_interval: Duration,
    /// Stall length when the producing instruction is a word load
    pub load_stall_cycles: usize,
    /// Stall length for every other producer
    pub default_stall_cycles: usize,
    /// Number of trace columns shown by the timeline
    pub timeline_width: usize,
    /// Cycles per instruction of the unpipelined baseline, used for speedup
    pub non_pipelined_cpi: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
            load_stall_cycles: DEFAULT_LOAD_STALL_CYCLES,
            default_stall_cycles: DEFAULT_STALL_CYCLES,
            timeline_width: DEFAULT_TIMELINE_WIDTH,
            non_pipelined_cpi: NON_PIPELINED_CPI,
        }
    }
}

impl SimConfig {
    /// Checks the values an engine cannot work with
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.load_stall_cycles == 0 || self.default_stall_cycles == 0 {
            return Err(ConfigError::ZeroStallCycles);
        }
        if self.timeline_width == 0 {
            return Err(ConfigError::ZeroTimelineWidth);
        }
        if !self.non_pipelined_cpi.is_finite() || self.non_pipelined_cpi <= 0.0 {
            return Err(ConfigError::InvalidCpi(self.non_pipelined_cpi));
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_cycle_interval(mut self, interval: Duration) -> Self {
        self.cycle_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default().validated().unwrap();
        assert_eq!(config.cycle_interval, Duration::from_millis(1500));
        assert_eq!(config.load_stall_cycles, 2);
        assert_eq!(config.default_stall_cycles, 1);
    }

    #[test]
    fn rejects_zero_stalls() {
        let config = SimConfig {
            default_stall_cycles: 0,
            ..SimConfig::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::ZeroStallCycles));
    }

    #[test]
    fn rejects_bad_baseline() {
        let config = SimConfig {
            non_pipelined_cpi: -1.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validated(),
            Err(ConfigError::InvalidCpi(_))
        ));
    }

    #[test]
    fn rejects_empty_timeline() {
        let config = SimConfig {
            timeline_width: 0,
            ..SimConfig::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::ZeroTimelineWidth));
    }
}
