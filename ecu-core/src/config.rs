//! Engine configuration with keyed access for the serial console.
//!
//! The configuration is read-only during a control cycle; the console applies
//! edits between cycles. Persistence (EEPROM/flash) lives in the embedding
//! target behind [`crate::console::ConfigStore`].

use core::fmt;

/// Process-wide engine configuration.
///
/// PWM pairs may be reversed (`min > max`) to describe a reversed servo; the
/// throttle calibration pair must be a forward interval.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EcuConfig {
    /// Throttle actuator duty bounds (channel 0).
    pub pwm0_min: u16,
    pub pwm0_max: u16,
    /// Crank / ignition duty bounds (channel 1).
    pub pwm1_min: u16,
    pub pwm1_max: u16,
    /// Raw throttle input calibration.
    pub thr_min: u16,
    pub thr_max: u16,
    /// Raw throttle level above which auto-crank may engage.
    pub thr_start: u16,
    /// Post-start blend window and minimum run-time for a successful start.
    pub dwell_time_ms: u16,
    /// Maximum crank duration before the attempt is judged failed.
    pub start_time_ms: u16,
    /// RPM ceiling forcing an emergency stop.
    pub rpm_limit: u16,
    /// Maximum automatic crank attempts; 0 disables auto-start.
    pub auto_start: u16,
}

impl Default for EcuConfig {
    fn default() -> Self {
        Self {
            pwm0_min: 1_000,
            pwm0_max: 2_000,
            pwm1_min: 1_000,
            pwm1_max: 2_000,
            thr_min: 1_000,
            thr_max: 2_000,
            thr_start: 1_200,
            dwell_time_ms: 3_000,
            start_time_ms: 5_000,
            rpm_limit: 9_000,
            auto_start: 3,
        }
    }
}

/// Configuration fields addressable by name from the console.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    Pwm0Min,
    Pwm0Max,
    Pwm1Min,
    Pwm1Max,
    ThrMin,
    ThrMax,
    ThrStart,
    DwellTimeMs,
    StartTimeMs,
    RpmLimit,
    AutoStart,
}

impl Field {
    /// Every addressable field, in dump order.
    pub const ALL: [Field; 11] = [
        Field::Pwm0Min,
        Field::Pwm0Max,
        Field::Pwm1Min,
        Field::Pwm1Max,
        Field::ThrMin,
        Field::ThrMax,
        Field::ThrStart,
        Field::DwellTimeMs,
        Field::StartTimeMs,
        Field::RpmLimit,
        Field::AutoStart,
    ];

    /// Console-facing key for the field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Field::Pwm0Min => "pwm0_min",
            Field::Pwm0Max => "pwm0_max",
            Field::Pwm1Min => "pwm1_min",
            Field::Pwm1Max => "pwm1_max",
            Field::ThrMin => "thr_min",
            Field::ThrMax => "thr_max",
            Field::ThrStart => "thr_start",
            Field::DwellTimeMs => "dwell_time_ms",
            Field::StartTimeMs => "start_time_ms",
            Field::RpmLimit => "rpm_limit",
            Field::AutoStart => "auto_start",
        }
    }

    /// Looks a field up by its console key.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }
}

/// Errors surfaced by keyed configuration access.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The requested key does not name a configuration field.
    UnknownField,
    /// Applying the value would violate a configuration invariant.
    Invalid(Field),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownField => write!(f, "unknown config field"),
            ConfigError::Invalid(field) => write!(f, "invalid value for {}", field.name()),
        }
    }
}

impl EcuConfig {
    /// Reads a field by catalog entry.
    #[must_use]
    pub const fn get(&self, field: Field) -> u16 {
        match field {
            Field::Pwm0Min => self.pwm0_min,
            Field::Pwm0Max => self.pwm0_max,
            Field::Pwm1Min => self.pwm1_min,
            Field::Pwm1Max => self.pwm1_max,
            Field::ThrMin => self.thr_min,
            Field::ThrMax => self.thr_max,
            Field::ThrStart => self.thr_start,
            Field::DwellTimeMs => self.dwell_time_ms,
            Field::StartTimeMs => self.start_time_ms,
            Field::RpmLimit => self.rpm_limit,
            Field::AutoStart => self.auto_start,
        }
    }

    /// Writes a field, rejecting values that would break an invariant.
    ///
    /// On rejection the previous value is kept.
    pub fn set(&mut self, field: Field, value: u16) -> Result<(), ConfigError> {
        let previous = self.get(field);
        self.store(field, value);
        if self.validate().is_err() {
            self.store(field, previous);
            return Err(ConfigError::Invalid(field));
        }
        Ok(())
    }

    /// Checks the configuration invariants: positive timing windows and a
    /// non-degenerate throttle calibration interval containing the auto-start
    /// threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dwell_time_ms == 0 {
            return Err(ConfigError::Invalid(Field::DwellTimeMs));
        }
        if self.start_time_ms == 0 {
            return Err(ConfigError::Invalid(Field::StartTimeMs));
        }
        if self.thr_min >= self.thr_max {
            return Err(ConfigError::Invalid(Field::ThrMax));
        }
        if self.thr_start < self.thr_min || self.thr_start > self.thr_max {
            return Err(ConfigError::Invalid(Field::ThrStart));
        }
        Ok(())
    }

    fn store(&mut self, field: Field, value: u16) {
        match field {
            Field::Pwm0Min => self.pwm0_min = value,
            Field::Pwm0Max => self.pwm0_max = value,
            Field::Pwm1Min => self.pwm1_min = value,
            Field::Pwm1Max => self.pwm1_max = value,
            Field::ThrMin => self.thr_min = value,
            Field::ThrMax => self.thr_max = value,
            Field::ThrStart => self.thr_start = value,
            Field::DwellTimeMs => self.dwell_time_ms = value,
            Field::StartTimeMs => self.start_time_ms = value,
            Field::RpmLimit => self.rpm_limit = value,
            Field::AutoStart => self.auto_start = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(EcuConfig::default().validate(), Ok(()));
    }

    #[test]
    fn field_lookup_round_trips() {
        for field in Field::ALL {
            assert_eq!(Field::by_name(field.name()), Some(field));
        }
        assert_eq!(Field::by_name("bogus"), None);
    }

    #[test]
    fn set_and_get_by_field() {
        let mut config = EcuConfig::default();
        config.set(Field::RpmLimit, 7_500).unwrap();
        assert_eq!(config.get(Field::RpmLimit), 7_500);
        assert_eq!(config.rpm_limit, 7_500);
    }

    #[test]
    fn invalid_writes_are_rolled_back() {
        let mut config = EcuConfig::default();
        assert_eq!(
            config.set(Field::DwellTimeMs, 0),
            Err(ConfigError::Invalid(Field::DwellTimeMs))
        );
        assert_eq!(config.dwell_time_ms, EcuConfig::default().dwell_time_ms);

        assert_eq!(
            config.set(Field::ThrMin, config.thr_max),
            Err(ConfigError::Invalid(Field::ThrMin))
        );
        assert_eq!(config.thr_min, EcuConfig::default().thr_min);
    }

    #[test]
    fn start_threshold_must_sit_inside_the_calibration_interval() {
        let mut config = EcuConfig::default();
        assert_eq!(
            config.set(Field::ThrStart, 500),
            Err(ConfigError::Invalid(Field::ThrStart))
        );
        assert_eq!(config.thr_start, EcuConfig::default().thr_start);

        assert_eq!(
            config.set(Field::ThrStart, 2_500),
            Err(ConfigError::Invalid(Field::ThrStart))
        );
        assert_eq!(config.thr_start, EcuConfig::default().thr_start);

        config.set(Field::ThrStart, config.thr_min).unwrap();
        config.set(Field::ThrStart, config.thr_max).unwrap();
    }

    #[test]
    fn reversed_pwm_pair_is_accepted() {
        let mut config = EcuConfig::default();
        config.set(Field::Pwm0Min, 2_000).unwrap();
        config.set(Field::Pwm0Max, 1_000).unwrap();
        assert_eq!(config.validate(), Ok(()));
    }
}
