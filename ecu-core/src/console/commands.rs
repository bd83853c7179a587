//! Console command dispatcher.
//!
//! Applies parsed commands to the configuration and report scheduler and
//! reports the outcome as data; rendering is left to the embedding target.

use core::fmt;

use crate::config::{ConfigError, EcuConfig, Field};
use crate::telemetry::{PeriodOutOfRange, ReportScheduler};

use super::grammar::Command;

/// Persistence collaborator for `config save`.
pub trait ConfigStore {
    /// Writes the configuration to non-volatile storage.
    fn save(&mut self, config: &EcuConfig) -> Result<(), StoreError>;
}

/// Storage collaborator failure.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StoreError;

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config store failure")
    }
}

/// Store that discards writes; used by tests and the emulator.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopConfigStore;

impl ConfigStore for NoopConfigStore {
    fn save(&mut self, _: &EcuConfig) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Successful command outcome.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Reply {
    /// Dump the full configuration; the embedder renders [`Field::ALL`].
    ConfigDump(EcuConfig),
    /// Defaults restored.
    DefaultsRestored,
    /// Configuration persisted.
    Saved,
    /// Report period changed.
    Period(u16),
    /// Single-field read.
    Value { field: Field, value: u16 },
    /// Single-field write applied.
    Updated { field: Field, value: u16 },
}

/// Errors surfaced while executing a command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// `get`/`set` named a field that does not exist.
    Config(ConfigError),
    /// `period` argument outside the accepted range.
    Period(PeriodOutOfRange),
    /// The storage collaborator rejected the save.
    Store(StoreError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Config(error) => write!(f, "{error}"),
            CommandError::Period(PeriodOutOfRange(value)) => {
                write!(f, "invalid period {value}")
            }
            CommandError::Store(error) => write!(f, "{error}"),
        }
    }
}

impl From<ConfigError> for CommandError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<PeriodOutOfRange> for CommandError {
    fn from(error: PeriodOutOfRange) -> Self {
        Self::Period(error)
    }
}

impl From<StoreError> for CommandError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

/// Executes one parsed command against the live configuration and scheduler.
pub fn execute<S: ConfigStore>(
    command: Command<'_>,
    config: &mut EcuConfig,
    scheduler: &mut ReportScheduler,
    store: &mut S,
) -> Result<Reply, CommandError> {
    match command {
        Command::ShowConfig => Ok(Reply::ConfigDump(*config)),
        Command::ConfigDefaults => {
            *config = EcuConfig::default();
            Ok(Reply::DefaultsRestored)
        }
        Command::ConfigSave => {
            store.save(config)?;
            Ok(Reply::Saved)
        }
        Command::Period(period_ms) => {
            scheduler.set_period(period_ms)?;
            Ok(Reply::Period(period_ms))
        }
        Command::Get(name) => {
            let field = Field::by_name(name).ok_or(ConfigError::UnknownField)?;
            Ok(Reply::Value {
                field,
                value: config.get(field),
            })
        }
        Command::Set { field, value } => {
            let field = Field::by_name(field).ok_or(ConfigError::UnknownField)?;
            config.set(field, value)?;
            Ok(Reply::Updated { field, value })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::grammar::parse_line;

    fn run(line: &str, config: &mut EcuConfig, scheduler: &mut ReportScheduler)
    -> Result<Reply, CommandError> {
        execute(
            parse_line(line).unwrap(),
            config,
            scheduler,
            &mut NoopConfigStore,
        )
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut config = EcuConfig::default();
        let mut scheduler = ReportScheduler::new(0);

        assert_eq!(
            run("set rpm_limit 7500", &mut config, &mut scheduler),
            Ok(Reply::Updated {
                field: Field::RpmLimit,
                value: 7_500
            })
        );
        assert_eq!(
            run("get rpm_limit", &mut config, &mut scheduler),
            Ok(Reply::Value {
                field: Field::RpmLimit,
                value: 7_500
            })
        );
    }

    #[test]
    fn defaults_restore_everything() {
        let mut config = EcuConfig::default();
        let mut scheduler = ReportScheduler::new(0);

        run("set thr_start 1500", &mut config, &mut scheduler).unwrap();
        assert_eq!(
            run("config defaults", &mut config, &mut scheduler),
            Ok(Reply::DefaultsRestored)
        );
        assert_eq!(config, EcuConfig::default());
    }

    #[test]
    fn period_is_bounded() {
        let mut config = EcuConfig::default();
        let mut scheduler = ReportScheduler::new(0);

        assert_eq!(
            run("period 500", &mut config, &mut scheduler),
            Ok(Reply::Period(500))
        );
        assert_eq!(scheduler.period_ms(), 500);
        assert_eq!(
            run("period 5001", &mut config, &mut scheduler),
            Err(CommandError::Period(PeriodOutOfRange(5_001)))
        );
        assert_eq!(scheduler.period_ms(), 500);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut config = EcuConfig::default();
        let mut scheduler = ReportScheduler::new(0);

        assert_eq!(
            run("get warp_drive", &mut config, &mut scheduler),
            Err(CommandError::Config(ConfigError::UnknownField))
        );
        assert_eq!(
            run("set warp_drive 1", &mut config, &mut scheduler),
            Err(CommandError::Config(ConfigError::UnknownField))
        );
    }
}
