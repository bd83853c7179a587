//! Parser for the console line protocol.
//!
//! Grammar, one command per line:
//!
//! ```text
//! config [defaults | save]
//! period <ms>
//! get <field>
//! set <field> <value>
//! ```

use core::fmt;

use winnow::ascii::{digit1, multispace0, multispace1};
use winnow::combinator::{opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

/// Parsed console command. Field names stay borrowed from the input line;
/// resolution against the config catalog happens at dispatch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command<'a> {
    /// Dump the full configuration.
    ShowConfig,
    /// Restore compiled-in defaults.
    ConfigDefaults,
    /// Persist the configuration through the storage collaborator.
    ConfigSave,
    /// Change the telemetry report period.
    Period(u16),
    /// Show one configuration field.
    Get(&'a str),
    /// Update one configuration field.
    Set { field: &'a str, value: u16 },
}

/// Parser rejected the submitted line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SyntaxError;

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized command")
    }
}

/// Parses one console line into a [`Command`].
pub fn parse_line(input: &str) -> Result<Command<'_>, SyntaxError> {
    command().parse(input).map_err(|_| SyntaxError)
}

fn command<'a>() -> impl Parser<&'a str, Command<'a>, ErrMode<ContextError>> {
    move |input: &mut &'a str| {
        multispace0.parse_next(input)?;
        let keyword = word.parse_next(input)?;
        let command = match keyword {
            "config" => match opt(preceded(multispace1, word)).parse_next(input)? {
                None => Command::ShowConfig,
                Some("defaults") => Command::ConfigDefaults,
                Some("save") => Command::ConfigSave,
                Some(_) => return Err(ErrMode::Backtrack(ContextError::new())),
            },
            "period" => Command::Period(preceded(multispace1, integer).parse_next(input)?),
            "get" => Command::Get(preceded(multispace1, word).parse_next(input)?),
            "set" => {
                let field = preceded(multispace1, word).parse_next(input)?;
                let value = preceded(multispace1, integer).parse_next(input)?;
                Command::Set { field, value }
            }
            _ => return Err(ErrMode::Backtrack(ContextError::new())),
        };
        multispace0.parse_next(input)?;
        Ok(command)
    }
}

fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

fn integer(input: &mut &str) -> ModalResult<u16> {
    digit1.parse_to().parse_next(input)
}
