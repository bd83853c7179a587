//! Serial configuration console.
//!
//! Line-oriented command surface exposed over the telemetry UART: show and
//! edit the configuration, persist it through the storage collaborator, and
//! retune the report period. The session assembles bytes into bounded lines;
//! [`grammar`] parses them; [`commands`] applies them.

pub mod commands;
pub mod grammar;

pub use commands::{CommandError, ConfigStore, NoopConfigStore, Reply, StoreError, execute};
pub use grammar::{Command, SyntaxError, parse_line};

use core::str;

use heapless::{String, Vec};

/// Maximum number of bytes accepted on a single console line.
pub const MAX_LINE_LEN: usize = 64;

/// Completed console line handed back by the assembler.
pub type Line = String<MAX_LINE_LEN>;

/// Errors surfaced while assembling console input.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    /// Input exceeded the maximum configured line length.
    LineOverflow,
    /// Encountered non-UTF-8 data in the assembled line buffer.
    InvalidUtf8,
}

/// Assembles raw console bytes into complete lines.
///
/// Backspace/delete edit the pending line; CR or LF terminates it. Empty
/// lines are swallowed.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
}

impl LineAssembler {
    /// Creates an assembler with an empty pending line.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feeds one byte. Returns a completed line when a terminator arrives.
    pub fn ingest(&mut self, byte: u8) -> Result<Option<Line>, ConsoleError> {
        match byte {
            b'\r' | b'\n' => self.take_line(),
            0x08 | 0x7f => {
                self.buffer.pop();
                Ok(None)
            }
            value => {
                self.buffer
                    .push(value)
                    .map_err(|_| ConsoleError::LineOverflow)?;
                Ok(None)
            }
        }
    }

    fn take_line(&mut self) -> Result<Option<Line>, ConsoleError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let line = match str::from_utf8(self.buffer.as_slice()) {
            Ok(text) => {
                let mut line = Line::new();
                // Capacities match, so this cannot overflow.
                let _ = line.push_str(text);
                line
            }
            Err(_) => {
                self.buffer.clear();
                return Err(ConsoleError::InvalidUtf8);
            }
        };
        self.buffer.clear();
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_terminated_lines() {
        let mut assembler = LineAssembler::new();
        for byte in b"period 500" {
            assert_eq!(assembler.ingest(*byte), Ok(None));
        }
        let line = assembler.ingest(b'\n').unwrap().unwrap();
        assert_eq!(line.as_str(), "period 500");
    }

    #[test]
    fn backspace_edits_the_pending_line() {
        let mut assembler = LineAssembler::new();
        for byte in b"getx\x08 rpm_limit\r" {
            if let Ok(Some(line)) = assembler.ingest(*byte) {
                assert_eq!(line.as_str(), "get rpm_limit");
                return;
            }
        }
        panic!("line never completed");
    }

    #[test]
    fn empty_lines_are_swallowed() {
        let mut assembler = LineAssembler::new();
        assert_eq!(assembler.ingest(b'\r'), Ok(None));
        assert_eq!(assembler.ingest(b'\n'), Ok(None));
    }

    #[test]
    fn overflow_is_reported() {
        let mut assembler = LineAssembler::new();
        for _ in 0..MAX_LINE_LEN {
            assembler.ingest(b'a').unwrap();
        }
        assert_eq!(assembler.ingest(b'b'), Err(ConsoleError::LineOverflow));
    }
}
