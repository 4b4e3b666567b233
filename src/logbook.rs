//! Power log record format.
//!
//! The log file is plain CSV, one record per line, no header:
//!
//! ```text
//! 1700000000,1000
//! 1700000010,987
//! ```
//!
//! The first column is Unix time in seconds, the second the instantaneous
//! load in watts.  The web chart reads the file back with [`LogRecord::parse`].

use core::fmt;
use core::str::FromStr;

/// Name of the log file on the data partition.
pub const LOG_FILE_NAME: &str = "log.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    pub epoch_secs: u32,
    pub watts: u32,
}

/// Why a line could not be read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    MissingField,
    InvalidNumber,
    TrailingData,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField => write!(f, "missing field"),
            Self::InvalidNumber => write!(f, "invalid number"),
            Self::TrailingData => write!(f, "trailing data"),
        }
    }
}

impl LogRecord {
    pub const fn new(epoch_secs: u32, watts: u32) -> Self {
        Self { epoch_secs, watts }
    }

    /// Parse one line.  A trailing `\n` or `\r\n` is accepted.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.split(',');
        let epoch = fields.next().filter(|f| !f.is_empty()).ok_or(ParseError::MissingField)?;
        let watts = fields.next().filter(|f| !f.is_empty()).ok_or(ParseError::MissingField)?;
        if fields.next().is_some() {
            return Err(ParseError::TrailingData);
        }
        Ok(Self {
            epoch_secs: epoch.parse().map_err(|_| ParseError::InvalidNumber)?,
            watts: watts.parse().map_err(|_| ParseError::InvalidNumber)?,
        })
    }
}

/// Renders the full line, newline included.
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{},{}", self.epoch_secs, self.watts)
    }
}

impl FromStr for LogRecord {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Every well-formed record in `text`, skipping blank and damaged lines
/// (a power cut mid-append leaves a truncated last line).
pub fn records(text: &str) -> impl Iterator<Item = LogRecord> + '_ {
    text.lines().filter_map(|line| LogRecord::parse(line).ok())
}
