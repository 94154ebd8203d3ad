//! Validation of the lines clients send.
//!
//! A line is either a nine digit number in `[1, 999999998]` or the literal
//! `terminate` sentinel. Everything else is rejected and ends the connection.

use std::fmt;

pub const TERMINATE_SENTINEL: &str = "terminate";
pub const RECORD_LENGTH: usize = 9;
/// Exclusive upper bound for accepted numbers.
pub const MAX_ALLOWED_NUMBER: u32 = 999_999_999;

/// A validated nine digit number. Leading zeros are significant on the wire and
/// are restored when the number is written back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Number(u32);

impl Number {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Number {
    type Error = RejectReason;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 || value >= MAX_ALLOWED_NUMBER {
            return Err(RejectReason::OutOfRange);
        }
        Ok(Number(value))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:09}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Number(Number),
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    WrongLength,
    NotNumeric,
    OutOfRange,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::WrongLength => "wrong_length",
            RejectReason::NotNumeric => "not_numeric",
            RejectReason::OutOfRange => "out_of_range",
        }
    }
}

/// Classify one line, without its terminator.
pub fn validate(line: &str) -> Result<Record, RejectReason> {
    if line == TERMINATE_SENTINEL {
        return Ok(Record::Terminate);
    }
    if line.len() != RECORD_LENGTH {
        return Err(RejectReason::WrongLength);
    }
    if !line.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RejectReason::NotNumeric);
    }

    let value = line.parse::<u32>().map_err(|_| RejectReason::NotNumeric)?;
    Number::try_from(value).map(Record::Number)
}
