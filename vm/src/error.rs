use thiserror::Error;

use crate::instruction::instruction::Opcode;

/// Reasons a single source line is skipped by the parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown opcode `{0}`")]
    UnknownOpcode(String),
    #[error("{opcode} expects {expected} operand(s), found {found}")]
    MissingOperands {
        opcode: Opcode,
        expected: usize,
        found: usize,
    },
    #[error("invalid immediate `{0}`")]
    InvalidImmediate(String),
}

/// Why a new program was rejected. The previously loaded program stays active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("no source code was given")]
    EmptySource,
    #[error("no valid instructions could be parsed ({skipped} line(s) skipped)")]
    NoInstructions { skipped: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("stall lengths must be at least one cycle")]
    ZeroStallCycles,
    #[error("timeline width must be at least one column")]
    ZeroTimelineWidth,
    #[error("baseline CPI must be a positive number, got {0}")]
    InvalidCpi(f64),
}
