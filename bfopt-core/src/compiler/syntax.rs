//! Syntax validation
//!
//! The only way a Brainfuck program can be ill-formed is bracket mismatch.
//! Two validators are provided: a fast predicate that only counts open
//! loops, used as the gate before compilation, and a detailed scan that
//! collects every mismatch with its source location for reporting.

use crate::compiler::ir::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single bracket mismatch found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error: {} at {}", self.message, self.location)
    }
}

/// Fast well-formedness predicate: every `]` closes an open loop and no loop
/// stays open. All other characters are comments and cannot be invalid.
pub fn is_balanced(source: &str) -> bool {
    let mut opened_loops: usize = 0;
    for ch in source.chars() {
        match ch {
            '[' => opened_loops += 1,
            ']' => {
                if opened_loops == 0 {
                    return false;
                }
                opened_loops -= 1;
            }
            _ => {}
        }
    }
    opened_loops == 0
}

/// Detailed scan collecting every bracket mismatch. Returns the errors
/// sorted by source location; an empty vector means the source is valid.
pub fn validate(source: &str) -> Vec<SyntaxError> {
    let mut errors: Vec<SyntaxError> = Vec::new();
    let mut open_loops: Vec<SourceLocation> = Vec::new();

    let mut line: u32 = 1;
    let mut column: u32 = 0;
    for ch in source.chars() {
        column += 1;
        match ch {
            '\n' => {
                line += 1;
                column = 0;
            }
            '[' => open_loops.push(SourceLocation::new(line, column)),
            ']' => {
                if open_loops.pop().is_none() {
                    errors.push(SyntaxError {
                        message: "unexpected token ']', no loop currently opened".to_string(),
                        location: SourceLocation::new(line, column),
                    });
                }
            }
            _ => {}
        }
    }

    for location in open_loops {
        errors.push(SyntaxError {
            message: "unmatched token '[' without closing brace".to_string(),
            location,
        });
    }

    errors.sort_by_key(|error| (error.location.line, error.location.column));
    errors
}
