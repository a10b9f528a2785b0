//! Compiler error types
//!
//! The core distinguishes exactly one recoverable condition: source text that
//! fails bracket validation. Everything else - a broken graph invariant, an
//! impossible opcode in a state machine, a pass handing back a malformed
//! program - is a programming contract violation and aborts with a
//! diagnostic instead of surfacing as an error value.

use crate::compiler::syntax::SyntaxError;
use thiserror::Error;

/// Errors reported by the compiler frontend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The source text is not a well-formed program.
    ///
    /// Carries every syntax error found, sorted by source location.
    #[error("found {} syntax error{}", errors.len(), if errors.len() == 1 { "" } else { "s" })]
    Syntax { errors: Vec<SyntaxError> },
}
