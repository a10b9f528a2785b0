//! Optimizing Brainfuck compiler middle-end.
//!
//! The crate is split in two halves mirroring the life of a program:
//!
//! - [`compiler`] - frontend (lexing, syntax validation), the intermediate
//!   representation and its control-flow graph, local analyses, the
//!   optimization passes and the driver that iterates them to a fixed point,
//!   plus the linearizer that turns the graph back into an executable
//!   instruction stream.
//! - [`runtime`] - the bytecode emulator that executes a linearized stream
//!   over a tape of wrapping byte cells.
//!
//! The compiler is a pure library: it takes source text and explicit program
//! values as arguments and holds no global state.

pub mod compiler;
pub mod runtime;
