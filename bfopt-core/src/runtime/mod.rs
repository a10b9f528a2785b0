//! Bytecode execution runtime.

pub mod emulator;

pub use emulator::{
    Emulator, ExecutionOutcome, ExecutionStatus, DEFAULT_STEP_LIMIT, DEFAULT_TAPE_SIZE,
};
