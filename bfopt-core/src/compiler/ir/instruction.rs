//! IR Instructions
//!
//! A single fixed-size record per instruction: an opcode tag, a signed
//! argument and the source location the instruction came from. Decrement and
//! left-shift have no opcodes of their own; they are `inc` / `right` with a
//! negative argument, so every predicate and every fold works on one signed
//! quantity.
//!
//! # Memory Optimizations
//! - `OpCode` uses `#[repr(u8)]` to keep the tag to a single byte
//! - `Instruction` is `Copy`; analyses store indices into a block's
//!   instruction vector instead of holding references into it

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation codes recognized by the compiler and the emulator.
///
/// The `search_*`, `load_const` and `infinite` entries are pseudo
/// instructions produced only by the optimizer; the frontend never emits
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)] // Single-byte tag
pub enum OpCode {
    /// No operation; only skips an execution cycle
    Nop = 0,
    /// Add the argument to the cell under the pointer (wrapping)
    Inc = 1,
    /// Shift the cell pointer by the argument (wraps around the tape)
    Right = 2,
    /// Unconditional branch; the destination is the owning block's jump successor
    Branch = 3,
    /// Branch iff the cell under the pointer is non-zero
    BranchNz = 4,
    /// Read one byte from the input stream
    Read = 5,
    /// Write one byte to the output stream
    Write = 6,
    /// Scan towards lower addresses by the argument stride until a zero cell
    SearchLeft = 7,
    /// Scan towards higher addresses by the argument stride until a zero cell
    SearchRight = 8,
    /// Store the argument literal into the cell under the pointer
    LoadConst = 9,
    /// Provably infinite loop; argument 1 loops while the cell is non-zero,
    /// argument 0 loops while it is zero
    Infinite = 10,
    /// Stop the execution cycle immediately
    Breakpoint = 11,
    /// Formal first instruction of every program
    ProgramEntry = 12,
    /// Formal last instruction of every program
    ProgramExit = 13,
}

impl OpCode {
    /// Mnemonic used by the CFG dumper and the disassembly listing.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::Inc => "inc",
            OpCode::Right => "right",
            OpCode::Branch => "branch",
            OpCode::BranchNz => "branch_nz",
            OpCode::Read => "read",
            OpCode::Write => "write",
            OpCode::SearchLeft => "search_left",
            OpCode::SearchRight => "search_right",
            OpCode::LoadConst => "load_const",
            OpCode::Infinite => "infinite",
            OpCode::Breakpoint => "breakpoint",
            OpCode::ProgramEntry => "program_entry",
            OpCode::ProgramExit => "program_exit",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Position within the original source text, `(line, column)`, both 1-based.
/// Column 0 is reserved for the synthetic entry instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.line, self.column)
    }
}

/// A single IR instruction.
///
/// Argument invariants per opcode:
/// - `inc`, `right`: non-zero signed delta
/// - `load_const`: the literal to store, canonicalized to `0..256`
/// - `search_left`, `search_right`: positive stride
/// - `infinite`: 1 loops on non-zero, 0 loops on zero
/// - `branch`, `branch_nz`: zero while the instruction lives in a block (the
///   destination is structural); an absolute instruction index in a
///   linearized stream
/// - everything else: zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: OpCode,
    pub argument: i64,
    pub location: SourceLocation,
}

impl Instruction {
    pub fn new(opcode: OpCode, argument: i64, location: SourceLocation) -> Self {
        Self {
            opcode,
            argument,
            location,
        }
    }

    /// True iff the instruction modifies the cell value arithmetically.
    #[inline]
    pub fn is_arithmetic(&self) -> bool {
        self.opcode == OpCode::Inc
    }

    /// True iff the instruction moves the cell pointer by a fixed delta.
    #[inline]
    pub fn is_shift(&self) -> bool {
        self.opcode == OpCode::Right
    }

    /// True iff the instruction denotes an (un)conditional jump.
    #[inline]
    pub fn is_jump(&self) -> bool {
        matches!(self.opcode, OpCode::Branch | OpCode::BranchNz)
    }

    /// True iff the instruction performs input or output.
    #[inline]
    pub fn is_io(&self) -> bool {
        matches!(self.opcode, OpCode::Read | OpCode::Write)
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.opcode == OpCode::LoadConst
    }

    #[inline]
    pub fn is_nop(&self) -> bool {
        self.opcode == OpCode::Nop
    }

    #[inline]
    pub fn is_infinite(&self) -> bool {
        self.opcode == OpCode::Infinite
    }

    #[inline]
    pub fn is_search(&self) -> bool {
        matches!(self.opcode, OpCode::SearchLeft | OpCode::SearchRight)
    }

    /// True iff an `infinite` instruction spins while the cell is non-zero.
    #[inline]
    pub fn loops_on_not_zero(&self) -> bool {
        debug_assert_eq!(self.opcode, OpCode::Infinite);
        self.argument != 0
    }

    /// True iff an `infinite` instruction spins while the cell is zero.
    #[inline]
    pub fn loops_on_zero(&self) -> bool {
        debug_assert_eq!(self.opcode, OpCode::Infinite);
        self.argument == 0
    }

    /// Degrade the instruction to a `nop`, keeping its source location.
    pub fn make_nop(&mut self) {
        self.opcode = OpCode::Nop;
        self.argument = 0;
    }

    /// Rewrite the instruction into an `infinite` that spins on non-zero.
    pub fn make_infinite_on_not_zero(&mut self) {
        self.opcode = OpCode::Infinite;
        self.argument = 1;
    }

    /// Rewrite the instruction into a search with the direction taken from
    /// the sign of `stride` and the magnitude as the step.
    pub fn make_search(&mut self, stride: i64) {
        assert_ne!(stride, 0, "search stride must be non-zero");
        self.opcode = if stride < 0 {
            OpCode::SearchLeft
        } else {
            OpCode::SearchRight
        };
        self.argument = stride.abs();
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:<12} {}",
            self.location, self.opcode, self.argument
        )
    }
}
