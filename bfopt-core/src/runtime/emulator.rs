//! Bytecode emulator
//!
//! Executes a linearized instruction stream over a fixed-size tape of
//! wrapping byte cells. The cell pointer wraps around the tape ends, cell
//! arithmetic wraps modulo 256, and a `read` at end of input leaves the
//! cell untouched. Programs that provably spin (`infinite`, or a `search`
//! over a zero-free tape) stop with a diagnostic status, and a step budget
//! bounds everything else, so divergent programs cannot hang the caller.

use crate::compiler::ir::{Instruction, OpCode};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Tape size of the classic machine.
pub const DEFAULT_TAPE_SIZE: usize = 30_000;

/// Default step budget before execution is cut off.
pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

/// Why execution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// `program_exit` was reached
    Finished,
    /// An `infinite` instruction tripped, or a `search` found no zero cell
    InfiniteLoop,
    /// The step budget ran out
    StepLimit,
    /// A `breakpoint` instruction stopped the execution cycle
    Breakpoint,
}

/// Result of one emulator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    /// Instructions executed
    pub steps: u64,
    /// Value of the cell under the pointer when execution stopped
    pub final_cell: u8,
    /// Cell pointer position when execution stopped
    pub pointer: usize,
}

/// The bytecode interpreter.
pub struct Emulator {
    code: Vec<Instruction>,
    memory: Vec<u8>,
    pointer: usize,
    program_counter: usize,
    step_limit: u64,
}

impl Emulator {
    pub fn new(code: Vec<Instruction>) -> Self {
        Self::with_tape_size(code, DEFAULT_TAPE_SIZE)
    }

    pub fn with_tape_size(code: Vec<Instruction>, tape_size: usize) -> Self {
        assert!(tape_size > 0, "the tape needs at least one cell");
        Self {
            code,
            memory: vec![0u8; tape_size],
            pointer: 0,
            program_counter: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn set_step_limit(&mut self, step_limit: u64) {
        self.step_limit = step_limit;
    }

    /// Reset tape, pointer and program counter for a fresh run.
    pub fn reset(&mut self) {
        self.memory.fill(0);
        self.pointer = 0;
        self.program_counter = 0;
    }

    /// Execute the flashed program against the given streams.
    ///
    /// # Errors
    /// Only stream failures surface as errors; everything the program
    /// itself does is captured in the returned outcome.
    pub fn run<R: Read, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<ExecutionOutcome> {
        self.reset();
        let mut steps: u64 = 0;

        while self.program_counter < self.code.len() {
            if steps >= self.step_limit {
                return Ok(self.outcome(ExecutionStatus::StepLimit, steps));
            }
            steps += 1;

            let inst = self.code[self.program_counter];
            self.program_counter += 1;

            match inst.opcode {
                OpCode::Nop | OpCode::ProgramEntry => {}
                OpCode::ProgramExit => {
                    return Ok(self.outcome(ExecutionStatus::Finished, steps));
                }
                OpCode::Inc => {
                    self.memory[self.pointer] =
                        self.memory[self.pointer].wrapping_add(inst.argument as u8);
                }
                OpCode::Right => self.shift(inst.argument),
                OpCode::Branch => {
                    self.program_counter = Self::destination(&inst, self.code.len());
                }
                OpCode::BranchNz => {
                    if self.memory[self.pointer] != 0 {
                        self.program_counter = Self::destination(&inst, self.code.len());
                    }
                }
                OpCode::Read => self.read_cell(input)?,
                OpCode::Write => output.write_all(&[self.memory[self.pointer]])?,
                OpCode::SearchLeft => {
                    if !self.search(-inst.argument) {
                        return Ok(self.outcome(ExecutionStatus::InfiniteLoop, steps));
                    }
                }
                OpCode::SearchRight => {
                    if !self.search(inst.argument) {
                        return Ok(self.outcome(ExecutionStatus::InfiniteLoop, steps));
                    }
                }
                OpCode::LoadConst => {
                    self.memory[self.pointer] = inst.argument as u8;
                }
                OpCode::Infinite => {
                    let cell = self.memory[self.pointer];
                    let spins = if inst.loops_on_not_zero() {
                        cell != 0
                    } else {
                        cell == 0
                    };
                    if spins {
                        return Ok(self.outcome(ExecutionStatus::InfiniteLoop, steps));
                    }
                }
                OpCode::Breakpoint => {
                    return Ok(self.outcome(ExecutionStatus::Breakpoint, steps));
                }
            }
        }

        // Running off the end only happens for streams without an exit
        // marker; treat it as normal completion.
        Ok(self.outcome(ExecutionStatus::Finished, steps))
    }

    fn outcome(&self, status: ExecutionStatus, steps: u64) -> ExecutionOutcome {
        ExecutionOutcome {
            status,
            steps,
            final_cell: self.memory[self.pointer],
            pointer: self.pointer,
        }
    }

    fn destination(inst: &Instruction, code_len: usize) -> usize {
        assert!(
            inst.argument >= 0 && (inst.argument as usize) < code_len,
            "branch destination {} outside the program",
            inst.argument
        );
        inst.argument as usize
    }

    /// Move the pointer, wrapping around the tape ends.
    fn shift(&mut self, delta: i64) {
        let len = self.memory.len() as i64;
        self.pointer = (self.pointer as i64 + delta).rem_euclid(len) as usize;
    }

    /// Scan by `stride` until a zero cell. False when a full tape revolution
    /// found none; the scan would never stop.
    fn search(&mut self, stride: i64) -> bool {
        let mut hops = 0usize;
        while self.memory[self.pointer] != 0 {
            if hops > self.memory.len() {
                return false;
            }
            self.shift(stride);
            hops += 1;
        }
        true
    }

    /// One byte from the input stream; end of input leaves the cell alone.
    fn read_cell<R: Read>(&mut self, input: &mut R) -> Result<()> {
        let mut buffer = [0u8; 1];
        if input.read(&mut buffer)? != 0 {
            self.memory[self.pointer] = buffer[0];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::cfg::compile;
    use crate::compiler::linearize::linearize;

    fn run_source(source: &str, input: &[u8]) -> (ExecutionOutcome, Vec<u8>) {
        let program = compile(source).unwrap();
        let mut emulator = Emulator::new(linearize(&program));
        let mut reader = input;
        let mut output: Vec<u8> = Vec::new();
        let outcome = emulator.run(&mut reader, &mut output).unwrap();
        (outcome, output)
    }

    #[test]
    fn test_arithmetic_and_output() {
        let (outcome, output) = run_source("+++.", &[]);
        assert_eq!(outcome.status, ExecutionStatus::Finished);
        assert_eq!(output, vec![3]);
        assert_eq!(outcome.final_cell, 3);
    }

    #[test]
    fn test_cell_arithmetic_wraps() {
        let (outcome, _) = run_source("-", &[]);
        assert_eq!(outcome.final_cell, 255);
    }

    #[test]
    fn test_pointer_wraps_around_the_tape() {
        let program = compile("<+").unwrap();
        let mut emulator = Emulator::with_tape_size(linearize(&program), 16);
        let mut input: &[u8] = &[];
        let outcome = emulator.run(&mut input, &mut Vec::new()).unwrap();
        assert_eq!(outcome.pointer, 15);
        assert_eq!(outcome.final_cell, 1);
    }

    #[test]
    fn test_loops_execute() {
        // Multiply: 3 * 2 into the second cell.
        let (outcome, output) = run_source("+++[>++<-]>.", &[]);
        assert_eq!(outcome.status, ExecutionStatus::Finished);
        assert_eq!(output, vec![6]);
    }

    #[test]
    fn test_read_copies_input_and_eof_leaves_cell() {
        let (_, output) = run_source(",.,.", b"AB");
        assert_eq!(output, b"AB");

        // Second read hits end of input; the cell keeps the first byte.
        let (_, output) = run_source(",.,.", b"A");
        assert_eq!(output, b"AA");
    }

    #[test]
    fn test_empty_loop_hits_the_step_limit() {
        let program = compile("+[]").unwrap();
        let mut emulator = Emulator::new(linearize(&program));
        emulator.set_step_limit(1_000);
        let mut input: &[u8] = &[];
        let outcome = emulator.run(&mut input, &mut Vec::new()).unwrap();
        assert_eq!(outcome.status, ExecutionStatus::StepLimit);
    }

    #[test]
    fn test_infinite_instruction_is_diagnosed() {
        use crate::compiler::ir::{Instruction, OpCode, SourceLocation};
        let location = SourceLocation::new(1, 1);
        let code = vec![
            Instruction::new(OpCode::ProgramEntry, 0, location),
            Instruction::new(OpCode::Inc, 1, location),
            Instruction::new(OpCode::Infinite, 1, location),
            Instruction::new(OpCode::ProgramExit, 0, location),
        ];
        let mut emulator = Emulator::new(code);
        let mut input: &[u8] = &[];
        let outcome = emulator.run(&mut input, &mut Vec::new()).unwrap();
        assert_eq!(outcome.status, ExecutionStatus::InfiniteLoop);
    }

    #[test]
    fn test_search_finds_the_next_zero() {
        use crate::compiler::ir::{Instruction, OpCode, SourceLocation};
        let location = SourceLocation::new(1, 1);
        // Set cells 0..2 non-zero, return to 0, search right by 1.
        let code = vec![
            Instruction::new(OpCode::ProgramEntry, 0, location),
            Instruction::new(OpCode::Inc, 1, location),
            Instruction::new(OpCode::Right, 1, location),
            Instruction::new(OpCode::Inc, 1, location),
            Instruction::new(OpCode::Right, 1, location),
            Instruction::new(OpCode::Inc, 1, location),
            Instruction::new(OpCode::Right, -2, location),
            Instruction::new(OpCode::SearchRight, 1, location),
            Instruction::new(OpCode::ProgramExit, 0, location),
        ];
        let mut emulator = Emulator::new(code);
        let mut input: &[u8] = &[];
        let outcome = emulator.run(&mut input, &mut Vec::new()).unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Finished);
        assert_eq!(outcome.pointer, 3);
        assert_eq!(outcome.final_cell, 0);
    }

    #[test]
    fn test_breakpoint_stops_the_cycle() {
        use crate::compiler::ir::{Instruction, OpCode, SourceLocation};
        let location = SourceLocation::new(1, 1);
        let code = vec![
            Instruction::new(OpCode::ProgramEntry, 0, location),
            Instruction::new(OpCode::Breakpoint, 0, location),
            Instruction::new(OpCode::ProgramExit, 0, location),
        ];
        let mut emulator = Emulator::new(code);
        let mut input: &[u8] = &[];
        let outcome = emulator.run(&mut input, &mut Vec::new()).unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Breakpoint);
    }
}
