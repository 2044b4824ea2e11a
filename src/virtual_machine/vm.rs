//! Core virtual machine implementation.
//!
//! A [`Machine`] owns one [`Memory`], one register file and a pair of input/output
//! [`Channel`]s. It fetches the word at the instruction pointer, decodes it, reads
//! every operand and then executes the instruction. Arithmetic uses wrapping
//! semantics to prevent overflow panics.
//!
//! Two run modes share the same core:
//! - [`Machine::run`] waits on the input channel whenever `IN` finds it empty and only
//!   returns once the program halts.
//! - [`Machine::run_until_input`] returns [`Completion::AwaitingInput`] instead of
//!   waiting, leaving the instruction pointer on the `IN` instruction so it is retried
//!   on the next call.

mod memory;
mod registers;

pub use memory::Memory;
pub use registers::Registers;

use crate::debug;
use crate::network::channel::Channel;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::operand::{Decoded, Operand};
use crate::virtual_machine::program::Program;
use std::sync::Arc;

/// Completion code of a halted machine.
pub const HALT_CODE: i64 = 99;
/// Completion code of a machine suspended on an empty input channel.
pub const AWAITING_INPUT_CODE: i64 = -1;

/// Reason a run returned control to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// `HALT` was executed. The machine will not run again.
    Halted,
    /// `IN` found the input channel empty. Running again retries the same instruction.
    AwaitingInput,
}

impl Completion {
    /// Returns the numeric completion code.
    pub const fn code(&self) -> i64 {
        match self {
            Completion::Halted => HALT_CODE,
            Completion::AwaitingInput => AWAITING_INPUT_CODE,
        }
    }

    /// Returns `true` for [`Completion::Halted`].
    pub const fn is_halted(&self) -> bool {
        matches!(self, Completion::Halted)
    }
}

/// Effect of a single instruction on the control flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    /// Continue with the instruction that follows.
    Next,
    /// Continue at the given address.
    Jump(i64),
    /// Stop without moving the instruction pointer.
    Suspend,
    /// Stop for good.
    Halt,
}

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        decoded = $decoded:ident,
        instr = $instr:ident,
        { $( $variant:ident => $handler:ident ( $( $field:ident : $kind:ident ),* $(,)? ) ),* $(,)? }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => {
                    #[allow(unused_mut)]
                    let mut _parameter = 0usize;
                    $(
                        _parameter += 1;
                        let $field = exec_vm!(@read $vm, $decoded, _parameter, $kind)?;
                    )*
                    $vm.$handler($( $field ),*)
                }
            ),*
        }
    }};

    // Operand value (position, immediate or relative)
    (@read $vm:ident, $decoded:ident, $parameter:ident, Read) => {{
        $vm.read_parameter(&$decoded, $parameter)
    }};

    // Destination address (position or relative)
    (@read $vm:ident, $decoded:ident, $parameter:ident, Write) => {{
        $vm.target_parameter(&$decoded, $parameter)
    }};
}

/// Intcode virtual machine instance.
///
/// An instance is bound to a single program for its whole life: discard it and
/// create a new one to start a fresh run.
#[derive(Debug)]
pub struct Machine {
    /// Private copy of the program, grown on demand.
    memory: Memory,
    /// Instruction pointer and relative base.
    registers: Registers,
    /// Values consumed by `IN`.
    input: Arc<Channel>,
    /// Values produced by `OUT`.
    output: Arc<Channel>,
    /// Set once `HALT` executes.
    halted: bool,
    /// Number of instructions executed so far.
    steps: u64,
}

impl Machine {
    /// Creates a machine over a copy of `program` with fresh input and output channels.
    pub fn new(program: &Program) -> Self {
        Self::with_channels(program, Channel::new(), Channel::new())
    }

    /// Creates a machine over a copy of `program` bound to the given channels.
    pub fn with_channels(program: &Program, input: Arc<Channel>, output: Arc<Channel>) -> Self {
        Self {
            memory: Memory::new(program.cells()),
            registers: Registers::new(),
            input,
            output,
            halted: false,
            steps: 0,
        }
    }

    /// Returns the input channel.
    pub fn input(&self) -> &Arc<Channel> {
        &self.input
    }

    /// Returns the output channel.
    pub fn output(&self) -> &Arc<Channel> {
        &self.output
    }

    /// Queues a value on the input channel.
    pub fn push_input(&self, value: i64) {
        self.input.put(value);
    }

    /// Queues every value on the input channel, in order.
    pub fn extend_input(&self, values: impl IntoIterator<Item = i64>) {
        self.input.extend(values);
    }

    /// Removes and returns every value produced so far.
    pub fn drain_output(&self) -> Vec<i64> {
        self.output.drain()
    }

    /// Returns the machine memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Overwrites a memory cell, typically before the first run.
    pub fn patch(&mut self, address: i64, value: i64) -> Result<(), VMError> {
        self.memory.write(address, value)
    }

    /// Returns a copy of the register file.
    pub fn registers(&self) -> Registers {
        self.registers
    }

    /// Returns `true` once `HALT` has executed.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Returns the number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs until the program halts, waiting on the input channel whenever it is empty.
    ///
    /// A machine that never receives the input it waits for never returns; supplying
    /// input is the responsibility of whoever wired the channels.
    pub async fn run(&mut self) -> Result<Completion, VMError> {
        loop {
            match self.run_until_input()? {
                Completion::Halted => return Ok(Completion::Halted),
                Completion::AwaitingInput => self.input.ready().await,
            }
        }
    }

    /// Runs until the program halts or `IN` finds the input channel empty.
    pub fn run_until_input(&mut self) -> Result<Completion, VMError> {
        loop {
            if let Some(completion) = self.step()? {
                return Ok(completion);
            }
        }
    }

    /// Executes a single instruction.
    ///
    /// Returns `Some` when the machine stopped (halted or awaiting input) and `None`
    /// when it can keep going.
    pub fn step(&mut self) -> Result<Option<Completion>, VMError> {
        if self.halted {
            return Ok(Some(Completion::Halted));
        }

        let ip = self.registers.ip;
        let (instruction, flow) = self.exec().map_err(|err| err.at(ip))?;

        match flow {
            Flow::Next => self.registers.advance(instruction.width()),
            Flow::Jump(target) => self.registers.jump(target),
            Flow::Suspend => return Ok(Some(Completion::AwaitingInput)),
            Flow::Halt => {
                self.halted = true;
                self.steps += 1;
                debug!("machine halted at ip {} after {} steps", ip, self.steps);
                return Ok(Some(Completion::Halted));
            }
        }

        self.steps += 1;
        Ok(None)
    }

    /// Fetches, decodes and executes the instruction at the instruction pointer.
    fn exec(&mut self) -> Result<(Instruction, Flow), VMError> {
        let word = self.memory.read(self.registers.ip)?;
        let decoded = Decoded::new(word);
        let instruction = decoded.instruction()?;

        let flow = exec_vm! {
            vm = self,
            decoded = decoded,
            instr = instruction,
            {
                // Arithmetic
                Add => op_add(a: Read, b: Read, dst: Write),
                Mul => op_mul(a: Read, b: Read, dst: Write),
                // I/O
                Input => op_input(dst: Write),
                Output => op_output(src: Read),
                // Control Flow
                JumpIfTrue => op_jump_if_true(cond: Read, target: Read),
                JumpIfFalse => op_jump_if_false(cond: Read, target: Read),
                // Comparison
                LessThan => op_less_than(a: Read, b: Read, dst: Write),
                Equals => op_equals(a: Read, b: Read, dst: Write),
                // Registers
                AdjustRelativeBase => op_adjust_relative_base(offset: Read),
                Halt => op_halt(),
            }
        };

        Ok((instruction, flow?))
    }

    /// Returns the raw cell of the 1-based `parameter` of the current instruction.
    fn raw_parameter(&self, parameter: usize) -> Result<i64, VMError> {
        self.memory
            .read(self.registers.ip.wrapping_add(parameter as i64))
    }

    /// Resolves the 1-based `parameter` to the value it designates.
    fn read_parameter(&self, decoded: &Decoded, parameter: usize) -> Result<i64, VMError> {
        let raw = self.raw_parameter(parameter)?;
        match decoded.operand(parameter, raw, self.registers.relative_base)? {
            Operand::Address(address) => self.memory.read(address),
            Operand::Immediate(value) => Ok(value),
        }
    }

    /// Resolves the 1-based destination `parameter` to an address.
    fn target_parameter(&self, decoded: &Decoded, parameter: usize) -> Result<i64, VMError> {
        let raw = self.raw_parameter(parameter)?;
        decoded.target(parameter, raw, self.registers.relative_base)
    }

    fn op_add(&mut self, a: i64, b: i64, dst: i64) -> Result<Flow, VMError> {
        self.memory.write(dst, a.wrapping_add(b))?;
        Ok(Flow::Next)
    }

    fn op_mul(&mut self, a: i64, b: i64, dst: i64) -> Result<Flow, VMError> {
        self.memory.write(dst, a.wrapping_mul(b))?;
        Ok(Flow::Next)
    }

    fn op_input(&mut self, dst: i64) -> Result<Flow, VMError> {
        match self.input.try_take() {
            Some(value) => {
                self.memory.write(dst, value)?;
                Ok(Flow::Next)
            }
            None => Ok(Flow::Suspend),
        }
    }

    fn op_output(&mut self, src: i64) -> Result<Flow, VMError> {
        self.output.put(src);
        Ok(Flow::Next)
    }

    fn op_jump_if_true(&mut self, cond: i64, target: i64) -> Result<Flow, VMError> {
        Ok(if cond != 0 {
            Flow::Jump(target)
        } else {
            Flow::Next
        })
    }

    fn op_jump_if_false(&mut self, cond: i64, target: i64) -> Result<Flow, VMError> {
        Ok(if cond == 0 {
            Flow::Jump(target)
        } else {
            Flow::Next
        })
    }

    fn op_less_than(&mut self, a: i64, b: i64, dst: i64) -> Result<Flow, VMError> {
        self.memory.write(dst, (a < b) as i64)?;
        Ok(Flow::Next)
    }

    fn op_equals(&mut self, a: i64, b: i64, dst: i64) -> Result<Flow, VMError> {
        self.memory.write(dst, (a == b) as i64)?;
        Ok(Flow::Next)
    }

    fn op_adjust_relative_base(&mut self, offset: i64) -> Result<Flow, VMError> {
        self.registers.shift_base(offset);
        Ok(Flow::Next)
    }

    fn op_halt(&mut self) -> Result<Flow, VMError> {
        Ok(Flow::Halt)
    }
}
