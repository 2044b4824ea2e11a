//! Instruction word decoding.
//!
//! An instruction word packs the opcode in its two least significant decimal digits
//! and one addressing mode per parameter in the digits above it, parameter 1 first.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;

/// Addressing mode of a single parameter.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterMode {
    /// The parameter is the address of the operand.
    Position = 0,
    /// The parameter is the operand itself.
    Immediate = 1,
    /// The parameter is an offset from the relative base.
    Relative = 2,
}

impl TryFrom<i64> for ParameterMode {
    type Error = VMError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Position),
            1 => Ok(Self::Immediate),
            2 => Ok(Self::Relative),
            _ => Err(VMError::InvalidParameterMode {
                mode: value,
                parameter: 0,
                ip: 0,
            }),
        }
    }
}

/// A decoded parameter, ready to be read from or written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    /// Effective memory address (position and relative modes).
    Address(i64),
    /// Literal value (immediate mode).
    Immediate(i64),
}

/// Maximum number of parameters any instruction takes.
pub const MAX_PARAMETERS: usize = 3;

/// Opcode and parameter modes extracted from a raw instruction word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// Raw opcode, `word % 100`.
    pub opcode: i64,
    /// Raw mode digits for parameters 1 to 3.
    modes: [i64; MAX_PARAMETERS],
}

impl Decoded {
    /// Splits a raw instruction word into opcode and mode digits.
    ///
    /// Mode digits are validated lazily by [`Decoded::mode`], so an instruction with
    /// fewer parameters may carry arbitrary digits in its unused positions.
    pub fn new(word: i64) -> Self {
        let mut modes = [0; MAX_PARAMETERS];
        let mut rest = word / 100;
        for mode in modes.iter_mut() {
            *mode = rest % 10;
            rest /= 10;
        }
        Self {
            opcode: word % 100,
            modes,
        }
    }

    /// Resolves the opcode against the instruction set.
    pub fn instruction(&self) -> Result<Instruction, VMError> {
        Instruction::try_from(self.opcode)
    }

    /// Returns the addressing mode of the 1-based `parameter`.
    pub fn mode(&self, parameter: usize) -> Result<ParameterMode, VMError> {
        let digit = self.modes[parameter - 1];
        ParameterMode::try_from(digit).map_err(|_| VMError::InvalidParameterMode {
            mode: digit,
            parameter,
            ip: 0,
        })
    }

    /// Decodes the 1-based `parameter` of the instruction at `ip`.
    ///
    /// `raw` is the parameter cell itself (`memory[ip + parameter]`).
    pub fn operand(&self, parameter: usize, raw: i64, relative_base: i64) -> Result<Operand, VMError> {
        Ok(match self.mode(parameter)? {
            ParameterMode::Position => Operand::Address(raw),
            ParameterMode::Immediate => Operand::Immediate(raw),
            ParameterMode::Relative => Operand::Address(relative_base.wrapping_add(raw)),
        })
    }

    /// Decodes a destination parameter, which must resolve to an address.
    pub fn target(&self, parameter: usize, raw: i64, relative_base: i64) -> Result<i64, VMError> {
        match self.operand(parameter, raw, relative_base)? {
            Operand::Address(address) => Ok(address),
            Operand::Immediate(_) => Err(VMError::ImmediateWrite { parameter, ip: 0 }),
        }
    }
}
