//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the Intcode instruction set. The [`for_each_instruction!`](crate::for_each_instruction)
//! macro holds the canonical instruction definitions and invokes a callback macro for
//! code generation, so the opcode table, the dispatcher in [`vm`](super::vm) and the
//! static table check all read from a single list.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<i64>` for decoding opcodes
//! - Mnemonics, parameter counts and instruction widths
//!
//! # Instruction Format
//!
//! Instructions are variable-length runs of memory cells:
//! - Word: `modes * 100 + opcode`, the opcode being the two least significant digits
//! - Parameters: one cell each, following the word
//! - `Read` parameters yield a value (position, immediate or relative mode)
//! - `Write` parameters yield a destination address (position or relative mode only)

use crate::virtual_machine::errors::VMError;

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Arithmetic
            // =========================
            /// ADD a, b, dst ; dst = a + b
            Add = 1, "ADD" => [a: Read, b: Read, dst: Write],
            /// MUL a, b, dst ; dst = a * b
            Mul = 2, "MUL" => [a: Read, b: Read, dst: Write],
            // =========================
            // I/O
            // =========================
            /// IN dst ; dst = next input value (suspends when none is available)
            Input = 3, "IN" => [dst: Write],
            /// OUT src ; emit src on the output channel
            Output = 4, "OUT" => [src: Read],
            // =========================
            // Control Flow
            // =========================
            /// JNZ cond, target ; if cond != 0 then IP = target
            JumpIfTrue = 5, "JNZ" => [cond: Read, target: Read],
            /// JZ cond, target ; if cond == 0 then IP = target
            JumpIfFalse = 6, "JZ" => [cond: Read, target: Read],
            // =========================
            // Comparison
            // =========================
            /// LT a, b, dst ; dst = (a < b)
            LessThan = 7, "LT" => [a: Read, b: Read, dst: Write],
            /// EQ a, b, dst ; dst = (a == b)
            Equals = 8, "EQ" => [a: Read, b: Read, dst: Write],
            // =========================
            // Registers
            // =========================
            /// ARB offset ; relative base += offset
            AdjustRelativeBase = 9, "ARB" => [offset: Read],
            /// HALT ; stop execution
            Halt = 99, "HALT" => [],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        // =========================
        // VM instruction enum
        // =========================
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<i64> for Instruction {
            type Error = VMError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VMError::InvalidInstruction {
                        opcode: value,
                        ip: 0,
                    }),
                }
            }
        }

        impl Instruction {
            /// Every instruction of the set, in opcode order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Returns the opcode of this instruction.
            pub const fn opcode(&self) -> i64 {
                *self as i64
            }

            /// Returns the mnemonic used in logs and error messages.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns the number of parameters following the instruction word.
            pub const fn arity(&self) -> usize {
                match self {
                    $( Instruction::$name => define_instructions!(@count $( $field )*), )*
                }
            }

            /// Returns the 1-based index of the destination parameter, if any.
            pub const fn write_parameter(&self) -> Option<usize> {
                match self {
                    $( Instruction::$name => define_instructions!(@write 1usize; $( $kind )*), )*
                }
            }
        }
    };

    // ---------- parameter counting ----------
    (@count) => { 0usize };
    (@count $head:ident $( $tail:ident )*) => { 1usize + define_instructions!(@count $( $tail )*) };

    // ---------- destination lookup ----------
    (@write $index:expr;) => { None };
    (@write $index:expr; Write $( $tail:ident )*) => { Some($index) };
    (@write $index:expr; Read $( $tail:ident )*) => {
        define_instructions!(@write $index + 1; $( $tail )*)
    };
}

for_each_instruction!(define_instructions);

impl Instruction {
    /// Returns the number of memory cells the instruction occupies.
    pub const fn width(&self) -> i64 {
        1 + self.arity() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_try_from_invalid() {
        assert!(matches!(
            Instruction::try_from(42),
            Err(VMError::InvalidInstruction { opcode: 42, .. })
        ));
        assert!(Instruction::try_from(0).is_err());
        assert!(Instruction::try_from(-1).is_err());
    }

    #[test]
    fn instruction_try_from_valid() {
        for instr in Instruction::ALL {
            assert_eq!(Instruction::try_from(instr.opcode()).unwrap(), *instr);
        }
    }

    #[test]
    fn widths_match_opcode_table() {
        assert_eq!(Instruction::Add.width(), 4);
        assert_eq!(Instruction::Mul.width(), 4);
        assert_eq!(Instruction::Input.width(), 2);
        assert_eq!(Instruction::Output.width(), 2);
        assert_eq!(Instruction::JumpIfTrue.width(), 3);
        assert_eq!(Instruction::JumpIfFalse.width(), 3);
        assert_eq!(Instruction::LessThan.width(), 4);
        assert_eq!(Instruction::Equals.width(), 4);
        assert_eq!(Instruction::AdjustRelativeBase.width(), 2);
        assert_eq!(Instruction::Halt.width(), 1);
    }

    #[test]
    fn write_parameters() {
        assert_eq!(Instruction::Add.write_parameter(), Some(3));
        assert_eq!(Instruction::Input.write_parameter(), Some(1));
        assert_eq!(Instruction::Output.write_parameter(), None);
        assert_eq!(Instruction::JumpIfFalse.write_parameter(), None);
        assert_eq!(Instruction::Halt.write_parameter(), None);
    }
}
