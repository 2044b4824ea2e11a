//! Intcode virtual machine.
//!
//! Programs are flat lists of signed 64-bit integers that share one address
//! space for code and data, so a program may rewrite its own instructions.
//!
//! # Architecture
//!
//! - **Memory**: Auto-growing, zero-initialized store private to each machine
//! - **Registers**: Instruction pointer and relative base
//! - **Instruction format**: `modes * 100 + opcode`, followed by one cell per parameter
//! - **Parameter modes**: position (0), immediate (1) and relative (2)
//! - **I/O**: One input and one output [`Channel`](crate::network::channel::Channel)
//!   per machine; `IN` either waits or suspends when its channel is empty
//!
//! # Modules
//!
//! - [`errors`]: Parse and execution error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`operand`]: Instruction word decoding and parameter resolution
//! - [`program`]: Program text format
//! - [`vm`]: Core virtual machine implementation

pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod operand;
pub mod program;
pub mod vm;
