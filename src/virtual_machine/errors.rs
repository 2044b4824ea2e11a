use thiserror::Error;

/// Errors that can occur while loading or executing an Intcode program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VMError {
    /// A token in the program text is not a signed decimal integer.
    #[error("invalid token {token:?} at index {index}")]
    InvalidToken { index: usize, token: String },
    /// The program text contains no integers.
    #[error("program is empty")]
    EmptyProgram,
    /// Unknown opcode encountered at the instruction pointer.
    #[error("invalid instruction: opcode {opcode} at ip {ip}")]
    InvalidInstruction { opcode: i64, ip: i64 },
    /// A parameter mode digit other than 0, 1 or 2.
    #[error("invalid parameter mode {mode} for parameter {parameter} at ip {ip}")]
    InvalidParameterMode { mode: i64, parameter: usize, ip: i64 },
    /// A destination parameter decoded in immediate mode.
    #[error("parameter {parameter} of the instruction at ip {ip} writes in immediate mode")]
    ImmediateWrite { parameter: usize, ip: i64 },
    /// Memory access at a negative address.
    #[error("invalid memory address {address} at ip {ip}")]
    InvalidAddress { address: i64, ip: i64 },
    /// Growing memory up to the written address failed.
    #[error("cannot grow memory to address {address} at ip {ip}")]
    OutOfMemory { address: i64, ip: i64 },
    /// File I/O error while loading a program.
    #[error("io error: {0}")]
    Io(String),
}

impl VMError {
    /// Attaches the instruction pointer to errors raised below the execution core
    /// (memory, decoder), which report `ip: 0` because they do not track it.
    pub(crate) fn at(self, at_ip: i64) -> Self {
        match self {
            VMError::InvalidInstruction { opcode, .. } => {
                VMError::InvalidInstruction { opcode, ip: at_ip }
            }
            VMError::InvalidParameterMode {
                mode, parameter, ..
            } => VMError::InvalidParameterMode {
                mode,
                parameter,
                ip: at_ip,
            },
            VMError::ImmediateWrite { parameter, .. } => VMError::ImmediateWrite {
                parameter,
                ip: at_ip,
            },
            VMError::InvalidAddress { address, .. } => VMError::InvalidAddress { address, ip: at_ip },
            VMError::OutOfMemory { address, .. } => VMError::OutOfMemory { address, ip: at_ip },
            other => other,
        }
    }
}

impl From<std::io::Error> for VMError {
    fn from(err: std::io::Error) -> Self {
        VMError::Io(err.to_string())
    }
}
