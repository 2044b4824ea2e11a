//! Intcode program representation and text format.
//!
//! A program is stored as a single line (or whitespace-trimmed block) of
//! comma-separated signed decimal integers, with no header or length prefix.
//! [`Program`] is immutable; every machine works on its own copy.

use crate::virtual_machine::errors::VMError;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Parsed Intcode program. Index 0 is the entry point.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    cells: Vec<i64>,
}

impl Program {
    /// Creates a program from its cells.
    pub fn new(cells: Vec<i64>) -> Self {
        Self { cells }
    }

    /// Parses comma-separated program text.
    ///
    /// Whitespace around the block and around each token is ignored. Any token that
    /// is not a signed 64-bit decimal integer is rejected with its index.
    pub fn parse(text: &str) -> Result<Self, VMError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VMError::EmptyProgram);
        }

        let cells = text
            .split(',')
            .enumerate()
            .map(|(index, token)| {
                let token = token.trim();
                token.parse::<i64>().map_err(|_| VMError::InvalidToken {
                    index,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { cells })
    }

    /// Reads and parses a program file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VMError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Returns the program cells.
    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the program has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromStr for Program {
    type Err = VMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Vec<i64>> for Program {
    fn from(cells: Vec<i64>) -> Self {
        Self::new(cells)
    }
}

impl From<&[i64]> for Program {
    fn from(cells: &[i64]) -> Self {
        Self::new(cells.to_vec())
    }
}

/// Formats the program back into its comma-separated text form.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{cell}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_simple_program() {
        let program = Program::parse("1,9,10,3,2,3,11,0,99,30,40,50").unwrap();
        assert_eq!(program.len(), 12);
        assert_eq!(program.cells()[0], 1);
        assert_eq!(program.cells()[11], 50);
    }

    #[test]
    fn parse_trims_whitespace_and_newlines() {
        let program = Program::parse("  3, -9 ,\n99\n\n").unwrap();
        assert_eq!(program.cells(), &[3, -9, 99]);
    }

    #[test]
    fn parse_large_values() {
        let program = Program::parse("104,1125899906842624,99").unwrap();
        assert_eq!(program.cells()[1], 1_125_899_906_842_624);
    }

    #[test]
    fn parse_rejects_non_integer_token() {
        let err = Program::parse("1,2,x,4").unwrap_err();
        assert_eq!(
            err,
            VMError::InvalidToken {
                index: 2,
                token: "x".to_string()
            }
        );
    }

    #[test]
    fn parse_rejects_empty_token() {
        assert!(matches!(
            Program::parse("1,,2"),
            Err(VMError::InvalidToken { index: 1, .. })
        ));
        assert!(matches!(
            Program::parse("1,2,"),
            Err(VMError::InvalidToken { index: 2, .. })
        ));
    }

    #[test]
    fn parse_rejects_floats_and_overflow() {
        assert!(Program::parse("1.5").is_err());
        assert!(Program::parse("99999999999999999999").is_err());
    }

    #[test]
    fn parse_rejects_empty_text() {
        assert_eq!(Program::parse("   \n").unwrap_err(), VMError::EmptyProgram);
    }

    #[test]
    fn display_round_trips_text() {
        let text = "109,1,204,-1,99";
        let program: Program = text.parse().unwrap();
        assert_eq!(program.to_string(), text);
    }

    #[test]
    fn from_file_reads_program() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1,0,0,0,99").unwrap();

        let program = Program::from_file(file.path()).unwrap();
        assert_eq!(program.cells(), &[1, 0, 0, 0, 99]);
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Program::from_file(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, VMError::Io(_)));
    }
}
