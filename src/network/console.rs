//! ASCII text layered over machine channels.
//!
//! Text goes in as one code point per value, each line ending with a newline
//! (`10`). Output values in the ASCII range render as characters and anything
//! else renders as a decimal number, which is how programs report results that
//! do not fit in a character.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::vm::{Completion, Machine};
use std::fmt::Write;

/// Newline code point terminating every input line.
pub const NEWLINE: i64 = 10;

/// Encodes `text` as code points followed by a newline.
pub fn encode_line(text: &str) -> Vec<i64> {
    text.chars()
        .map(|c| c as i64)
        .chain(std::iter::once(NEWLINE))
        .collect()
}

/// Renders output values as text.
pub fn render(values: &[i64]) -> String {
    let mut text = String::with_capacity(values.len());
    for &value in values {
        match u8::try_from(value) {
            Ok(byte) if byte.is_ascii() => text.push(byte as char),
            _ => {
                let _ = write!(text, "{value}");
            }
        }
    }
    text
}

/// Text-mode driver of a single machine in suspending mode.
///
/// Input can be queued at any time; [`Console::advance`] runs the machine until it
/// wants more input and returns the text printed since the previous call.
#[derive(Debug)]
pub struct Console {
    machine: Machine,
}

impl Console {
    pub fn new(program: &Program) -> Self {
        Self {
            machine: Machine::new(program),
        }
    }

    /// Wraps an existing machine, e.g. one whose memory was patched.
    pub fn from_machine(machine: Machine) -> Self {
        Self { machine }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Returns `true` once the program halted.
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    /// Queues one line of input.
    pub fn send_line(&self, line: &str) {
        self.machine.extend_input(encode_line(line));
    }

    /// Queues every non-blank line of `script`, trimmed.
    ///
    /// Returns the number of lines queued.
    pub fn send_script(&self, script: &str) -> usize {
        let mut sent = 0;
        for line in script.lines().map(str::trim).filter(|l| !l.is_empty()) {
            self.send_line(line);
            sent += 1;
        }
        sent
    }

    /// Runs until the program halts or needs input.
    ///
    /// Returns why it stopped and everything printed since the previous call.
    pub fn advance(&mut self) -> Result<(Completion, String), VMError> {
        let completion = self.machine.run_until_input()?;
        Ok((completion, self.take_text()))
    }

    fn take_text(&self) -> String {
        render(&self.machine.drain_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reads a line and prints it back in upper case, until the line is empty.
    ///
    /// Lower case letters are shifted by -32; everything else is echoed as is.
    const SHOUT: &[i64] = &[
        3, 100, // 0: IN c
        1008, 100, 10, 101, // 2: EQ c, '\n'
        1005, 101, 36, // 6: JNZ -> newline
        1007, 100, 97, 102, // 9: LT c, 'a'
        1005, 102, 26, // 13: JNZ -> echo
        101, -32, 100, 100, // 16: c -= 32
        1105, 1, 26, // 20: JMP echo
        99, 99, 99, // 23: padding
        4, 100, // 26: OUT c
        1101, 0, 1, 103, // 28: seen = 1
        1105, 1, 0, // 32: JMP loop
        99, // 35: padding
        1006, 103, 48, // 36: JZ seen -> halt
        104, 10, // 39: OUT '\n'
        1101, 0, 0, 103, // 41: seen = 0
        1105, 1, 0, 99, // 45: JMP loop
    ];

    #[test]
    fn encode_appends_newline() {
        assert_eq!(encode_line("NOT A J"), vec![78, 79, 84, 32, 65, 32, 74, 10]);
        assert_eq!(encode_line(""), vec![10]);
    }

    #[test]
    fn render_text_and_numbers() {
        assert_eq!(render(&[72, 105, 10]), "Hi\n");
        assert_eq!(render(&[46, 19348304]), ".19348304");
        assert_eq!(render(&[127, 128, -5]), "\u{7f}128-5");
    }

    #[test]
    fn console_round_trip() {
        let mut console = Console::new(&Program::from(SHOUT));

        let (completion, text) = console.advance().unwrap();
        assert_eq!(completion, Completion::AwaitingInput);
        assert!(text.is_empty());

        console.send_line("walk");
        let (completion, text) = console.advance().unwrap();
        assert_eq!(completion, Completion::AwaitingInput);
        assert_eq!(text, "WALK\n");

        console.send_line("");
        let (completion, text) = console.advance().unwrap();
        assert_eq!(completion, Completion::Halted);
        assert!(text.is_empty());
        assert!(console.is_halted());
    }

    #[test]
    fn script_lines_are_trimmed_and_blank_lines_skipped() {
        let mut console = Console::new(&Program::from(SHOUT));
        let sent = console.send_script("  not a j \n\nwalk\n");
        assert_eq!(sent, 2);

        let (completion, text) = console.advance().unwrap();
        assert_eq!(completion, Completion::AwaitingInput);
        assert_eq!(text, "NOT A J\nWALK\n");
    }

    #[test]
    fn patched_machine_starts_in_another_mode() {
        // Prints 2 + 33 as is, or 2 * 33 once the add at address 0 becomes a mul
        let program = Program::from(&[1, 7, 8, 9, 4, 9, 99, 2, 33, 0][..]);
        let mut machine = Machine::new(&program);
        machine.patch(0, 2).unwrap();

        let mut console = Console::from_machine(machine);
        assert_eq!(console.advance().unwrap(), (Completion::Halted, "B".to_string()));

        let mut console = Console::new(&program);
        assert_eq!(console.advance().unwrap(), (Completion::Halted, "#".to_string()));
    }

    #[test]
    fn large_values_render_as_numbers() {
        let mut console = Console::new(&Program::from(&[104, 68, 104, 1125899906842624, 99][..]));
        let (completion, text) = console.advance().unwrap();
        assert_eq!(completion, Completion::Halted);
        assert_eq!(text, "D1125899906842624");
    }
}
