/// Register file of an Intcode machine.
///
/// Both registers start at zero. The relative base only changes through
/// the `ARB` instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    /// Address of the next instruction word.
    pub ip: i64,
    /// Base address added to relative-mode parameters.
    pub relative_base: i64,
}

impl Registers {
    /// Creates a zeroed register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the instruction pointer forward by `width` cells.
    pub(super) fn advance(&mut self, width: i64) {
        self.ip = self.ip.wrapping_add(width);
    }

    /// Sets the instruction pointer to `target`.
    pub(super) fn jump(&mut self, target: i64) {
        self.ip = target;
    }

    /// Adds `offset` to the relative base.
    pub(super) fn shift_base(&mut self, offset: i64) {
        self.relative_base = self.relative_base.wrapping_add(offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let regs = Registers::new();
        assert_eq!(regs.ip, 0);
        assert_eq!(regs.relative_base, 0);
    }

    #[test]
    fn advance_jump_and_shift() {
        let mut regs = Registers::new();
        regs.advance(4);
        assert_eq!(regs.ip, 4);
        regs.jump(17);
        assert_eq!(regs.ip, 17);
        regs.shift_base(-5);
        regs.shift_base(2);
        assert_eq!(regs.relative_base, -3);
    }
}
