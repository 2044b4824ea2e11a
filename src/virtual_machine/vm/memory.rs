use crate::virtual_machine::errors::VMError;

/// Auto-growing memory of an Intcode machine.
///
/// Every address that was never written reads as zero. Reads past the end of the
/// store do not allocate; writes past the end grow the store, zero-filling the gap.
/// The store never shrinks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memory {
    cells: Vec<i64>,
}

impl Memory {
    /// Creates a memory initialized with a copy of the given program cells.
    pub fn new(cells: &[i64]) -> Self {
        Self {
            cells: cells.to_vec(),
        }
    }

    /// Returns the value stored at `address`, or zero past the current extent.
    ///
    /// Returns [`VMError::InvalidAddress`] if `address` is negative.
    pub fn read(&self, address: i64) -> Result<i64, VMError> {
        let index = Self::index(address)?;
        Ok(self.cells.get(index).copied().unwrap_or(0))
    }

    /// Stores `value` at `address`, growing the store if needed.
    ///
    /// Returns [`VMError::InvalidAddress`] if `address` is negative and
    /// [`VMError::OutOfMemory`] if the store cannot grow that far.
    pub fn write(&mut self, address: i64, value: i64) -> Result<(), VMError> {
        let index = Self::index(address)?;
        let len = self.cells.len();
        if index >= len {
            self.cells
                .try_reserve(index + 1 - len)
                .map_err(|_| VMError::OutOfMemory { address, ip: 0 })?;
            self.cells.resize(index + 1, 0);
        }
        self.cells[index] = value;
        Ok(())
    }

    /// Returns the number of cells currently backed by storage.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if no cell is backed by storage.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the backed cells.
    pub fn as_slice(&self) -> &[i64] {
        &self.cells
    }

    /// Returns a copy of the backed cells.
    pub fn snapshot(&self) -> Vec<i64> {
        self.cells.clone()
    }

    fn index(address: i64) -> Result<usize, VMError> {
        usize::try_from(address).map_err(|_| VMError::InvalidAddress { address, ip: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_within_program() {
        let memory = Memory::new(&[1, 2, 3]);
        assert_eq!(memory.read(0).unwrap(), 1);
        assert_eq!(memory.read(2).unwrap(), 3);
    }

    #[test]
    fn read_unwritten_is_zero_and_does_not_grow() {
        let memory = Memory::new(&[1, 2, 3]);
        assert_eq!(memory.read(1000).unwrap(), 0);
        assert_eq!(memory.read(1000).unwrap(), 0);
        assert_eq!(memory.len(), 3);
    }

    #[test]
    fn write_past_end_grows_with_zeros() {
        let mut memory = Memory::new(&[7]);
        memory.write(5, 42).unwrap();
        assert_eq!(memory.len(), 6);
        assert_eq!(memory.as_slice(), &[7, 0, 0, 0, 0, 42]);
    }

    #[test]
    fn write_never_shrinks() {
        let mut memory = Memory::new(&[1, 2, 3, 4]);
        memory.write(0, 9).unwrap();
        assert_eq!(memory.len(), 4);
        assert_eq!(memory.snapshot(), vec![9, 2, 3, 4]);
    }

    #[test]
    fn repeated_growth_only_allocates_once() {
        let mut memory = Memory::default();
        assert!(memory.is_empty());
        memory.write(10, 1).unwrap();
        assert_eq!(memory.read(11).unwrap(), 0);
        assert_eq!(memory.read(11).unwrap(), 0);
        assert_eq!(memory.len(), 11);
    }

    #[test]
    fn negative_address_is_rejected() {
        let mut memory = Memory::new(&[1]);
        assert!(matches!(
            memory.read(-1),
            Err(VMError::InvalidAddress { address: -1, .. })
        ));
        assert!(matches!(
            memory.write(-3, 0),
            Err(VMError::InvalidAddress { address: -3, .. })
        ));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn unreachable_address_is_an_error() {
        let mut memory = Memory::new(&[1, 2]);
        assert_eq!(
            memory.write(i64::MAX, 1),
            Err(VMError::OutOfMemory {
                address: i64::MAX,
                ip: 0
            })
        );
        assert_eq!(memory.as_slice(), &[1, 2]);
        assert_eq!(memory.read(i64::MAX).unwrap(), 0);
    }
}
