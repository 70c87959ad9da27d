//! Core-set types.

use core::sync::atomic::{AtomicU32, Ordering};

use xbhal::NR_CPUS;

/// A value-type set of cores, one bit per core index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuMask(u32);

impl CpuMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn single(cpu: usize) -> Self {
        Self(1 << cpu)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn set(&mut self, cpu: usize) {
        self.0 |= 1 << cpu;
    }

    pub fn contains(&self, cpu: usize) -> bool {
        self.0 & (1 << cpu) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Core indices in the set, in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..NR_CPUS).filter(move |cpu| self.contains(*cpu))
    }
}

/// The shared running mask. Mutated under the global SMP lock; readable
/// lock-free from any core.
pub(crate) struct AtomicCpuMask(AtomicU32);

impl AtomicCpuMask {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn set(&self, cpu: usize) {
        self.0.fetch_or(1 << cpu, Ordering::SeqCst);
    }

    pub fn clear(&self, cpu: usize) {
        self.0.fetch_and(!(1 << cpu), Ordering::SeqCst);
    }

    pub fn contains(&self, cpu: usize) -> bool {
        self.0.load(Ordering::SeqCst) & (1 << cpu) != 0
    }

    pub fn snapshot(&self) -> CpuMask {
        CpuMask::from_bits(self.0.load(Ordering::SeqCst))
    }
}
