// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Hardware primitives for the Ingenic XBurst SoC family.
//!
//! The SMP and cache crates are written against three small traits instead
//! of instruction encodings: [`CoreIsa`] for barriers and the wait/IRQ
//! instructions, [`CoreRegs`] for the CP0 core bank (mailboxes, core
//! control/status, reset entry), and [`CacheIsa`] for the `cache`
//! instruction and the configuration registers. The `mips` backend
//! implements them with inline assembly; the `sim` backend (enabled by the
//! `sim` feature and in tests) is a functional register-file and cache
//! simulator with a linearized event log, so the coherency algorithms can
//! be exercised on the host.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(all(target_arch = "mips", not(test)), feature(asm_experimental_arch))]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;

pub mod machine;
pub mod regs;

pub use machine::{CpuGeneration, MachineType};
pub use regs::{CacheOp, CoreCtrl, CoreStatus, IntMask, NR_CPUS, Reim};

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "mips", not(test)))] {
        mod mips;
        pub use self::mips::MipsXburst;
    }
}

#[cfg(any(test, feature = "sim"))]
pub mod sim;

#[cfg(test)]
mod tests;

/// Core-local instructions: barriers, low-power wait, local IRQ control.
pub trait CoreIsa: Sync {
    /// Write memory barrier. Orders prior stores before later ones as
    /// observed by the other cores.
    fn wmb(&self);

    /// Full `sync` barrier.
    fn sync(&self);

    /// Execute the low-power `wait` instruction. Returns when an
    /// interrupt is delivered (or immediately in simulation).
    fn wait_for_interrupt(&self);

    /// Disable interrupts on the calling core.
    fn local_irq_disable(&self);

    /// Enable interrupts on the calling core.
    fn local_irq_enable(&self);

    /// Disable interrupts and return the previous state for
    /// [`CoreIsa::local_irq_restore`].
    fn local_irq_save(&self) -> usize;

    /// Restore an interrupt state saved by [`CoreIsa::local_irq_save`].
    fn local_irq_restore(&self, flags: usize);

    /// CP0 PRId, identifying the core implementation.
    fn read_prid(&self) -> u32;

    /// Whether an interrupt is already latched on the calling core
    /// (Cause & Status & IP).
    fn pending_irq(&self) -> bool;

    /// Jump to the uncached secondary re-entry stub.
    ///
    /// On hardware this never returns; the simulator records the event
    /// and returns so the surrounding loop stays testable.
    fn secondary_reentry(&self);
}

/// The CP0 core bank shared by all cores of the cluster.
///
/// Mailbox accessors take a core index below [`NR_CPUS`]; callers validate
/// the index first, out-of-range values are a topology violation.
pub trait CoreRegs: CoreIsa {
    fn read_corectrl(&self) -> CoreCtrl;
    fn write_corectrl(&self, val: CoreCtrl);

    fn read_corestatus(&self) -> CoreStatus;
    fn write_corestatus(&self, val: CoreStatus);

    fn read_reim(&self) -> Reim;
    fn write_reim(&self, val: Reim);

    fn read_mailbox(&self, cpu: usize) -> u32;
    fn write_mailbox(&self, cpu: usize, val: u32);

    /// Boot handoff scalars, read by a secondary core immediately after
    /// it leaves reset. The writer must order them before the
    /// reset-deassert with [`CoreIsa::wmb`].
    fn write_entry_sp(&self, sp: u32);
    fn write_entry_gp(&self, gp: u32);
    fn read_entry_sp(&self) -> u32;
    fn read_entry_gp(&self) -> u32;

    /// OR the given lines into the calling core's Status.IM field.
    fn unmask_int_levels(&self, levels: IntMask);

    /// Replace the calling core's Status.IM field.
    fn set_int_mask(&self, levels: IntMask);
}

/// The `cache` instruction and the cache-related configuration registers.
pub trait CacheIsa: CoreIsa {
    /// Issue one cache operation against `addr`.
    fn cache_op(&self, op: CacheOp, addr: usize);

    /// `IndexLoadTagD` at `addr`, returning the TagLo value.
    fn load_dcache_tag(&self, addr: usize) -> u32;

    fn read_config(&self) -> u32;
    fn write_config(&self, val: u32);
    fn read_config1(&self) -> u32;
    fn read_config2(&self) -> u32;

    /// Write ErrCtl (write-allocate control on XBurst).
    fn write_errctl(&self, val: u32);
}
