// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Cache maintenance for the Ingenic XBurst SoC family.
//!
//! These parts have no hardware snoop coherency between cores, so cache
//! maintenance is software's problem: the geometry is probed once from
//! the capability registers, each logical operation is bound to a
//! concrete iteration primitive for the detected SoC variant, and
//! operations with kernel-wide visibility requirements are propagated to
//! every online peer core through a synchronous cross-call.
//!
//! [`init`] installs the probed [`CacheSystem`] as the process-wide
//! instance consumed by the memory-management and DMA layers through the
//! free functions; everything is also available on [`CacheSystem`]
//! directly.

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;

use lazyinit::LazyInit;
use xbhal::{CacheIsa, CoreIsa, CpuGeneration, MachineType};

mod blast;
mod coherency;
mod dispatch;
mod dma;
mod geometry;
mod idle;


pub use coherency::set_cca_param;
pub use geometry::{CacheDesc, CacheHierarchy};

use dispatch::CacheOpTable;

/// Kernel page size on these parts.
pub const PAGE_SIZE: usize = 4096;

/// Synchronous cross-core dispatch into the coherency domain, provided
/// by the surrounding kernel.
pub trait CoherencyDomain: Sync {
    /// Whether any other core that could access this coherency domain is
    /// currently online.
    fn peers_online(&self) -> bool;

    /// Run `f` on every online peer core and return once all of them
    /// have completed it. This is the heavyweight completion-waiting
    /// path, not the fire-and-forget mailbox IPI.
    fn cross_call(&self, f: &(dyn Fn() + Sync));
}

/// The probed geometry and selected operation bindings for this cluster.
///
/// Built once at init; read-only afterwards.
pub struct CacheSystem {
    hw: &'static dyn CacheIsa,
    domain: &'static dyn CoherencyDomain,
    hier: CacheHierarchy,
    ops: CacheOpTable,
}

impl CacheSystem {
    /// Probe the cache hierarchy and bind the operation set for
    /// `machine`, then flush the local caches and apply the coherency
    /// attribute.
    ///
    /// Panics when the silicon reports a present cache with zero size or
    /// an implementation this kernel was not built for; a kernel that
    /// does not match its silicon cannot continue safely.
    pub fn new(
        hw: &'static dyn CacheIsa,
        domain: &'static dyn CoherencyDomain,
        machine: MachineType,
    ) -> Self {
        let (icache, dcache) = geometry::probe_pcache(hw, machine);
        let scache = geometry::probe_scache(hw, machine);
        let hier = CacheHierarchy { icache, dcache, scache };

        let generation = match CpuGeneration::from_prid(hw.read_prid()) {
            Some(generation) => generation,
            None => panic!("Unknown Ingenic CPU type."),
        };

        let ops = dispatch::select_ops(machine, generation, &hier);
        let this = Self { hw, domain, hier, ops };

        this.local_flush_all();
        coherency::coherency_setup(hw);

        this
    }

    /// The probed cache hierarchy.
    pub fn hierarchy(&self) -> &CacheHierarchy {
        &self.hier
    }

    /// The detected cache-instruction generation.
    pub fn generation(&self) -> CpuGeneration {
        self.ops.generation
    }

    /// The SoC variant the operation set was bound for.
    pub fn machine(&self) -> MachineType {
        self.ops.machine
    }

    /// Re-apply the coherency attribute after a power transition.
    pub fn pm_resume(&self) {
        coherency::coherency_setup(self.hw);
    }
}

static CACHE_SYSTEM: LazyInit<CacheSystem> = LazyInit::new();

/// Probe and install the process-wide cache system. Called once at boot,
/// before any secondary core is released.
pub fn init(
    hw: &'static dyn CacheIsa,
    domain: &'static dyn CoherencyDomain,
    machine: MachineType,
) -> &'static CacheSystem {
    CACHE_SYSTEM.init_once(CacheSystem::new(hw, domain, machine))
}

/// The installed cache system.
pub fn cache_system() -> &'static CacheSystem {
    &CACHE_SYSTEM
}

/// Flush the instruction and data caches of every online core.
pub fn flush_all() {
    CACHE_SYSTEM.flush_all();
}

/// Make `[start, end)` coherent kernel-wide.
pub fn flush_range(start: usize, end: usize) {
    CACHE_SYSTEM.flush_range(start, end);
}

/// Flush the page containing `addr` from the local caches.
pub fn flush_page(addr: usize) {
    CACHE_SYSTEM.flush_page(addr);
}

/// Flush the page containing `addr` from the local data cache.
pub fn flush_data_page(addr: usize) {
    CACHE_SYSTEM.flush_data_page(addr);
}

/// Write back a kernel vmap range before its mapping goes away.
pub fn flush_vmap_range(addr: usize, size: usize) {
    CACHE_SYSTEM.flush_vmap_range(addr, size);
}

/// Write CPU-dirty lines covering `[addr, addr+size)` back to memory
/// before a device reads it.
pub fn dma_wback(addr: usize, size: usize) {
    CACHE_SYSTEM.dma_wback(addr, size);
}

/// Discard cached copies of `[addr, addr+size)` after a device wrote it.
pub fn dma_inv(addr: usize, size: usize) {
    CACHE_SYSTEM.dma_inv(addr, size);
}

/// Write back and discard cached copies of `[addr, addr+size)`.
pub fn dma_wback_inv(addr: usize, size: usize) {
    CACHE_SYSTEM.dma_wback_inv(addr, size);
}

/// Enter the low-power wait state with interrupts already disabled.
pub fn wait_irqoff(work_pending: bool) {
    CACHE_SYSTEM.wait_irqoff(work_pending);
}

/// Re-apply the coherency attribute after a power transition.
pub fn pm_resume() {
    CACHE_SYSTEM.pm_resume();
}
