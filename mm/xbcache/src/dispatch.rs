// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Per-variant operation selection and the kernel-visible flush operations.
//!
//! Two hardware cache-instruction generations and a spread of SoC variants
//! share this code. Each logical whole-cache operation is bound to one of
//! the iteration primitives exactly once at init and never rebound; the
//! bindings are a closed enum set rather than function pointers.
//!
//! None of these parts keep their caches coherent in hardware, so any
//! operation whose effect must be visible kernel-wide is also dispatched,
//! synchronously, to every other online core in the coherency domain.

use kernel_guard::NoPreempt;
use xbhal::{CacheOp, CpuGeneration, MachineType};

use crate::blast::{hit_loop, hit_range, index_blast};
use crate::geometry::CacheHierarchy;
use crate::{CacheSystem, CoherencyDomain, PAGE_SIZE};

/// Whole-data-cache primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DcacheWhole {
    /// Hit-type writeback-invalidate walk over the full capacity.
    HitWritebackInv,
    /// Classic per-way index blast.
    IndexBlast,
}

/// Whole-instruction-cache primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IcacheWhole {
    IndexBlast,
    /// Hit-type invalidate walk over the full capacity.
    HitInv,
}

/// Whole-secondary-cache primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScacheWhole {
    /// No secondary cache fitted.
    Noop,
    IndexBlast,
}

/// The operation bindings chosen at init. Immutable thereafter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CacheOpTable {
    pub dcache_whole: DcacheWhole,
    pub icache_whole: IcacheWhole,
    pub scache_whole: ScacheWhole,
    pub generation: CpuGeneration,
    pub machine: MachineType,
}

pub(crate) fn select_ops(
    machine: MachineType,
    generation: CpuGeneration,
    hier: &CacheHierarchy,
) -> CacheOpTable {
    let (dcache_whole, icache_whole) = if machine >= MachineType::X2000 {
        (DcacheWhole::HitWritebackInv, IcacheWhole::IndexBlast)
    } else if machine >= MachineType::Jz4750 {
        (DcacheWhole::HitWritebackInv, IcacheWhole::HitInv)
    } else {
        (DcacheWhole::IndexBlast, IcacheWhole::IndexBlast)
    };

    let scache_whole = if hier.scache.is_some() {
        ScacheWhole::IndexBlast
    } else {
        ScacheWhole::Noop
    };

    CacheOpTable {
        dcache_whole,
        icache_whole,
        scache_whole,
        generation,
        machine,
    }
}

impl CacheSystem {
    /// Whether any peer core shares the coherency domain right now.
    pub fn needs_broadcast(&self) -> bool {
        self.domain.peers_online()
    }

    /// Run `f` on every online core in the domain, peers first, then
    /// locally. Peers are reached through the synchronous cross-call
    /// path and have completed `f` by the time this returns.
    pub(crate) fn on_each_cpu(&self, f: &(dyn Fn() + Sync)) {
        let guard = NoPreempt::new();

        if self.needs_broadcast() {
            self.domain.cross_call(f);
        }
        f();

        drop(guard);
    }

    pub(crate) fn blast_dcache(&self) {
        match self.ops.dcache_whole {
            DcacheWhole::HitWritebackInv => hit_loop(
                self.hw,
                self.hier.dcache.size,
                self.hier.dcache.linesz,
                CacheOp::HitWritebackInvD,
            ),
            DcacheWhole::IndexBlast => {
                index_blast(self.hw, &self.hier.dcache, CacheOp::IndexWritebackInvD)
            }
        }
    }

    pub(crate) fn blast_icache(&self) {
        match self.ops.icache_whole {
            IcacheWhole::IndexBlast => index_blast(self.hw, &self.hier.icache, CacheOp::IndexInvI),
            IcacheWhole::HitInv => hit_loop(
                self.hw,
                self.hier.icache.size,
                self.hier.icache.linesz,
                CacheOp::HitInvI,
            ),
        }
    }

    pub(crate) fn blast_scache(&self) {
        match (self.ops.scache_whole, &self.hier.scache) {
            (ScacheWhole::IndexBlast, Some(sc)) => {
                index_blast(self.hw, sc, CacheOp::IndexWritebackInvSD)
            }
            _ => {}
        }
    }

    /// Flush the local instruction and data caches completely.
    pub fn local_flush_all(&self) {
        self.blast_dcache();
        self.blast_icache();
    }

    /// Flush the instruction and data caches of every online core.
    pub fn flush_all(&self) {
        self.on_each_cpu(&|| self.local_flush_all());
    }

    /// Make `[start, end)` coherent between the data and instruction
    /// caches of the calling core.
    ///
    /// Once the range reaches a cache's capacity the whole-cache
    /// primitive is cheaper than iterating lines; the crossover is exact,
    /// with no hysteresis.
    pub fn local_flush_range(&self, start: usize, end: usize) {
        let len = end - start;

        if len >= self.hier.dcache.size {
            self.blast_dcache();
        } else {
            hit_range(
                self.hw,
                self.hier.dcache.linesz,
                start,
                end,
                CacheOp::HitWritebackInvD,
            );
        }

        if len >= self.hier.icache.size {
            self.blast_icache();
        } else {
            hit_range(self.hw, self.hier.icache.linesz, start, end, CacheOp::HitInvI);
        }
    }

    /// Make `[start, end)` coherent kernel-wide.
    pub fn flush_range(&self, start: usize, end: usize) {
        if end <= start {
            warn!("zero-length cache flush request at {start:#x}");
            return;
        }

        let guard = NoPreempt::new();

        if self.needs_broadcast() {
            // Interrupting every peer costs more than flushing a small
            // range by lines; the peers will refetch from memory anyway.
            let len = end - start;
            if len * 2 <= self.hier.icache.size + self.hier.dcache.size {
                hit_range(
                    self.hw,
                    self.hier.dcache.linesz,
                    start,
                    end,
                    CacheOp::HitWritebackInvD,
                );
                hit_range(self.hw, self.hier.icache.linesz, start, end, CacheOp::HitInvI);
                drop(guard);
                return;
            }
        }

        self.on_each_cpu(&|| self.local_flush_range(start, end));
        drop(guard);
    }

    /// Flush the page containing `addr` from the local instruction and
    /// data caches.
    pub fn flush_page(&self, addr: usize) {
        let page = addr & !(PAGE_SIZE - 1);
        let guard = NoPreempt::new();

        hit_range(
            self.hw,
            self.hier.dcache.linesz,
            page,
            page + PAGE_SIZE,
            CacheOp::HitWritebackInvD,
        );
        hit_range(
            self.hw,
            self.hier.icache.linesz,
            page,
            page + PAGE_SIZE,
            CacheOp::HitInvI,
        );

        drop(guard);
    }

    /// Flush the page containing `addr` from the local data cache only.
    pub fn flush_data_page(&self, addr: usize) {
        let page = addr & !(PAGE_SIZE - 1);
        hit_range(
            self.hw,
            self.hier.dcache.linesz,
            page,
            page + PAGE_SIZE,
            CacheOp::HitWritebackInvD,
        );
    }

    /// Write back a kernel vmap range before its mapping goes away.
    pub fn flush_vmap_range(&self, addr: usize, size: usize) {
        if size == 0 {
            warn!("zero-length vmap flush request at {addr:#x}");
            return;
        }

        if size >= self.hier.dcache.size {
            self.on_each_cpu(&|| self.blast_dcache());
        } else {
            hit_range(
                self.hw,
                self.hier.dcache.linesz,
                addr,
                addr + size,
                CacheOp::HitWritebackInvD,
            );
        }
    }
}
