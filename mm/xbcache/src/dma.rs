//! DMA-direction cache maintenance, bound per core generation at init.
//!
//! `dma_wback` makes CPU-dirty lines visible to a device about to read;
//! `dma_inv` discards copies that may be stale after a device write;
//! `dma_wback_inv` does both. The generation-1 core needs write-allocate
//! disabled around invalidating passes; the generation-2 core carries a
//! unified secondary cache that must be maintained on every pass, and an
//! invalidate of a non-line-aligned range must write back the two boundary
//! lines first or adjacent live data sharing them is lost.

use kernel_guard::NoPreempt;
use xbhal::regs::{ERRCTL_WST_DIS, ERRCTL_WST_EN};
use xbhal::{CacheIsa, CacheOp, CoreIsa, CpuGeneration, MachineType};

use crate::CacheSystem;
use crate::blast::{hit_loop, hit_range, index_blast};

impl CacheSystem {
    /// Write CPU-dirty lines covering `[addr, addr+size)` back to memory.
    pub fn dma_wback(&self, addr: usize, size: usize) {
        if size == 0 {
            warn!("zero-length DMA writeback request at {addr:#x}");
            return;
        }
        match self.ops.generation {
            CpuGeneration::XBurst => self.xburst_dma_wback(addr, size),
            CpuGeneration::XBurst2 => self.xburst2_dma_wback(addr, size),
        }
    }

    /// Discard cached copies of `[addr, addr+size)` after a device wrote it.
    pub fn dma_inv(&self, addr: usize, size: usize) {
        if size == 0 {
            warn!("zero-length DMA invalidate request at {addr:#x}");
            return;
        }
        match self.ops.generation {
            CpuGeneration::XBurst => self.xburst_dma_inv(addr, size),
            CpuGeneration::XBurst2 => self.xburst2_dma_inv(addr, size),
        }
    }

    /// Write back and discard cached copies of `[addr, addr+size)`.
    pub fn dma_wback_inv(&self, addr: usize, size: usize) {
        if size == 0 {
            warn!("zero-length DMA writeback-invalidate request at {addr:#x}");
            return;
        }
        match self.ops.generation {
            CpuGeneration::XBurst => self.xburst_dma_wback_inv(addr, size),
            CpuGeneration::XBurst2 => self.xburst2_dma_wback_inv(addr, size),
        }
    }

    fn scache_size(&self) -> usize {
        self.hier.scache.map_or(0, |sc| sc.size)
    }

    fn scache_wbinv_range(&self, start: usize, end: usize) {
        if let Some(sc) = &self.hier.scache {
            hit_range(self.hw, sc.linesz, start, end, CacheOp::HitWritebackInvSD);
        }
    }

    fn xburst_dma_wback_inv(&self, addr: usize, size: usize) {
        let guard = NoPreempt::new();
        self.hw.write_errctl(ERRCTL_WST_EN);

        if !self.needs_broadcast() && size >= self.hier.dcache.size {
            if self.ops.machine >= MachineType::X1830 {
                self.blast_dcache();
            } else {
                index_blast(self.hw, &self.hier.dcache, CacheOp::IndexWritebackInvD);
            }
        } else {
            hit_range(
                self.hw,
                self.hier.dcache.linesz,
                addr,
                addr + size,
                CacheOp::HitWritebackInvD,
            );
        }

        self.hw.write_errctl(ERRCTL_WST_DIS);
        drop(guard);

        self.hw.sync();
    }

    fn xburst_dma_wback(&self, addr: usize, size: usize) {
        let guard = NoPreempt::new();

        if !self.needs_broadcast() && size >= self.hier.dcache.size {
            hit_loop(
                self.hw,
                self.hier.dcache.size,
                self.hier.dcache.linesz,
                CacheOp::HitWritebackD,
            );
        } else {
            hit_range(
                self.hw,
                self.hier.dcache.linesz,
                addr,
                addr + size,
                CacheOp::HitWritebackD,
            );
        }

        drop(guard);

        if self.ops.machine >= MachineType::X1830 {
            if size >= self.scache_size() {
                self.blast_scache();
            } else {
                self.scache_wbinv_range(addr, addr + size);
            }
        }

        self.hw.sync();
    }

    fn xburst_dma_inv(&self, addr: usize, size: usize) {
        let guard = NoPreempt::new();
        self.hw.write_errctl(ERRCTL_WST_EN);

        if !self.needs_broadcast() && size >= self.hier.dcache.size {
            hit_loop(
                self.hw,
                self.hier.dcache.size,
                self.hier.dcache.linesz,
                CacheOp::HitInvD,
            );
        } else {
            hit_range(
                self.hw,
                self.hier.dcache.linesz,
                addr,
                addr + size,
                CacheOp::HitInvD,
            );
        }

        self.hw.write_errctl(ERRCTL_WST_DIS);
        drop(guard);

        self.hw.sync();
    }

    fn xburst2_dma_wback_inv(&self, addr: usize, size: usize) {
        let guard = NoPreempt::new();

        if !self.needs_broadcast() && size >= self.hier.dcache.size {
            self.blast_dcache();
        } else {
            hit_range(
                self.hw,
                self.hier.dcache.linesz,
                addr,
                addr + size,
                CacheOp::HitWritebackInvD,
            );
        }

        drop(guard);

        if size >= self.scache_size() {
            self.blast_scache();
        } else {
            self.scache_wbinv_range(addr, addr + size);
        }

        self.hw.sync();
    }

    fn xburst2_dma_wback(&self, addr: usize, size: usize) {
        let guard = NoPreempt::new();

        if !self.needs_broadcast() && size >= self.hier.dcache.size {
            hit_loop(
                self.hw,
                self.hier.dcache.size,
                self.hier.dcache.linesz,
                CacheOp::HitWritebackD,
            );
        } else {
            hit_range(
                self.hw,
                self.hier.dcache.linesz,
                addr,
                addr + size,
                CacheOp::HitWritebackD,
            );
        }

        drop(guard);

        if size >= self.scache_size() {
            self.blast_scache();
        } else {
            self.scache_wbinv_range(addr, addr + size);
        }

        self.hw.sync();
    }

    fn xburst2_dma_inv(&self, addr: usize, size: usize) {
        let guard = NoPreempt::new();

        if !self.needs_broadcast() && size >= self.hier.dcache.size {
            self.blast_dcache();
        } else {
            hit_range(
                self.hw,
                self.hier.dcache.linesz,
                addr,
                addr + size,
                CacheOp::HitInvD,
            );
        }

        drop(guard);

        match &self.hier.scache {
            Some(sc) if size < sc.size => {
                // An invalidate-only at a non-line-aligned boundary would
                // discard adjacent live data sharing the line; write the
                // two boundary lines back first.
                let almask = !(sc.linesz - 1);
                self.hw.cache_op(CacheOp::HitWritebackInvSD, addr & almask);
                self.hw
                    .cache_op(CacheOp::HitWritebackInvSD, (addr + size - 1) & almask);
                hit_range(self.hw, sc.linesz, addr, addr + size, CacheOp::HitInvSD);
            }
            _ => self.blast_scache(),
        }

        self.hw.sync();
    }
}
