//! Line-level iteration primitives.
//!
//! Everything here is a plain loop over the hardware [`CacheIsa::cache_op`]
//! primitive; which loop a logical operation maps to is decided once at
//! init by the dispatcher.

use xbhal::regs::{INDEX_BASE, XBURST_TAGLO_DIRTY_MASK};
use xbhal::{CacheIsa, CacheOp};

use crate::geometry::CacheDesc;

/// Visit every way/index slot of `desc` with an index-type operation.
pub(crate) fn index_blast(hw: &dyn CacheIsa, desc: &CacheDesc, op: CacheOp) {
    let ws_inc = 1usize << desc.waybit;
    let ws_end = desc.ways << desc.waybit;

    let mut ws = 0;
    while ws < ws_end {
        let mut addr = INDEX_BASE;
        while addr < INDEX_BASE + desc.waysize {
            hw.cache_op(op, addr | ws);
            addr += desc.linesz;
        }
        ws += ws_inc;
    }
}

/// Hit-type pass across a whole cache capacity through the unmapped
/// kernel window.
pub(crate) fn hit_loop(hw: &dyn CacheIsa, size: usize, linesz: usize, op: CacheOp) {
    let mut addr = INDEX_BASE;
    while addr < INDEX_BASE + size {
        hw.cache_op(op, addr);
        addr += linesz;
    }
}

/// Hit-type pass over the lines covering `[start, end)`.
pub(crate) fn hit_range(hw: &dyn CacheIsa, linesz: usize, start: usize, end: usize, op: CacheOp) {
    let mask = !(linesz - 1);
    let mut addr = start & mask;
    let aend = (end - 1) & mask;

    loop {
        hw.cache_op(op, addr);
        if addr == aend {
            break;
        }
        addr += linesz;
    }
}

/// Write back and invalidate only the data-cache lines whose tags carry
/// the vendor dirty bits.
///
/// Blasting the whole cache before every low-power wait would be
/// prohibitively slow; loading each slot's tag and testing the dirty bits
/// visits the same slots but only pays the write-back cost for lines that
/// actually need it.
pub(crate) fn wback_dirty_lines(hw: &dyn CacheIsa, dcache: &CacheDesc) {
    let ws_inc = 1usize << dcache.waybit;
    let ws_end = dcache.ways << dcache.waybit;

    let mut ws = 0;
    while ws < ws_end {
        let mut addr = INDEX_BASE;
        while addr < INDEX_BASE + dcache.waysize {
            let tag = hw.load_dcache_tag(addr | ws);
            if tag & XBURST_TAGLO_DIRTY_MASK != 0 {
                hw.cache_op(CacheOp::IndexWritebackInvD, addr | ws);
            }
            addr += dcache.linesz;
        }
        ws += ws_inc;
    }
}
