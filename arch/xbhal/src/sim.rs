//! Functional XBurst simulator for host-side tests.
//!
//! Every register write, cache operation and barrier is appended to a
//! single event log under one lock, giving tests a linearization they can
//! assert ordering against. The data and secondary caches are modeled at
//! line granularity with a dirty flag and a backing memory map, so
//! write-back/invalidate semantics (including data loss on a bare
//! invalidate) are observable. The dirty-line scan path is served by a
//! separate index-addressed tag store.

use alloc::{collections::BTreeMap, vec::Vec};
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use kspin::SpinNoIrq;

use crate::regs::{CacheOp, XBURST_TAGLO_DIRTY_MASK};
use crate::{
    CacheIsa, CoreCtrl, CoreIsa, CoreRegs, CoreStatus, IntMask, NR_CPUS, Reim,
    regs::{PRID_COMP_INGENIC_D0, PRID_IMP_XBURST_REV1},
};

/// A register named in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimReg {
    CoreCtrl,
    CoreStatus,
    Reim,
    Mailbox(usize),
    EntrySp,
    EntryGp,
    Config,
    ErrCtl,
    IntMask,
}

/// One observable hardware access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    RegWrite { reg: SimReg, val: u32 },
    CacheOp { op: CacheOp, addr: usize },
    Wmb,
    Sync,
    Wait,
    Reenter,
}

/// One cached line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimLine {
    pub data: u32,
    pub dirty: bool,
}

#[derive(Default)]
struct SimMem {
    events: Vec<SimEvent>,
    dlines: BTreeMap<usize, SimLine>,
    slines: BTreeMap<usize, SimLine>,
    memory: BTreeMap<usize, u32>,
    dtags: BTreeMap<usize, u32>,
}

/// Simulated register file and cache state for one XBurst cluster.
pub struct SimXburst {
    corectrl: AtomicU32,
    corestatus: AtomicU32,
    reim: AtomicU32,
    mailbox: [AtomicU32; NR_CPUS],
    entry_sp: AtomicU32,
    entry_gp: AtomicU32,
    config: AtomicU32,
    config1: AtomicU32,
    config2: AtomicU32,
    prid: AtomicU32,
    errctl: AtomicU32,
    int_mask: AtomicU32,
    irq_depth: AtomicUsize,
    pending: AtomicBool,
    dline_size: AtomicUsize,
    sline_size: AtomicUsize,
    inner: SpinNoIrq<SimMem>,
}

impl Default for SimXburst {
    fn default() -> Self {
        Self::new()
    }
}

impl SimXburst {
    pub fn new() -> Self {
        Self {
            corectrl: AtomicU32::new(0),
            corestatus: AtomicU32::new(0),
            reim: AtomicU32::new(0),
            mailbox: [
                AtomicU32::new(0),
                AtomicU32::new(0),
                AtomicU32::new(0),
                AtomicU32::new(0),
            ],
            entry_sp: AtomicU32::new(0),
            entry_gp: AtomicU32::new(0),
            config: AtomicU32::new(0x3),
            config1: AtomicU32::new(0),
            config2: AtomicU32::new(0),
            prid: AtomicU32::new(PRID_COMP_INGENIC_D0 | PRID_IMP_XBURST_REV1),
            errctl: AtomicU32::new(0),
            int_mask: AtomicU32::new(0),
            irq_depth: AtomicUsize::new(0),
            pending: AtomicBool::new(false),
            dline_size: AtomicUsize::new(32),
            sline_size: AtomicUsize::new(32),
            inner: SpinNoIrq::new(SimMem::default()),
        }
    }

    /// Encode a Config1 value for the given primary cache geometry.
    ///
    /// A line size of zero encodes "cache not present".
    pub fn encode_config1(
        ilinesz: usize,
        isets: usize,
        iways: usize,
        dlinesz: usize,
        dsets: usize,
        dways: usize,
        has_config2: bool,
    ) -> u32 {
        let lfield = |l: usize| if l == 0 { 0 } else { (l / 2).trailing_zeros() };
        let sfield = |s: usize| ((s / 32).trailing_zeros() + 7) & 7;
        let wfield = |w: usize| (w - 1) as u32;

        let mut c1 = 0u32;
        c1 |= lfield(ilinesz) << 19;
        c1 |= sfield(isets) << 22;
        c1 |= wfield(iways) << 16;
        c1 |= lfield(dlinesz) << 10;
        c1 |= sfield(dsets) << 13;
        c1 |= wfield(dways) << 7;
        if has_config2 {
            c1 |= crate::regs::MIPS_CONF_M;
        }
        c1
    }

    /// Encode a Config2 value for the given secondary cache geometry.
    pub fn encode_config2(slinesz: usize, ssets: usize, sways: usize) -> u32 {
        let mut c2 = 0u32;
        c2 |= (slinesz / 2).trailing_zeros() << 4;
        c2 |= (ssets / 64).trailing_zeros() << 8;
        c2 |= (sways - 1) as u32;
        c2
    }

    pub fn set_prid(&self, prid: u32) {
        self.prid.store(prid, Ordering::SeqCst);
    }

    pub fn set_config(&self, val: u32) {
        self.config.store(val, Ordering::SeqCst);
    }

    pub fn set_config1(&self, val: u32) {
        self.config1.store(val, Ordering::SeqCst);
    }

    pub fn set_config2(&self, val: u32) {
        self.config2.store(val, Ordering::SeqCst);
    }

    /// Line sizes the hit-type operations align against.
    pub fn set_line_sizes(&self, dline: usize, sline: usize) {
        self.dline_size.store(dline, Ordering::SeqCst);
        self.sline_size.store(sline, Ordering::SeqCst);
    }

    pub fn set_pending_irq(&self, pending: bool) {
        self.pending.store(pending, Ordering::SeqCst);
    }

    pub fn irq_disable_depth(&self) -> usize {
        self.irq_depth.load(Ordering::SeqCst)
    }

    pub fn last_int_mask(&self) -> IntMask {
        IntMask::from_bits_retain(self.int_mask.load(Ordering::SeqCst))
    }

    pub fn read_errctl(&self) -> u32 {
        self.errctl.load(Ordering::SeqCst)
    }

    /// Snapshot of the event log.
    pub fn events(&self) -> Vec<SimEvent> {
        self.inner.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.inner.lock().events.clear();
    }

    /// Install a line in the simulated data cache.
    pub fn plant_dline(&self, addr: usize, data: u32, dirty: bool) {
        self.inner.lock().dlines.insert(addr, SimLine { data, dirty });
    }

    /// Install a line in the simulated secondary cache.
    pub fn plant_sline(&self, addr: usize, data: u32, dirty: bool) {
        self.inner.lock().slines.insert(addr, SimLine { data, dirty });
    }

    /// Install a TagLo value for an index-addressed data cache slot.
    pub fn plant_dtag(&self, addr: usize, tag: u32) {
        self.inner.lock().dtags.insert(addr, tag);
    }

    pub fn dtag(&self, addr: usize) -> u32 {
        self.inner.lock().dtags.get(&addr).copied().unwrap_or(0)
    }

    pub fn dline(&self, addr: usize) -> Option<SimLine> {
        self.inner.lock().dlines.get(&addr).copied()
    }

    pub fn sline(&self, addr: usize) -> Option<SimLine> {
        self.inner.lock().slines.get(&addr).copied()
    }

    pub fn mem_word(&self, addr: usize) -> Option<u32> {
        self.inner.lock().memory.get(&addr).copied()
    }

    pub fn set_mem_word(&self, addr: usize, val: u32) {
        self.inner.lock().memory.insert(addr, val);
    }

    fn log(&self, ev: SimEvent) {
        self.inner.lock().events.push(ev);
    }

    fn log_write(&self, reg: SimReg, val: u32) {
        self.log(SimEvent::RegWrite { reg, val });
    }
}

impl CoreIsa for SimXburst {
    fn wmb(&self) {
        self.log(SimEvent::Wmb);
        core::sync::atomic::fence(Ordering::SeqCst);
    }

    fn sync(&self) {
        self.log(SimEvent::Sync);
        core::sync::atomic::fence(Ordering::SeqCst);
    }

    fn wait_for_interrupt(&self) {
        self.log(SimEvent::Wait);
    }

    fn local_irq_disable(&self) {
        self.irq_depth.fetch_add(1, Ordering::SeqCst);
    }

    fn local_irq_enable(&self) {
        let _ = self
            .irq_depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| {
                Some(d.saturating_sub(1))
            });
    }

    fn local_irq_save(&self) -> usize {
        self.irq_depth.fetch_add(1, Ordering::SeqCst)
    }

    fn local_irq_restore(&self, flags: usize) {
        self.irq_depth.store(flags, Ordering::SeqCst);
    }

    fn read_prid(&self) -> u32 {
        self.prid.load(Ordering::SeqCst)
    }

    fn pending_irq(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    fn secondary_reentry(&self) {
        self.log(SimEvent::Reenter);
    }
}

impl CoreRegs for SimXburst {
    fn read_corectrl(&self) -> CoreCtrl {
        CoreCtrl::from_bits_retain(self.corectrl.load(Ordering::SeqCst))
    }

    fn write_corectrl(&self, val: CoreCtrl) {
        self.corectrl.store(val.bits(), Ordering::SeqCst);
        self.log_write(SimReg::CoreCtrl, val.bits());
    }

    fn read_corestatus(&self) -> CoreStatus {
        CoreStatus::from_bits_retain(self.corestatus.load(Ordering::SeqCst))
    }

    fn write_corestatus(&self, val: CoreStatus) {
        self.corestatus.store(val.bits(), Ordering::SeqCst);
        self.log_write(SimReg::CoreStatus, val.bits());
    }

    fn read_reim(&self) -> Reim {
        Reim::from_bits_retain(self.reim.load(Ordering::SeqCst))
    }

    fn write_reim(&self, val: Reim) {
        self.reim.store(val.bits(), Ordering::SeqCst);
        self.log_write(SimReg::Reim, val.bits());
    }

    fn read_mailbox(&self, cpu: usize) -> u32 {
        self.mailbox[cpu].load(Ordering::SeqCst)
    }

    fn write_mailbox(&self, cpu: usize, val: u32) {
        self.mailbox[cpu].store(val, Ordering::SeqCst);
        self.log_write(SimReg::Mailbox(cpu), val);
    }

    fn write_entry_sp(&self, sp: u32) {
        self.entry_sp.store(sp, Ordering::SeqCst);
        self.log_write(SimReg::EntrySp, sp);
    }

    fn write_entry_gp(&self, gp: u32) {
        self.entry_gp.store(gp, Ordering::SeqCst);
        self.log_write(SimReg::EntryGp, gp);
    }

    fn read_entry_sp(&self) -> u32 {
        self.entry_sp.load(Ordering::SeqCst)
    }

    fn read_entry_gp(&self) -> u32 {
        self.entry_gp.load(Ordering::SeqCst)
    }

    fn unmask_int_levels(&self, levels: IntMask) {
        let val = self.int_mask.fetch_or(levels.bits(), Ordering::SeqCst) | levels.bits();
        self.log_write(SimReg::IntMask, val);
    }

    fn set_int_mask(&self, levels: IntMask) {
        self.int_mask.store(levels.bits(), Ordering::SeqCst);
        self.log_write(SimReg::IntMask, levels.bits());
    }
}

impl CacheIsa for SimXburst {
    fn cache_op(&self, op: CacheOp, addr: usize) {
        let dmask = !(self.dline_size.load(Ordering::SeqCst) - 1);
        let smask = !(self.sline_size.load(Ordering::SeqCst) - 1);
        let mut m = self.inner.lock();
        m.events.push(SimEvent::CacheOp { op, addr });
        match op {
            CacheOp::HitWritebackD => {
                let key = addr & dmask;
                if let Some(line) = m.dlines.get(&key).copied()
                    && line.dirty
                {
                    m.memory.insert(key, line.data);
                    m.dlines.insert(key, SimLine { data: line.data, dirty: false });
                }
            }
            CacheOp::HitWritebackInvD => {
                let key = addr & dmask;
                if let Some(line) = m.dlines.remove(&key)
                    && line.dirty
                {
                    m.memory.insert(key, line.data);
                }
            }
            CacheOp::HitInvD => {
                m.dlines.remove(&(addr & dmask));
            }
            CacheOp::HitWritebackSD => {
                let key = addr & smask;
                if let Some(line) = m.slines.get(&key).copied()
                    && line.dirty
                {
                    m.memory.insert(key, line.data);
                    m.slines.insert(key, SimLine { data: line.data, dirty: false });
                }
            }
            CacheOp::HitWritebackInvSD => {
                let key = addr & smask;
                if let Some(line) = m.slines.remove(&key)
                    && line.dirty
                {
                    m.memory.insert(key, line.data);
                }
            }
            CacheOp::HitInvSD => {
                m.slines.remove(&(addr & smask));
            }
            CacheOp::IndexWritebackInvD => {
                if let Some(tag) = m.dtags.get_mut(&addr) {
                    *tag &= !XBURST_TAGLO_DIRTY_MASK;
                }
            }
            // Instruction-cache state, index-type secondary ops and raw tag
            // loads are tracked by the event log alone.
            CacheOp::IndexInvI
            | CacheOp::IndexWritebackInvSD
            | CacheOp::HitInvI
            | CacheOp::IndexLoadTagD => {}
        }
    }

    fn load_dcache_tag(&self, addr: usize) -> u32 {
        let mut m = self.inner.lock();
        m.events.push(SimEvent::CacheOp { op: CacheOp::IndexLoadTagD, addr });
        m.dtags.get(&addr).copied().unwrap_or(0)
    }

    fn read_config(&self) -> u32 {
        self.config.load(Ordering::SeqCst)
    }

    fn write_config(&self, val: u32) {
        self.config.store(val, Ordering::SeqCst);
        self.log_write(SimReg::Config, val);
    }

    fn read_config1(&self) -> u32 {
        self.config1.load(Ordering::SeqCst)
    }

    fn read_config2(&self) -> u32 {
        self.config2.load(Ordering::SeqCst)
    }

    fn write_errctl(&self, val: u32) {
        self.errctl.store(val, Ordering::SeqCst);
        self.log_write(SimReg::ErrCtl, val);
    }
}
