//! Real-hardware backend: CP0 moves, `cache` and `wait` instructions.
//!
//! The boot handoff scalars are exported with fixed symbol names; the
//! low-level secondary entry stub loads them into `sp`/`gp` right after
//! the core leaves reset.

use core::arch::asm;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::regs::kseg1addr;
use crate::{CacheIsa, CacheOp, CoreCtrl, CoreIsa, CoreRegs, CoreStatus, IntMask, Reim};

/// Read by the secondary entry stub immediately after reset.
#[unsafe(no_mangle)]
pub static XBURST_CPU_ENTRY_SP: AtomicU32 = AtomicU32::new(0);

/// Read by the secondary entry stub immediately after reset.
#[unsafe(no_mangle)]
pub static XBURST_CPU_ENTRY_GP: AtomicU32 = AtomicU32::new(0);

unsafe extern "C" {
    /// Uncached parking routine, placed by the platform linker script.
    fn xburst_secondary_park();
}

const CAUSEF_IP: u32 = 0xff00;
const ST0_IM: u32 = 0xff00;

macro_rules! read_c0 {
    ($reg:literal, $sel:literal) => {{
        let val: u32;
        unsafe {
            asm!(
                concat!("mfc0 {0}, $", $reg, ", ", $sel),
                out(reg) val,
                options(nomem, nostack),
            )
        };
        val
    }};
}

macro_rules! write_c0 {
    ($reg:literal, $sel:literal, $val:expr) => {{
        unsafe {
            asm!(
                concat!("mtc0 {0}, $", $reg, ", ", $sel),
                "ehb",
                in(reg) $val,
                options(nomem, nostack),
            )
        };
    }};
}

macro_rules! cache_insn {
    ($op:literal, $addr:expr) => {
        unsafe {
            asm!(
                ".set push",
                ".set mips3",
                concat!("cache ", $op, ", 0({0})"),
                ".set pop",
                in(reg) $addr,
                options(nostack),
            )
        }
    };
}

/// The one real XBurst cluster.
pub struct MipsXburst;

impl CoreIsa for MipsXburst {
    fn wmb(&self) {
        unsafe { asm!("sync", options(nostack)) };
    }

    fn sync(&self) {
        unsafe { asm!("sync", options(nostack)) };
    }

    fn wait_for_interrupt(&self) {
        unsafe {
            asm!(".set push", ".set mips3", "sync", "wait", ".set pop", options(nostack));
        }
    }

    fn local_irq_disable(&self) {
        unsafe { asm!("di", "ehb", options(nomem, nostack)) };
    }

    fn local_irq_enable(&self) {
        unsafe { asm!("ei", "ehb", options(nomem, nostack)) };
    }

    fn local_irq_save(&self) -> usize {
        let status = read_c0!("12", "0");
        self.local_irq_disable();
        (status & 1) as usize
    }

    fn local_irq_restore(&self, flags: usize) {
        if flags & 1 != 0 {
            self.local_irq_enable();
        } else {
            self.local_irq_disable();
        }
    }

    fn read_prid(&self) -> u32 {
        read_c0!("15", "0")
    }

    fn pending_irq(&self) -> bool {
        let cause = read_c0!("13", "0");
        let status = read_c0!("12", "0");
        cause & status & CAUSEF_IP != 0
    }

    fn secondary_reentry(&self) {
        // Run the parking routine through its uncached alias; the cache
        // contents are not trustworthy across the power transition.
        let park: extern "C" fn() =
            unsafe { core::mem::transmute(kseg1addr(xburst_secondary_park as usize)) };
        park();
    }
}

impl CoreRegs for MipsXburst {
    fn read_corectrl(&self) -> CoreCtrl {
        CoreCtrl::from_bits_retain(read_c0!("12", "2"))
    }

    fn write_corectrl(&self, val: CoreCtrl) {
        write_c0!("12", "2", val.bits());
    }

    fn read_corestatus(&self) -> CoreStatus {
        CoreStatus::from_bits_retain(read_c0!("12", "3"))
    }

    fn write_corestatus(&self, val: CoreStatus) {
        write_c0!("12", "3", val.bits());
    }

    fn read_reim(&self) -> Reim {
        Reim::from_bits_retain(read_c0!("12", "4"))
    }

    fn write_reim(&self, val: Reim) {
        write_c0!("12", "4", val.bits());
    }

    fn read_mailbox(&self, cpu: usize) -> u32 {
        match cpu {
            0 => read_c0!("20", "0"),
            1 => read_c0!("20", "1"),
            2 => read_c0!("20", "2"),
            _ => read_c0!("20", "3"),
        }
    }

    fn write_mailbox(&self, cpu: usize, val: u32) {
        match cpu {
            0 => write_c0!("20", "0", val),
            1 => write_c0!("20", "1", val),
            2 => write_c0!("20", "2", val),
            _ => write_c0!("20", "3", val),
        }
    }

    fn write_entry_sp(&self, sp: u32) {
        XBURST_CPU_ENTRY_SP.store(sp, Ordering::Relaxed);
    }

    fn write_entry_gp(&self, gp: u32) {
        XBURST_CPU_ENTRY_GP.store(gp, Ordering::Relaxed);
    }

    fn read_entry_sp(&self) -> u32 {
        XBURST_CPU_ENTRY_SP.load(Ordering::Relaxed)
    }

    fn read_entry_gp(&self) -> u32 {
        XBURST_CPU_ENTRY_GP.load(Ordering::Relaxed)
    }

    fn unmask_int_levels(&self, levels: IntMask) {
        let status = read_c0!("12", "0");
        write_c0!("12", "0", status | levels.bits());
    }

    fn set_int_mask(&self, levels: IntMask) {
        let status = read_c0!("12", "0");
        write_c0!("12", "0", (status & !ST0_IM) | levels.bits());
    }
}

impl CacheIsa for MipsXburst {
    fn cache_op(&self, op: CacheOp, addr: usize) {
        match op {
            CacheOp::IndexInvI => cache_insn!("0x00", addr),
            CacheOp::IndexWritebackInvD => cache_insn!("0x01", addr),
            CacheOp::IndexWritebackInvSD => cache_insn!("0x03", addr),
            CacheOp::IndexLoadTagD => cache_insn!("0x05", addr),
            CacheOp::HitInvI => cache_insn!("0x10", addr),
            CacheOp::HitInvD => cache_insn!("0x11", addr),
            CacheOp::HitInvSD => cache_insn!("0x13", addr),
            CacheOp::HitWritebackInvD => cache_insn!("0x15", addr),
            CacheOp::HitWritebackInvSD => cache_insn!("0x17", addr),
            CacheOp::HitWritebackD => cache_insn!("0x19", addr),
            CacheOp::HitWritebackSD => cache_insn!("0x1b", addr),
        }
    }

    fn load_dcache_tag(&self, addr: usize) -> u32 {
        let tag: u32;
        unsafe {
            asm!(
                ".set push",
                ".set mips3",
                "cache 0x05, 0({addr})",
                "ehb",
                "mfc0 {tag}, $28, 0",
                ".set pop",
                addr = in(reg) addr,
                tag = out(reg) tag,
                options(nostack),
            )
        };
        tag
    }

    fn read_config(&self) -> u32 {
        read_c0!("16", "0")
    }

    fn write_config(&self, val: u32) {
        write_c0!("16", "0", val);
    }

    fn read_config1(&self) -> u32 {
        read_c0!("16", "1")
    }

    fn read_config2(&self) -> u32 {
        read_c0!("16", "2")
    }

    fn write_errctl(&self, val: u32) {
        write_c0!("26", "0", val);
    }
}
