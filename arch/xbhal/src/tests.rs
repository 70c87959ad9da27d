#![cfg(test)]

use crate::machine::CpuGeneration;
use crate::regs::*;
use crate::sim::{SimEvent, SimReg, SimXburst};
use crate::{CacheIsa, CoreIsa, CoreRegs};

#[test]
fn test_corectrl_per_core_bits() {
    assert_eq!(CoreCtrl::swrst(0), CoreCtrl::SWRST0);
    assert_eq!(CoreCtrl::swrst(3), CoreCtrl::SWRST3);
    assert_eq!(CoreCtrl::rpc(2), CoreCtrl::RPC2);
    assert_eq!(CoreStatus::mirq_pending(1), CoreStatus::MIRQ1P);
    assert_eq!(CoreStatus::sleep(2), CoreStatus::SLEEP2);
    assert_eq!(Reim::mboxirq_mask(3), Reim::MBOXIRQ3M);
    assert_eq!(Reim::irq_routing(1), Reim::IRQ1M);
}

#[test]
fn test_reim_entry_field() {
    let reim = Reim::from_bits_retain(0x0000_030f);
    let armed = reim.with_entry(0xbfc1_2345);
    // Only the upper halfword lands in ENTRY; the mask bits survive.
    assert_eq!(armed.entry(), 0xbfc1_0000);
    assert_eq!(armed.bits() & 0xffff, 0x030f);
}

#[test]
fn test_kseg1_alias() {
    assert_eq!(kseg1addr(0x8001_2340), 0xa001_2340);
    assert_eq!(kseg1addr(0x0001_2340), 0xa001_2340);
}

#[test]
fn test_generation_from_prid() {
    assert_eq!(
        CpuGeneration::from_prid(PRID_COMP_INGENIC_D0 | PRID_IMP_XBURST_REV1),
        Some(CpuGeneration::XBurst)
    );
    assert_eq!(
        CpuGeneration::from_prid(PRID_COMP_INGENIC_D1 | PRID_IMP_XBURST_REV2),
        Some(CpuGeneration::XBurst)
    );
    assert_eq!(
        CpuGeneration::from_prid(PRID_COMP_INGENIC_13 | PRID_IMP_XBURST2),
        Some(CpuGeneration::XBurst2)
    );
    assert_eq!(CpuGeneration::from_prid(0x0001_8000), None);
}

#[test]
fn test_sim_mailboxes_are_independent() {
    let hw = SimXburst::new();
    hw.write_mailbox(0, 0x1);
    hw.write_mailbox(2, 0x3);
    assert_eq!(hw.read_mailbox(0), 0x1);
    assert_eq!(hw.read_mailbox(1), 0);
    assert_eq!(hw.read_mailbox(2), 0x3);
    assert_eq!(hw.read_mailbox(3), 0);
}

#[test]
fn test_sim_event_log_order() {
    let hw = SimXburst::new();
    hw.write_entry_sp(0x8080_0000);
    hw.wmb();
    hw.write_corectrl(CoreCtrl::SWRST1);
    let events = hw.events();
    assert_eq!(
        events,
        vec![
            SimEvent::RegWrite { reg: SimReg::EntrySp, val: 0x8080_0000 },
            SimEvent::Wmb,
            SimEvent::RegWrite { reg: SimReg::CoreCtrl, val: CoreCtrl::SWRST1.bits() },
        ]
    );
}

#[test]
fn test_sim_wback_inv_writes_dirty_line_back() {
    let hw = SimXburst::new();
    hw.plant_dline(0x8000_0100, 0xdead_beef, true);
    hw.cache_op(CacheOp::HitWritebackInvD, 0x8000_0104);
    assert_eq!(hw.mem_word(0x8000_0100), Some(0xdead_beef));
    assert!(hw.dline(0x8000_0100).is_none());
}

#[test]
fn test_sim_invalidate_discards_dirty_data() {
    let hw = SimXburst::new();
    hw.set_mem_word(0x8000_0200, 0x1111_1111);
    hw.plant_dline(0x8000_0200, 0x2222_2222, true);
    hw.cache_op(CacheOp::HitInvD, 0x8000_0200);
    // A bare invalidate loses the dirty data; memory keeps the stale word.
    assert_eq!(hw.mem_word(0x8000_0200), Some(0x1111_1111));
    assert!(hw.dline(0x8000_0200).is_none());
}

#[test]
fn test_sim_writeback_keeps_line_clean() {
    let hw = SimXburst::new();
    hw.plant_dline(0x8000_0300, 0x3333_3333, true);
    hw.cache_op(CacheOp::HitWritebackD, 0x8000_0300);
    assert_eq!(hw.mem_word(0x8000_0300), Some(0x3333_3333));
    let line = hw.dline(0x8000_0300).unwrap();
    assert!(!line.dirty);
}

#[test]
fn test_sim_index_wback_inv_clears_dirty_tag() {
    let hw = SimXburst::new();
    hw.plant_dtag(0x8000_0400, XBURST_TAGLO_DIRTY_MASK | 0x30);
    hw.cache_op(CacheOp::IndexWritebackInvD, 0x8000_0400);
    assert_eq!(hw.dtag(0x8000_0400), 0x30);
}

#[test]
fn test_sim_irq_depth_tracking() {
    let hw = SimXburst::new();
    assert_eq!(hw.irq_disable_depth(), 0);
    let flags = hw.local_irq_save();
    hw.local_irq_disable();
    assert_eq!(hw.irq_disable_depth(), 2);
    hw.local_irq_enable();
    hw.local_irq_restore(flags);
    assert_eq!(hw.irq_disable_depth(), 0);
}

#[test]
fn test_sim_config_encoding_roundtrip() {
    // 32 KiB, 4-way, 256-set, 32-byte-line primary caches.
    let c1 = SimXburst::encode_config1(32, 256, 4, 32, 256, 4, true);
    assert_eq!(2 << ((c1 >> 19) & 7), 32);
    assert_eq!(32 << (((c1 >> 22) + 1) & 7), 256);
    assert_eq!(1 + ((c1 >> 16) & 7), 4);
    assert_eq!(2 << ((c1 >> 10) & 7), 32);
    assert_eq!(32 << (((c1 >> 13) + 1) & 7), 256);
    assert_eq!(1 + ((c1 >> 7) & 7), 4);
    assert!(c1 & MIPS_CONF_M != 0);

    let c2 = SimXburst::encode_config2(32, 1024, 8);
    assert_eq!(2 << ((c2 >> 4) & 0xf), 32);
    assert_eq!(64 << ((c2 >> 8) & 0xf), 1024);
    assert_eq!(1 + (c2 & 0xf), 8);
}
