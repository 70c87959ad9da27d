// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! XBurst CP0 core bank and cache instruction encodings.
//!
//! The multi-core JZ4780/X-series parts expose their cross-core plumbing
//! through a small bank of CP0 registers: one mailbox word per core
//! ($20 sel 0..3), a shared core-control register ($12 sel 2), a core-status
//! register ($12 sel 3) and the reset-entry/IRQ-mask register ($12 sel 4).
//! These are physical device registers; the bit layout below must match the
//! silicon exactly.

use bitflags::bitflags;

/// Number of cores the CP0 bank can address. The register layout reserves
/// one mailbox and one bit column per core; no XBurst part has more.
pub const NR_CPUS: usize = 4;

/// Base of the unmapped, cached kernel window used for index-type cache
/// operations.
pub const INDEX_BASE: usize = 0x8000_0000;

/// Translate an address into the unmapped, uncached window.
pub const fn kseg1addr(addr: usize) -> usize {
    (addr & 0x1fff_ffff) | 0xa000_0000
}

bitflags! {
    /// Core Control register (CP0 $12 sel 2).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CoreCtrl: u32 {
        /// Software reset assert, one bit per core.
        const SWRST0 = 1 << 0;
        const SWRST1 = 1 << 1;
        const SWRST2 = 1 << 2;
        const SWRST3 = 1 << 3;
        /// Fetch the reset entry point from REIM.ENTRY, one bit per core.
        const RPC0 = 1 << 8;
        const RPC1 = 1 << 9;
        const RPC2 = 1 << 10;
        const RPC3 = 1 << 11;
        /// Allow the core to gate its clock during `wait`.
        const SLEEP0M = 1 << 16;
        const SLEEP1M = 1 << 17;
        const SLEEP2M = 1 << 18;
        const SLEEP3M = 1 << 19;
    }
}

impl CoreCtrl {
    /// Reset-assert bit for `cpu`.
    pub fn swrst(cpu: usize) -> Self {
        Self::from_bits_retain(Self::SWRST0.bits() << cpu)
    }

    /// Reset-entry-from-REIM bit for `cpu`.
    pub fn rpc(cpu: usize) -> Self {
        Self::from_bits_retain(Self::RPC0.bits() << cpu)
    }
}

bitflags! {
    /// Core Status register (CP0 $12 sel 3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CoreStatus: u32 {
        /// Mailbox IRQ pending, one bit per core.
        const MIRQ0P = 1 << 0;
        const MIRQ1P = 1 << 1;
        const MIRQ2P = 1 << 2;
        const MIRQ3P = 1 << 3;
        /// Peripheral IRQ pending, one bit per core.
        const IRQ0P = 1 << 8;
        const IRQ1P = 1 << 9;
        const IRQ2P = 1 << 10;
        const IRQ3P = 1 << 11;
        /// Core has parked in the low-power wait state.
        const SLEEP0 = 1 << 16;
        const SLEEP1 = 1 << 17;
        const SLEEP2 = 1 << 18;
        const SLEEP3 = 1 << 19;
    }
}

impl CoreStatus {
    /// Mailbox-IRQ-pending bit for `cpu`.
    pub fn mirq_pending(cpu: usize) -> Self {
        Self::from_bits_retain(Self::MIRQ0P.bits() << cpu)
    }

    /// Parked-in-wait bit for `cpu`.
    pub fn sleep(cpu: usize) -> Self {
        Self::from_bits_retain(Self::SLEEP0.bits() << cpu)
    }
}

bitflags! {
    /// Reset Entry & IRQ Mask register (CP0 $12 sel 4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Reim: u32 {
        /// Mailbox IRQ unmask, one bit per core.
        const MBOXIRQ0M = 1 << 0;
        const MBOXIRQ1M = 1 << 1;
        const MBOXIRQ2M = 1 << 2;
        const MBOXIRQ3M = 1 << 3;
        /// Peripheral IRQ routing, one bit per core.
        const IRQ0M = 1 << 8;
        const IRQ1M = 1 << 9;
        const IRQ2M = 1 << 10;
        const IRQ3M = 1 << 11;
        /// Reset entry point, upper 16 address bits.
        const ENTRY = 0xffff << 16;
    }
}

impl Reim {
    /// Mailbox-IRQ-unmask bit for `cpu`.
    pub fn mboxirq_mask(cpu: usize) -> Self {
        Self::from_bits_retain(Self::MBOXIRQ0M.bits() << cpu)
    }

    /// Peripheral-IRQ-routing bit for `cpu`.
    pub fn irq_routing(cpu: usize) -> Self {
        Self::from_bits_retain(Self::IRQ0M.bits() << cpu)
    }

    /// The reset entry point held in the ENTRY field.
    pub fn entry(self) -> u32 {
        self.bits() & Self::ENTRY.bits()
    }

    /// Replace the ENTRY field with the page of `addr`.
    pub fn with_entry(self, addr: u32) -> Self {
        Self::from_bits_retain((self.bits() & !Self::ENTRY.bits()) | (addr & Self::ENTRY.bits()))
    }
}

bitflags! {
    /// Interrupt lines in the CP0 Status.IM field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IntMask: u32 {
        const IP0 = 1 << 8;
        const IP1 = 1 << 9;
        const IP2 = 1 << 10;
        /// The mailbox interrupt arrives on hardware line 3.
        const IP3 = 1 << 11;
        const IP4 = 1 << 12;
        const IP5 = 1 << 13;
        const IP6 = 1 << 14;
        const IP7 = 1 << 15;
    }
}

/// MIPS `cache` instruction operation encodings used on XBurst.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    IndexInvI = 0x00,
    IndexWritebackInvD = 0x01,
    IndexWritebackInvSD = 0x03,
    IndexLoadTagD = 0x05,
    HitInvI = 0x10,
    HitInvD = 0x11,
    HitInvSD = 0x13,
    HitWritebackInvD = 0x15,
    HitWritebackInvSD = 0x17,
    HitWritebackD = 0x19,
    HitWritebackSD = 0x1b,
}

/// Ingenic-specific dirty bits in TagLo after an `IndexLoadTagD`.
pub const XBURST_TAGLO_DIRTY_MASK: u32 = 0xc;

/// ErrCtl write-allocate (WST) control values, toggled around
/// invalidating DMA passes on the first-generation core.
pub const ERRCTL_WST_EN: u32 = 1 << 29;
pub const ERRCTL_WST_DIS: u32 = 0;

/// Config.K0 cacheability attribute field.
pub const CONF_CM_CMASK: u32 = 0x7;

/// Config1.M: a Config2 register is implemented.
pub const MIPS_CONF_M: u32 = 1 << 31;

/// PRId company/implementation fields.
pub const PRID_COMP_MASK: u32 = 0xff_0000;
pub const PRID_IMP_MASK: u32 = 0xff00;

pub const PRID_COMP_INGENIC_13: u32 = 0x13_0000;
pub const PRID_COMP_INGENIC_D0: u32 = 0xd0_0000;
pub const PRID_COMP_INGENIC_D1: u32 = 0xd1_0000;
pub const PRID_COMP_INGENIC_E1: u32 = 0xe1_0000;

pub const PRID_IMP_XBURST_REV1: u32 = 0x0200;
pub const PRID_IMP_XBURST_REV2: u32 = 0x0100;
pub const PRID_IMP_XBURST2: u32 = 0x2000;
