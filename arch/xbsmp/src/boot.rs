//! Secondary-core boot sequencing.
//!
//! A halted core walks Held-in-Reset → Clock-Ungated → Entry-Point-Armed
//! → Released-From-Reset → Running. The entry stack/global pointers are
//! handed over through shared scalars that the core reads as soon as it
//! leaves reset; only one boot is ever in flight, so the only ordering
//! requirement is the write barrier between the scalar writes and the
//! reset deassert.

use axerrno::AxResult;
use xbhal::regs::kseg1addr;
use xbhal::{CoreCtrl, CoreIsa, CoreRegs, CoreStatus, IntMask, NR_CPUS, Reim};

use crate::XburstSmp;

/// Stack and global pointers handed to a secondary core as it leaves
/// reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootHandoff {
    pub sp: u32,
    pub gp: u32,
}

impl XburstSmp {
    /// One-time bring-up on the primary core, before any secondary is
    /// released: arm the shared reset entry point and clear every
    /// mailbox, with this core's own mailbox interrupt masked across the
    /// window.
    pub fn smp_setup(&self, cpu: usize) {
        let mut reim = self.hw.read_reim();

        // mask mailbox interrupts for this core
        reim.remove(Reim::mboxirq_mask(cpu));
        self.hw.write_reim(reim);

        // clear mailboxes & pending mailbox IRQs
        for mbox in 0..NR_CPUS {
            self.hw.write_mailbox(mbox, 0);
        }
        self.hw.write_corestatus(CoreStatus::empty());

        // set the reset entry point
        let addr = kseg1addr(self.entry_stub) as u32;
        if addr & !Reim::ENTRY.bits() != 0 {
            warn!("secondary entry stub {addr:#x} has bits outside REIM.ENTRY");
        }
        reim = reim.with_entry(addr);

        // unmask mailbox interrupts for this core
        reim.insert(Reim::mboxirq_mask(cpu));
        self.hw.write_reim(reim);
        self.hw.unmask_int_levels(IntMask::IP3);

        self.running.set(cpu);
    }

    /// Resolve per-core resources for every core the firmware describes
    /// and point their reset vectors at the REIM entry.
    pub fn prepare_cpus(&self, max_cpus: usize) {
        if let Err(err) = self.kernel.register_mailbox_irq() {
            error!("core mailbox IRQ registration failed: {err:?}");
        }

        let mut inner = self.lock.lock();
        let mut ctrl = self.hw.read_corectrl();

        for cpu in 0..self.nr_present.min(max_cpus) {
            // use the reset entry point from the REIM register
            ctrl.insert(CoreCtrl::rpc(cpu));

            match self.kernel.cpu_clock(cpu) {
                Some(clk) => {
                    if let Err(err) = clk.prepare() {
                        error!("Failed to prepare CPU {cpu} clock gate: {err:?}");
                    }
                    inner.clock_gates[cpu] = Some(clk);
                }
                // Not every variant gates per-core clocks; carry on
                // without a handle.
                None => inner.clock_gates[cpu] = None,
            }
        }

        self.hw.write_corectrl(ctrl);
    }

    /// Release `cpu` from reset with `entry` as its initial stack and
    /// global pointers.
    ///
    /// The hardware reports nothing back synchronously; a core that
    /// never comes up is caught later by the scheduler's heartbeat, not
    /// here.
    pub fn boot_secondary(&self, cpu: usize, entry: BootHandoff) -> AxResult {
        if cpu >= NR_CPUS {
            panic!("unhandled cpu {cpu}!");
        }

        let inner = self.lock.lock();

        // ensure the core is in reset
        let mut ctrl = self.hw.read_corectrl();
        ctrl.insert(CoreCtrl::swrst(cpu));
        self.hw.write_corectrl(ctrl);

        // ungate the core clock
        if let Some(clk) = inner.clock_gates[cpu] {
            if let Err(err) = clk.enable() {
                error!("Failed to ungate CPU {cpu} clock: {err:?}");
            }
        }

        // The core reads these the moment it leaves reset; they must be
        // visible strictly before the deassert below.
        self.hw.write_entry_sp(entry.sp);
        self.hw.write_entry_gp(entry.gp);
        self.hw.wmb();

        // take the core out of reset
        ctrl.remove(CoreCtrl::swrst(cpu));
        self.hw.write_corectrl(ctrl);

        self.running.set(cpu);

        drop(inner);
        Ok(())
    }

    /// Early per-core init on the secondary itself, right after landing.
    pub fn init_secondary(&self, _cpu: usize) {}

    /// Finish bring-up on the secondary itself: unmask its mailbox line
    /// and the standard interrupt levels, then fall back to the
    /// broadcast timer.
    pub fn smp_finish(&self, cpu: usize) {
        {
            let _inner = self.lock.lock();
            let mut reim = self.hw.read_reim();
            reim.insert(Reim::mboxirq_mask(cpu));
            self.hw.write_reim(reim);
        }

        // unmask interrupts for this core
        self.hw
            .set_int_mask(IntMask::IP0 | IntMask::IP1 | IntMask::IP2 | IntMask::IP3);

        // force broadcast timer
        self.kernel.tick_broadcast_force();
    }
}
