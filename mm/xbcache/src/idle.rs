//! Idle-path cache write-back.
//!
//! The CPU and cache clocks are gated while a core sits in `wait`. If
//! another core then misses on a line that is dirty in the gated core's
//! data cache, the snoop/refill traffic is never answered and that core
//! locks up. Dirty lines therefore have to be written back before every
//! entry into `wait`.

use xbhal::CoreIsa;

use crate::CacheSystem;
use crate::blast::wback_dirty_lines;

impl CacheSystem {
    /// Enter the low-power wait state with interrupts already disabled.
    ///
    /// Idle entry carries the cost of the dirty-line pass, so it is
    /// skipped when work is already pending or an interrupt is latched
    /// and the core would wake immediately anyway. Interrupts are
    /// re-enabled on the way out.
    pub fn wait_irqoff(&self, work_pending: bool) {
        if !work_pending && !self.hw.pending_irq() {
            wback_dirty_lines(self.hw, &self.hier.dcache);

            self.hw.sync();
            self.hw.wait_for_interrupt();
        }

        self.hw.local_irq_enable();
    }
}
