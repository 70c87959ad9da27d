//! CPU hotplug: take a core out of service, park it, gate its clock.

use axerrno::AxResult;
use xbhal::{CoreIsa, CoreRegs, CoreStatus, NR_CPUS, Reim};

use crate::XburstSmp;

impl XburstSmp {
    /// Take the calling core out of service. Runs on the target core
    /// with interrupts being disabled here; they stay off.
    ///
    /// If the core currently owns peripheral-IRQ routing, ownership goes
    /// back to the primary core.
    pub fn cpu_disable(&self, cpu: usize) -> AxResult {
        self.hw.local_irq_disable();

        self.kernel.set_cpu_online(cpu, false);

        let _inner = self.lock.lock();
        let mut reim = self.hw.read_reim();
        if reim.contains(Reim::irq_routing(cpu)) {
            reim.remove(Reim::irq_routing(cpu));
            // route to the primary core
            reim.insert(Reim::irq_routing(0));
            self.hw.write_reim(reim);
        }

        Ok(())
    }

    /// Wait for `cpu` to reach the parked state, then gate its clock.
    /// Runs on a surviving core.
    ///
    /// There is no timeout on the rendezvous: a core that never parks
    /// stalls the caller indefinitely, exactly as the hardware loop
    /// does.
    pub fn cpu_die(&self, cpu: usize) {
        let flags = self.hw.local_irq_save();

        self.running.clear(cpu);
        self.hw.wmb();

        while !self.hw.read_corestatus().contains(CoreStatus::sleep(cpu)) {
            core::hint::spin_loop();
        }

        let inner = self.lock.lock();
        if let Some(clk) = inner.clock_gates[cpu] {
            clk.disable();
        }
        drop(inner);

        self.hw.local_irq_restore(flags);
    }

    /// Park the calling core until a future hotplug-in request. Never
    /// returns; re-entry into the kernel happens through the uncached
    /// landing stub.
    pub fn play_dead(&self, cpu: usize) -> ! {
        self.prepare_play_dead(cpu);
        loop {
            self.play_dead_step(cpu);
        }
    }

    pub(crate) fn prepare_play_dead(&self, cpu: usize) {
        if cpu >= NR_CPUS {
            panic!("unhandled cpu {cpu}!");
        }

        self.hw.local_irq_disable();

        let _inner = self.lock.lock();
        self.hw.write_mailbox(cpu, 0);

        // clear this core's pending mailbox bit
        let mut status = self.hw.read_corestatus();
        status.remove(CoreStatus::mirq_pending(cpu));
        self.hw.write_corestatus(status);
    }

    pub(crate) fn play_dead_step(&self, cpu: usize) {
        // A future boot_secondary on this index sets the running bit
        // again.
        while !self.running.contains(cpu) {
            core::hint::spin_loop();
        }

        // Nothing in the caches survives the power transition reliably.
        self.cache.local_flush_all();
        self.hw.secondary_reentry();
    }
}
