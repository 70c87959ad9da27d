//! Mailbox IPI transport.
//!
//! Senders merge action bits into the target core's mailbox register;
//! the target's interrupt handler reads and clears its own mailbox and
//! pending bit, then dispatches. Both sides take the global SMP lock:
//! sender and receiver read-modify-write overlapping mailbox and status
//! bits.

use bitflags::bitflags;
use xbhal::{CoreRegs, CoreStatus, NR_CPUS};

use crate::{CpuMask, XburstSmp};

bitflags! {
    /// Cross-core request bits posted through a mailbox register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IpiAction: u32 {
        /// Ask the target core's scheduler to reschedule.
        const RESCHEDULE = 1 << 0;
        /// Ask the target core to drain the deferred-call queue.
        const CALL_FUNCTION = 1 << 1;
    }
}

impl XburstSmp {
    fn send_ipi_single_locked(&self, cpu: usize, action: IpiAction) {
        if cpu >= NR_CPUS {
            panic!("unhandled cpu {cpu}!");
        }
        let mbox = self.hw.read_mailbox(cpu);
        self.hw.write_mailbox(cpu, mbox | action.bits());
    }

    /// Post `action` to one core. Fire-and-forget: delivery is signalled
    /// by the target's mailbox interrupt, nothing is awaited here.
    pub fn send_ipi_single(&self, cpu: usize, action: IpiAction) {
        let _inner = self.lock.lock();
        self.send_ipi_single_locked(cpu, action);
    }

    /// Post `action` to every core in `mask`, holding the lock once for
    /// the whole batch.
    pub fn send_ipi_mask(&self, mask: CpuMask, action: IpiAction) {
        let _inner = self.lock.lock();
        for cpu in mask.iter() {
            self.send_ipi_single_locked(cpu, action);
        }
    }

    /// Mailbox interrupt handler. Runs on the core that took the
    /// interrupt; `cpu` is that core's index.
    pub fn mbox_handler(&self, cpu: usize) {
        if cpu >= NR_CPUS {
            panic!("unhandled cpu {cpu}!");
        }

        let action = {
            let _inner = self.lock.lock();

            let action = self.hw.read_mailbox(cpu);
            self.hw.write_mailbox(cpu, 0);

            // clear the pending mailbox interrupt
            let mut status = self.hw.read_corestatus();
            status.remove(CoreStatus::mirq_pending(cpu));
            self.hw.write_corestatus(status);

            IpiAction::from_bits_retain(action)
        };

        if action.is_empty() {
            debug!("spurious mailbox interrupt on CPU {cpu}");
            return;
        }

        if action.contains(IpiAction::RESCHEDULE) {
            self.kernel.scheduler_ipi();
        }
        if action.contains(IpiAction::CALL_FUNCTION) {
            self.kernel.call_function_ipi();
        }
    }
}
