// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! SMP backend for the multi-core Ingenic XBurst parts.
//!
//! Cross-core signalling runs through per-core hardware mailbox registers:
//! a sender merges request bits into the target's mailbox and the target's
//! interrupt handler decodes and clears them. Secondary cores are brought
//! up by a reset/clock-gate sequence with a stack/global-pointer handoff
//! through shared scalars, and taken down again by the hotplug path, which
//! parks the core and gates its clock.
//!
//! Every mailbox, core-control and REIM read-modify-write in the cluster
//! is serialized by one global spinlock owned by [`XburstSmp`]; the
//! running mask is readable lock-free.
//!
//! The generic scheduler/topology layer consumes this backend as a
//! [`SmpOps`] table through [`register_smp_ops`]. All operations that run
//! "on the calling core" take that core's index explicitly.

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;

use axerrno::AxResult;
use kspin::SpinNoIrq;
use lazyinit::LazyInit;
use xbhal::{CoreRegs, NR_CPUS};

mod boot;
mod hotplug;
mod mailbox;
mod topology;

#[cfg(test)]
mod tests;

pub use boot::BootHandoff;
pub use mailbox::IpiAction;
pub use topology::CpuMask;

use topology::AtomicCpuMask;

/// A per-core clock gate resolved from the clock tree.
pub trait CpuClock: Sync {
    fn prepare(&self) -> AxResult;
    fn enable(&self) -> AxResult;
    fn disable(&self);
}

/// Services this backend consumes from the surrounding kernel.
pub trait KernelServices: Sync {
    /// The scheduler's cross-core wake path.
    fn scheduler_ipi(&self);

    /// Drain the generic deferred-call queue.
    fn call_function_ipi(&self);

    /// Force broadcast-timer mode; a freshly started core has no
    /// warmed-up local clock-event device yet.
    fn tick_broadcast_force(&self);

    /// Flip a core's scheduler-visible online bit.
    fn set_cpu_online(&self, cpu: usize, online: bool);

    /// Register the per-CPU mailbox interrupt line to
    /// [`XburstSmp::mbox_handler`]. Failure leaves SMP degraded but is
    /// not fatal.
    fn register_mailbox_irq(&self) -> AxResult;

    /// Resolve the clock gate of `cpu`, if the part has one.
    fn cpu_clock(&self, cpu: usize) -> Option<&'static dyn CpuClock>;
}

/// The platform SMP operation set registered with the generic layer.
pub trait SmpOps: Sync {
    fn send_ipi_single(&self, cpu: usize, action: IpiAction);
    fn send_ipi_mask(&self, mask: CpuMask, action: IpiAction);
    fn smp_setup(&self, cpu: usize);
    fn prepare_cpus(&self, max_cpus: usize);
    fn boot_secondary(&self, cpu: usize, entry: BootHandoff) -> AxResult;
    fn init_secondary(&self, cpu: usize);
    fn smp_finish(&self, cpu: usize);
    fn cpu_disable(&self, cpu: usize) -> AxResult;
    fn cpu_die(&self, cpu: usize);
}

/// State mutated only under the global SMP lock.
struct SmpInner {
    clock_gates: [Option<&'static dyn CpuClock>; NR_CPUS],
}

/// The cluster topology: hardware handles, the running mask and the
/// per-core clock gates, behind the one global SMP lock.
pub struct XburstSmp {
    hw: &'static dyn CoreRegs,
    kernel: &'static dyn KernelServices,
    cache: &'static xbcache::CacheSystem,
    nr_present: usize,
    entry_stub: usize,
    running: AtomicCpuMask,
    lock: SpinNoIrq<SmpInner>,
}

impl XburstSmp {
    /// Build the topology for `nr_present` cores described by the
    /// firmware, with `entry_stub` as the shared secondary landing
    /// routine.
    pub fn new(
        hw: &'static dyn CoreRegs,
        kernel: &'static dyn KernelServices,
        cache: &'static xbcache::CacheSystem,
        nr_present: usize,
        entry_stub: usize,
    ) -> Self {
        let nr_present = if nr_present > NR_CPUS {
            warn!("firmware describes {nr_present} cores, hardware addresses {NR_CPUS}");
            NR_CPUS
        } else {
            nr_present
        };

        Self {
            hw,
            kernel,
            cache,
            nr_present,
            entry_stub,
            running: AtomicCpuMask::new(),
            lock: SpinNoIrq::new(SmpInner {
                clock_gates: [None; NR_CPUS],
            }),
        }
    }

    /// Whether `cpu` is currently marked running.
    pub fn cpu_running(&self, cpu: usize) -> bool {
        self.running.contains(cpu)
    }

    /// Snapshot of the running mask.
    pub fn running_mask(&self) -> CpuMask {
        self.running.snapshot()
    }

    /// Number of cores described by the firmware.
    pub fn nr_present(&self) -> usize {
        self.nr_present
    }
}

impl SmpOps for XburstSmp {
    fn send_ipi_single(&self, cpu: usize, action: IpiAction) {
        XburstSmp::send_ipi_single(self, cpu, action)
    }

    fn send_ipi_mask(&self, mask: CpuMask, action: IpiAction) {
        XburstSmp::send_ipi_mask(self, mask, action)
    }

    fn smp_setup(&self, cpu: usize) {
        XburstSmp::smp_setup(self, cpu)
    }

    fn prepare_cpus(&self, max_cpus: usize) {
        XburstSmp::prepare_cpus(self, max_cpus)
    }

    fn boot_secondary(&self, cpu: usize, entry: BootHandoff) -> AxResult {
        XburstSmp::boot_secondary(self, cpu, entry)
    }

    fn init_secondary(&self, cpu: usize) {
        XburstSmp::init_secondary(self, cpu)
    }

    fn smp_finish(&self, cpu: usize) {
        XburstSmp::smp_finish(self, cpu)
    }

    fn cpu_disable(&self, cpu: usize) -> AxResult {
        XburstSmp::cpu_disable(self, cpu)
    }

    fn cpu_die(&self, cpu: usize) {
        XburstSmp::cpu_die(self, cpu)
    }
}

static SMP_OPS: LazyInit<&'static dyn SmpOps> = LazyInit::new();

/// Register the platform's SMP operation table. Called once at boot by
/// the platform init code.
pub fn register_smp_ops(ops: &'static dyn SmpOps) {
    SMP_OPS.init_once(ops);
    info!("XBurst SMP operations registered");
}

/// The registered SMP operation table.
pub fn smp_ops() -> &'static dyn SmpOps {
    *SMP_OPS
}
