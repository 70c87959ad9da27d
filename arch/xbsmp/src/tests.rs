#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, mpsc};
use std::thread;

use axerrno::{AxError, AxResult};
use xbhal::regs::kseg1addr;
use xbhal::sim::{SimEvent, SimReg, SimXburst};
use xbhal::{CoreCtrl, CoreRegs, CoreStatus, IntMask, MachineType, NR_CPUS, Reim};

use super::*;

const ENTRY_STUB: usize = 0x8010_0000;

fn leak<T>(val: T) -> &'static T {
    Box::leak(Box::new(val))
}

/// Single-core coherency domain; the cache crate covers the broadcast
/// paths.
struct NullDomain;

impl xbcache::CoherencyDomain for NullDomain {
    fn peers_online(&self) -> bool {
        false
    }

    fn cross_call(&self, _f: &(dyn Fn() + Sync)) {}
}

#[derive(Default)]
struct MockClock {
    prepare_calls: AtomicUsize,
    enable_calls: AtomicUsize,
    disable_calls: AtomicUsize,
    fail_prepare: bool,
}

impl MockClock {
    fn failing_prepare() -> Self {
        Self { fail_prepare: true, ..Self::default() }
    }
}

impl CpuClock for MockClock {
    fn prepare(&self) -> AxResult {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_prepare {
            Err(AxError::BadState)
        } else {
            Ok(())
        }
    }

    fn enable(&self) -> AxResult {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self) {
        self.disable_calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockKernel {
    sched_ipis: AtomicUsize,
    call_fn_ipis: AtomicUsize,
    tick_broadcasts: AtomicUsize,
    online_events: Mutex<Vec<(usize, bool)>>,
    irq_requests: AtomicUsize,
    irq_ok: bool,
    clocks: [Option<&'static MockClock>; NR_CPUS],
}

impl MockKernel {
    fn new() -> Self {
        Self {
            sched_ipis: AtomicUsize::new(0),
            call_fn_ipis: AtomicUsize::new(0),
            tick_broadcasts: AtomicUsize::new(0),
            online_events: Mutex::new(Vec::new()),
            irq_requests: AtomicUsize::new(0),
            irq_ok: true,
            clocks: [None; NR_CPUS],
        }
    }

    fn with_clocks(clocks: [Option<&'static MockClock>; NR_CPUS]) -> Self {
        Self { clocks, ..Self::new() }
    }
}

impl KernelServices for MockKernel {
    fn scheduler_ipi(&self) {
        self.sched_ipis.fetch_add(1, Ordering::SeqCst);
    }

    fn call_function_ipi(&self) {
        self.call_fn_ipis.fetch_add(1, Ordering::SeqCst);
    }

    fn tick_broadcast_force(&self) {
        self.tick_broadcasts.fetch_add(1, Ordering::SeqCst);
    }

    fn set_cpu_online(&self, cpu: usize, online: bool) {
        self.online_events.lock().unwrap().push((cpu, online));
    }

    fn register_mailbox_irq(&self) -> AxResult {
        self.irq_requests.fetch_add(1, Ordering::SeqCst);
        if self.irq_ok { Ok(()) } else { Err(AxError::BadState) }
    }

    fn cpu_clock(&self, cpu: usize) -> Option<&'static dyn CpuClock> {
        self.clocks[cpu].map(|clk| clk as &'static dyn CpuClock)
    }
}

struct Harness {
    hw: &'static SimXburst,
    kernel: &'static MockKernel,
    smp: &'static XburstSmp,
}

fn harness(kernel: MockKernel) -> Harness {
    let hw = leak(SimXburst::new());
    hw.set_config1(SimXburst::encode_config1(32, 32, 1, 32, 32, 1, false));
    let cache = leak(xbcache::CacheSystem::new(hw, leak(NullDomain), MachineType::Jz4780));
    let kernel = leak(kernel);
    let smp = leak(XburstSmp::new(hw, kernel, cache, NR_CPUS, ENTRY_STUB));
    hw.clear_events();
    Harness { hw, kernel, smp }
}

#[test]
fn test_mailbox_round_trip() {
    let h = harness(MockKernel::new());

    for cpu in 0..NR_CPUS {
        h.smp.send_ipi_single(cpu, IpiAction::RESCHEDULE);
        assert_eq!(h.hw.read_mailbox(cpu), IpiAction::RESCHEDULE.bits());

        // hardware latches the pending bit alongside the interrupt
        let status = h.hw.read_corestatus();
        h.hw.write_corestatus(status | CoreStatus::mirq_pending(cpu));

        h.smp.mbox_handler(cpu);
        assert_eq!(h.hw.read_mailbox(cpu), 0);
        assert!(!h.hw.read_corestatus().contains(CoreStatus::mirq_pending(cpu)));
    }

    assert_eq!(h.kernel.sched_ipis.load(Ordering::SeqCst), NR_CPUS);
    assert_eq!(h.kernel.call_fn_ipis.load(Ordering::SeqCst), 0);
}

#[test]
fn test_mailbox_merges_actions_under_lock() {
    let h = harness(MockKernel::new());

    h.smp.send_ipi_single(1, IpiAction::RESCHEDULE);
    h.smp.send_ipi_single(1, IpiAction::CALL_FUNCTION);
    assert_eq!(
        h.hw.read_mailbox(1),
        (IpiAction::RESCHEDULE | IpiAction::CALL_FUNCTION).bits()
    );

    h.smp.mbox_handler(1);
    // one delivery dispatches each requested action exactly once
    assert_eq!(h.kernel.sched_ipis.load(Ordering::SeqCst), 1);
    assert_eq!(h.kernel.call_fn_ipis.load(Ordering::SeqCst), 1);
    assert_eq!(h.hw.read_mailbox(1), 0);
}

#[test]
fn test_send_ipi_mask_targets_only_masked_cores() {
    let h = harness(MockKernel::new());

    let mask = CpuMask::from_bits(0b0110);
    h.smp.send_ipi_mask(mask, IpiAction::CALL_FUNCTION);

    assert_eq!(h.hw.read_mailbox(0), 0);
    assert_eq!(h.hw.read_mailbox(1), IpiAction::CALL_FUNCTION.bits());
    assert_eq!(h.hw.read_mailbox(2), IpiAction::CALL_FUNCTION.bits());
    assert_eq!(h.hw.read_mailbox(3), 0);
}

#[test]
fn test_spurious_mailbox_interrupt_is_not_fatal() {
    let h = harness(MockKernel::new());

    h.smp.mbox_handler(2);
    assert_eq!(h.kernel.sched_ipis.load(Ordering::SeqCst), 0);
    assert_eq!(h.kernel.call_fn_ipis.load(Ordering::SeqCst), 0);
}

#[test]
#[should_panic(expected = "unhandled cpu")]
fn test_send_ipi_unknown_core_is_fatal() {
    let h = harness(MockKernel::new());
    h.smp.send_ipi_single(7, IpiAction::RESCHEDULE);
}

#[test]
fn test_smp_setup_arms_entry_and_clears_mailboxes() {
    let h = harness(MockKernel::new());

    for cpu in 0..NR_CPUS {
        h.hw.write_mailbox(cpu, 0xdead);
    }
    h.hw.write_corestatus(CoreStatus::MIRQ0P | CoreStatus::MIRQ1P);

    h.smp.smp_setup(0);

    for cpu in 0..NR_CPUS {
        assert_eq!(h.hw.read_mailbox(cpu), 0);
    }
    assert_eq!(h.hw.read_corestatus(), CoreStatus::empty());

    let reim = h.hw.read_reim();
    assert_eq!(reim.entry(), kseg1addr(ENTRY_STUB) as u32);
    assert!(reim.contains(Reim::mboxirq_mask(0)));
    assert!(h.hw.last_int_mask().contains(IntMask::IP3));
    assert!(h.smp.cpu_running(0));
}

#[test]
fn test_prepare_cpus_tolerates_missing_and_failing_clock_gates() {
    let clk1 = leak(MockClock::default());
    let clk3 = leak(MockClock::failing_prepare());
    let h = harness(MockKernel::with_clocks([None, Some(clk1), None, Some(clk3)]));

    h.smp.prepare_cpus(NR_CPUS);

    assert_eq!(h.kernel.irq_requests.load(Ordering::SeqCst), 1);
    let ctrl = h.hw.read_corectrl();
    for cpu in 0..NR_CPUS {
        assert!(ctrl.contains(CoreCtrl::rpc(cpu)));
    }
    assert_eq!(clk1.prepare_calls.load(Ordering::SeqCst), 1);
    // the failing gate is still attempted and the failure tolerated
    assert_eq!(clk3.prepare_calls.load(Ordering::SeqCst), 1);

    // booting a core with no gate works; some variants have none
    h.smp
        .boot_secondary(2, BootHandoff { sp: 0x8400_0000, gp: 0x8400_2000 })
        .unwrap();
    assert!(h.smp.cpu_running(2));
}

#[test]
fn test_prepare_cpus_survives_irq_registration_failure() {
    let mut kernel = MockKernel::new();
    kernel.irq_ok = false;
    let h = harness(kernel);

    h.smp.prepare_cpus(NR_CPUS);
    assert_eq!(h.kernel.irq_requests.load(Ordering::SeqCst), 1);
}

#[test]
fn test_boot_secondary_handoff_ordering() {
    let clk1 = leak(MockClock::default());
    let h = harness(MockKernel::with_clocks([None, Some(clk1), None, None]));
    h.smp.prepare_cpus(NR_CPUS);
    h.hw.clear_events();

    h.smp
        .boot_secondary(1, BootHandoff { sp: 0x1111_0000, gp: 0x2222_0000 })
        .unwrap();

    let events = h.hw.events();
    let pos = |ev: SimEvent| events.iter().position(|e| *e == ev).unwrap();

    let assert_pos = events
        .iter()
        .position(|e| matches!(e, SimEvent::RegWrite { reg: SimReg::CoreCtrl, val }
            if CoreCtrl::from_bits_retain(*val).contains(CoreCtrl::SWRST1)))
        .expect("reset must be asserted first");
    let sp_pos = pos(SimEvent::RegWrite { reg: SimReg::EntrySp, val: 0x1111_0000 });
    let gp_pos = pos(SimEvent::RegWrite { reg: SimReg::EntryGp, val: 0x2222_0000 });
    let wmb_pos = pos(SimEvent::Wmb);
    let deassert_pos = events
        .iter()
        .rposition(|e| matches!(e, SimEvent::RegWrite { reg: SimReg::CoreCtrl, val }
            if !CoreCtrl::from_bits_retain(*val).contains(CoreCtrl::SWRST1)))
        .expect("reset must be deasserted last");

    assert!(assert_pos < sp_pos);
    assert!(sp_pos < gp_pos);
    assert!(gp_pos < wmb_pos);
    assert!(wmb_pos < deassert_pos);

    assert_eq!(clk1.enable_calls.load(Ordering::SeqCst), 1);
    assert!(h.smp.cpu_running(1));
}

#[test]
fn test_boot_handoff_rendezvous_sees_matching_values() {
    let h = harness(MockKernel::new());
    let (hw, smp) = (h.hw, h.smp);

    // One boot is in flight at a time; each simulated secondary must
    // observe the handoff values of its own boot, never a later one.
    for (cpu, sp) in [(1usize, 0x1010_0000u32), (2, 0x2020_0000)] {
        let mut ctrl = hw.read_corectrl();
        ctrl.insert(CoreCtrl::swrst(cpu));
        hw.write_corectrl(ctrl);

        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            scope.spawn(move || {
                while hw.read_corectrl().contains(CoreCtrl::swrst(cpu)) {
                    thread::yield_now();
                }
                tx.send((hw.read_entry_sp(), hw.read_entry_gp())).unwrap();
            });

            smp.boot_secondary(cpu, BootHandoff { sp, gp: sp ^ 0xffff }).unwrap();
        });

        let (seen_sp, seen_gp) = rx.recv().unwrap();
        assert_eq!(seen_sp, sp);
        assert_eq!(seen_gp, sp ^ 0xffff);
    }
}

#[test]
fn test_smp_finish_unmasks_and_forces_broadcast_timer() {
    let h = harness(MockKernel::new());

    h.smp.smp_finish(2);

    assert!(h.hw.read_reim().contains(Reim::mboxirq_mask(2)));
    assert_eq!(
        h.hw.last_int_mask(),
        IntMask::IP0 | IntMask::IP1 | IntMask::IP2 | IntMask::IP3
    );
    assert_eq!(h.kernel.tick_broadcasts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hotplug_lifecycle() {
    let clk1 = leak(MockClock::default());
    let h = harness(MockKernel::with_clocks([None, Some(clk1), None, None]));
    h.smp.prepare_cpus(NR_CPUS);

    h.smp
        .boot_secondary(1, BootHandoff { sp: 0x8400_0000, gp: 0x8400_2000 })
        .unwrap();
    assert!(h.smp.cpu_running(1));

    // the dying core owns some peripheral IRQ routing
    let reim = h.hw.read_reim();
    h.hw.write_reim(reim | Reim::irq_routing(1));

    h.smp.cpu_disable(1).unwrap();
    assert_eq!(*h.kernel.online_events.lock().unwrap(), vec![(1, false)]);
    let reim = h.hw.read_reim();
    assert!(!reim.contains(Reim::irq_routing(1)));
    assert!(reim.contains(Reim::irq_routing(0)));

    // die() spins until the hardware reports the core parked
    thread::scope(|scope| {
        scope.spawn(|| h.smp.cpu_die(1));
        let status = h.hw.read_corestatus();
        h.hw.write_corestatus(status | CoreStatus::sleep(1));
    });

    assert!(!h.smp.cpu_running(1));
    assert_eq!(clk1.disable_calls.load(Ordering::SeqCst), 1);

    // the index is reusable after death
    h.smp
        .boot_secondary(1, BootHandoff { sp: 0x8500_0000, gp: 0x8500_2000 })
        .unwrap();
    assert!(h.smp.cpu_running(1));
    assert_eq!(clk1.enable_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_play_dead_clears_mailbox_and_reenters() {
    let h = harness(MockKernel::new());

    h.smp
        .boot_secondary(1, BootHandoff { sp: 0x8400_0000, gp: 0x8400_2000 })
        .unwrap();

    h.hw.write_mailbox(1, 0x3);
    let status = h.hw.read_corestatus();
    h.hw.write_corestatus(status | CoreStatus::mirq_pending(1));

    h.smp.prepare_play_dead(1);
    assert_eq!(h.hw.read_mailbox(1), 0);
    assert!(!h.hw.read_corestatus().contains(CoreStatus::mirq_pending(1)));

    h.hw.clear_events();
    // running bit is set, so one parking iteration completes immediately
    h.smp.play_dead_step(1);

    let events = h.hw.events();
    assert!(events.iter().any(|ev| matches!(ev, SimEvent::CacheOp { .. })));
    assert_eq!(*events.last().unwrap(), SimEvent::Reenter);
}

#[test]
fn test_nr_present_is_clamped_to_hardware_limit() {
    let hw = leak(SimXburst::new());
    hw.set_config1(SimXburst::encode_config1(32, 32, 1, 32, 32, 1, false));
    let cache = leak(xbcache::CacheSystem::new(hw, leak(NullDomain), MachineType::Jz4780));
    let smp = XburstSmp::new(hw, leak(MockKernel::new()), cache, 8, ENTRY_STUB);
    assert_eq!(smp.nr_present(), NR_CPUS);
}

#[test]
fn test_registered_ops_table_dispatches() {
    let h = harness(MockKernel::new());

    register_smp_ops(h.smp);
    smp_ops().send_ipi_single(3, IpiAction::CALL_FUNCTION);
    assert_eq!(h.hw.read_mailbox(3), IpiAction::CALL_FUNCTION.bits());
}
