//! Global kernel state, initialization and startup

use core::ptr::NonNull;

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::kern::config::{
    CFG_CPU_CLOCK_HZ, CFG_MAX_PRIORITIES, CFG_TICK_RATE_HZ, CFG_TIME_SLICE_TICKS,
};
use crate::kern::critical::{critical_section, reset_nesting};
use crate::kern::cs_cell::CsCell;
use crate::kern::error::{SchedError, SchedResult};
use crate::kern::sched::rdy_queue::{PrioBitmap, ReadyQueue};
use crate::kern::task::{StackPool, Tcb, TcbPool};
use crate::kern::types::{SchedPrio, SchedTick, TaskState};

// ============ Kernel flags ============

/// Atomic kernel flags
pub struct KernelFlags {
    initialized: AtomicBool,
    running: AtomicBool,
    tick: AtomicU32,
}

impl KernelFlags {
    const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            tick: AtomicU32::new(0),
        }
    }

    pub(crate) fn reset(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.tick.store(0, Ordering::SeqCst);
    }

    /// Check if multitasking has been started
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check if the kernel has been initialized
    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Current tick count
    #[inline(always)]
    pub fn tick_get(&self) -> SchedTick {
        self.tick.load(Ordering::Relaxed)
    }

    /// Advance the tick counter, returning the new value
    #[inline(always)]
    pub(crate) fn tick_increment(&self) -> SchedTick {
        self.tick.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    #[inline(always)]
    pub(crate) fn set_initialized(&self, val: bool) {
        self.initialized.store(val, Ordering::SeqCst);
    }

    #[inline(always)]
    pub(crate) fn set_running(&self, val: bool) {
        self.running.store(val, Ordering::SeqCst);
    }
}

/// Global kernel flags instance
pub static KERNEL: KernelFlags = KernelFlags::new();

// ============ Scheduler state ============

/// Everything the scheduler mutates under interrupt protection
pub struct SchedState {
    pub(crate) prio_map: PrioBitmap,
    pub(crate) ready: [ReadyQueue; CFG_MAX_PRIORITIES],
    pub(crate) tcb_pool: TcbPool,
    pub(crate) stack_pool: StackPool,
    /// Stack slot of a task that deleted itself, freed at the next switch
    pub(crate) pending_stack_release: Option<u8>,
}

impl SchedState {
    const fn new() -> Self {
        Self {
            prio_map: PrioBitmap::new(),
            ready: [const { ReadyQueue::new() }; CFG_MAX_PRIORITIES],
            tcb_pool: TcbPool::new(),
            stack_pool: StackPool::new(),
            pending_stack_release: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.prio_map.init();
        for queue in self.ready.iter_mut() {
            queue.init();
        }
        self.tcb_pool.init();
        self.stack_pool.init();
        self.pending_stack_release = None;
    }
}

/// Global scheduler state instance
pub(crate) static SCHED: CsCell<SchedState> = CsCell::new(SchedState::new());

/// Currently running task, or null before start and while a self-deleted
/// task is draining out through the switch exception. Read by the PendSV
/// handler to decide whether a context save is owed.
#[no_mangle]
pub static mut CURRENT_TCB: *mut Tcb = core::ptr::null_mut();

// ============ Internal accessors ============
//
// Short-lived borrows of the scheduler state for use inside critical
// sections or from the switch handler. Callers must not hold one across
// a call that takes another.

#[inline(always)]
pub(crate) unsafe fn prio_map() -> &'static mut PrioBitmap {
    unsafe { &mut SCHED.get_unchecked().prio_map }
}

#[inline(always)]
pub(crate) unsafe fn rdy_queue(prio: SchedPrio) -> &'static mut ReadyQueue {
    unsafe { &mut SCHED.get_unchecked().ready[prio as usize] }
}

#[inline(always)]
pub(crate) unsafe fn tcb_pool() -> &'static mut TcbPool {
    unsafe { &mut SCHED.get_unchecked().tcb_pool }
}

#[inline(always)]
pub(crate) unsafe fn stack_pool() -> &'static mut StackPool {
    unsafe { &mut SCHED.get_unchecked().stack_pool }
}

#[inline(always)]
pub(crate) unsafe fn set_pending_stack_release(slot: u8) {
    unsafe { SCHED.get_unchecked().pending_stack_release = Some(slot) };
}

#[inline(always)]
pub(crate) unsafe fn take_pending_stack_release() -> Option<u8> {
    unsafe { SCHED.get_unchecked().pending_stack_release.take() }
}

/// Currently running task as a pointer option
#[inline]
pub(crate) fn tcb_cur() -> Option<NonNull<Tcb>> {
    NonNull::new(unsafe { CURRENT_TCB })
}

#[inline]
pub(crate) fn set_tcb_cur(tcb: Option<NonNull<Tcb>>) {
    unsafe { CURRENT_TCB = tcb.map_or(core::ptr::null_mut(), |p| p.as_ptr()) };
}

// ============ Public API ============

/// Initialize the scheduler
///
/// Clears the pools, ready set, tick counter and critical-section
/// nesting. Must be called before any task is created; idempotent until
/// [`sched_start`] succeeds.
pub fn sched_init() -> SchedResult<()> {
    KERNEL.reset();
    reset_nesting();

    if KERNEL.is_running() {
        return Err(SchedError::Running);
    }

    critical_section(|cs| {
        SCHED.get(cs).reset();
        set_tcb_cur(None);
        KERNEL.set_initialized(true);
    });

    crate::debug!("scheduler initialized");
    Ok(())
}

/// Start multitasking
///
/// Picks the highest-priority ready task, programs the tick timer and
/// launches the task through the port layer. On hardware this call never
/// returns; an always-ready task at the lowest priority (an idle task)
/// must exist among the created tasks to guarantee forward progress.
pub fn sched_start() -> SchedResult<()> {
    if !KERNEL.is_initialized() {
        return Err(SchedError::NotInit);
    }
    if KERNEL.is_running() {
        return Err(SchedError::Running);
    }

    critical_section(|_cs| {
        let prio = unsafe { prio_map() }.highest().ok_or(SchedError::NoTaskReady)?;

        let mut first = unsafe { rdy_queue(prio) }.head().ok_or(SchedError::NoTaskReady)?;
        unsafe {
            crate::kern::sched::rdy_remove(first);
            let t = first.as_mut();
            t.state = TaskState::Running;
            t.slice = CFG_TIME_SLICE_TICKS;
        }
        set_tcb_cur(Some(first));

        KERNEL.set_running(true);
        Ok(())
    })?;

    crate::info!("scheduler started");

    crate::port::systick_init(CFG_CPU_CLOCK_HZ / CFG_TICK_RATE_HZ);

    // Never returns on hardware; the host stub falls through so unit
    // tests can keep driving the scheduler state machine.
    unsafe { crate::port::start_first_task() };

    Ok(())
}
