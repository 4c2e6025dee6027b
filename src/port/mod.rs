//! Port layer - CPU-specific implementations
//!
//! Stack frame synthesis, first-task launch, the context-switch and tick
//! exceptions, and the switch-pend primitive. Everything else in the
//! scheduler is ordinary portable code.

#[cfg(target_arch = "arm")]
pub mod cortex_m;

#[cfg(target_arch = "arm")]
pub use cortex_m::*;

// Host stub so the scheduler state machine is drivable from unit tests.
#[cfg(not(target_arch = "arm"))]
pub mod stub {
    use crate::kern::types::{StackElem, TaskFn};

    /// No exception frame on the host; hand back the aligned stack top.
    pub unsafe fn init_task_stack(
        stk_base: *mut StackElem,
        stk_words: usize,
        _entry: TaskFn,
        _arg: *mut (),
    ) -> *mut StackElem {
        unsafe { stk_base.add(stk_words) }
    }

    /// Returns immediately so tests can keep driving the scheduler
    /// through `sched_switch_context` by hand.
    pub unsafe fn start_first_task() {}

    /// Switches on the host only happen when a test invokes them.
    pub fn pend_switch() {}

    pub fn systick_init(_reload: u32) {}
}

#[cfg(not(target_arch = "arm"))]
pub use stub::*;
