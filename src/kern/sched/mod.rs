//! Scheduling decisions
//!
//! Next-task selection runs inside the context-switch exception. The
//! running task is modeled by the current-task pointer and is not held
//! in a ready queue; when displaced it is re-inserted at the tail of its
//! priority, which also realizes round-robin among equals.

pub mod rdy_queue;

pub use rdy_queue::{PrioBitmap, ReadyQueue};

use core::ptr::NonNull;

use crate::kern::config::CFG_TIME_SLICE_TICKS;
use crate::kern::kernel;
use crate::kern::task::{Tcb, TaskHandle};
use crate::kern::types::{StackElem, TaskState};

/// Currently running task, if multitasking has started
#[inline]
pub fn current_task() -> Option<TaskHandle> {
    kernel::tcb_cur()
}

/// Give up the processor voluntarily
///
/// Pends the context-switch exception and returns immediately; the
/// switch happens once the calling context unwinds far enough for the
/// exception to be taken. Safe from any context, including ISRs.
pub fn sched_yield() {
    if kernel::KERNEL.is_running() {
        crate::port::pend_switch();
    }
}

/// Link a task into the ready set.
///
/// # Safety
/// Caller must hold a critical section (or run in the switch handler)
/// and `tcb` must not already be linked into a list.
pub(crate) unsafe fn rdy_insert(tcb: NonNull<Tcb>) {
    let prio = unsafe { tcb.as_ref() }.prio;
    unsafe {
        kernel::rdy_queue(prio).insert_tail(tcb);
        kernel::prio_map().insert(prio);
    }
}

/// Unlink a task from the ready set, clearing the bitmap bit when its
/// queue drains.
///
/// # Safety
/// Caller must hold a critical section (or run in the switch handler).
pub(crate) unsafe fn rdy_remove(tcb: NonNull<Tcb>) {
    let prio = unsafe { tcb.as_ref() }.prio;
    unsafe {
        let queue = kernel::rdy_queue(prio);
        queue.remove(tcb);
        if queue.is_empty() {
            kernel::prio_map().remove(prio);
        }
    }
}

/// Select the next task to run; called by the context-switch exception.
///
/// Saves `cur_sp` into the outgoing TCB, re-queues the outgoing task if
/// it is still runnable, then hands back the stack pointer of the head
/// of the highest-priority ready queue with a fresh time slice. When
/// nothing is ready the outgoing task simply continues (the canonical
/// setup keeps an always-ready idle task at the lowest priority, so this
/// only happens before that task exists).
///
/// Also the reclamation point for the stack of a task that deleted
/// itself: the slot is freed here, after the exception entry pushed its
/// final hardware frame onto the dying stack.
///
/// # Safety
/// Must only be called with interrupts masked: from the switch exception
/// or from host-side tests driving the scheduler manually.
#[no_mangle]
pub unsafe extern "C" fn sched_switch_context(cur_sp: *mut StackElem) -> *mut StackElem {
    unsafe {
        if let Some(slot) = kernel::take_pending_stack_release() {
            kernel::stack_pool().release(slot);
        }

        let outgoing = kernel::tcb_cur();
        if let Some(mut cur) = outgoing {
            let t = cur.as_mut();
            t.sp = cur_sp;
            if t.state == TaskState::Running {
                t.state = TaskState::Ready;
                rdy_insert(cur);
            }
        }

        let Some(prio) = kernel::prio_map().highest() else {
            // Nothing ready: the outgoing task continues unchanged.
            if outgoing.is_some() {
                return cur_sp;
            }
            return core::ptr::null_mut();
        };

        // Head of the highest queue wins; taking it out (and re-inserting
        // displaced tasks at the tail above) rotates equals round-robin.
        let mut next = kernel::rdy_queue(prio).head().unwrap_unchecked();
        rdy_remove(next);

        let t = next.as_mut();
        t.state = TaskState::Running;
        t.slice = CFG_TIME_SLICE_TICKS;
        kernel::set_tcb_cur(Some(next));

        t.sp
    }
}
