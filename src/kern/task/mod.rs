//! Task management
//!
//! Creation, deletion, suspension and resumption. All resources come
//! from the static pools; none of these operations ever block.

mod pool;
mod tcb;

pub use pool::{StackPool, TaskStack, TcbPool};
pub use tcb::Tcb;

use core::ptr::NonNull;

use crate::kern::config::{CFG_DEFAULT_STACK_BYTES, CFG_MAX_PRIORITIES, CFG_STACK_WORDS, CFG_TIME_SLICE_TICKS};
use crate::kern::critical::{critical_section, is_isr_context};
use crate::kern::error::{SchedError, SchedResult};
use crate::kern::kernel;
use crate::kern::sched;
use crate::kern::types::{SchedPrio, TaskFn, TaskState};

/// Opaque handle to a live task
pub type TaskHandle = NonNull<Tcb>;

/// Create a task
///
/// Draws one TCB and one stack from the static pools, synthesizes the
/// initial exception frame and appends the task to the tail of its
/// priority's ready queue. If the scheduler is already running and the
/// new task outranks the running one, a switch is pended immediately.
///
/// `stack_size_hint` is accepted for API compatibility only: every pool
/// stack has the fixed size [`CFG_DEFAULT_STACK_BYTES`] and the hint is
/// silently ignored.
///
/// # Errors
/// * [`SchedError::PrioInvalid`] - priority out of range
/// * [`SchedError::IsrContext`] - called from an interrupt handler
/// * [`SchedError::NoFreeStack`] / [`SchedError::NoFreeTcb`] - pools exhausted
pub fn task_create(
    entry: TaskFn,
    name: &'static str,
    stack_size_hint: usize,
    arg: *mut (),
    prio: SchedPrio,
) -> SchedResult<TaskHandle> {
    let _ = stack_size_hint;

    if prio as usize >= CFG_MAX_PRIORITIES {
        return Err(SchedError::PrioInvalid);
    }
    if is_isr_context() {
        return Err(SchedError::IsrContext);
    }

    critical_section(|_cs| {
        let (slot, stack_base) = unsafe { kernel::stack_pool() }
            .alloc()
            .ok_or(SchedError::NoFreeStack)?;

        let Some(mut handle) = unsafe { kernel::tcb_pool() }.alloc() else {
            unsafe { kernel::stack_pool() }.release(slot);
            return Err(SchedError::NoFreeTcb);
        };

        let tcb = unsafe { handle.as_mut() };
        tcb.init();
        tcb.name = name;
        tcb.prio = prio;
        tcb.state = TaskState::Ready;
        tcb.slice = CFG_TIME_SLICE_TICKS;
        tcb.entry = Some(entry);
        tcb.arg = arg;
        tcb.stack_base = stack_base;
        tcb.stack_bytes = CFG_DEFAULT_STACK_BYTES;
        tcb.stack_slot = slot;
        tcb.sp = unsafe { crate::port::init_task_stack(stack_base, CFG_STACK_WORDS, entry, arg) };

        unsafe { sched::rdy_insert(handle) };

        crate::debug!("task created: {=str} prio {=u8}", name, prio);

        // Immediate preemption when the newcomer outranks the runner.
        if kernel::KERNEL.is_running() {
            if let Some(cur) = kernel::tcb_cur() {
                if prio > unsafe { cur.as_ref() }.prio {
                    crate::port::pend_switch();
                }
            }
        }

        Ok(handle)
    })
}

/// Delete a task
///
/// `None` deletes the calling task. The task is unlinked from any queue,
/// its TCB goes back on the free list and its state becomes Deleted.
/// Deleting the calling task pends a switch that never returns to it;
/// the stack slot of a self-deleted task is only recycled once that
/// switch has completed, because the switch exception still pushes a
/// hardware frame onto the dying stack.
pub fn task_delete(task: Option<TaskHandle>) -> SchedResult<()> {
    if !kernel::KERNEL.is_running() {
        return Err(SchedError::NotRunning);
    }
    if is_isr_context() {
        return Err(SchedError::IsrContext);
    }

    critical_section(|_cs| {
        let mut handle = match task {
            Some(handle) => handle,
            None => kernel::tcb_cur().ok_or(SchedError::TaskInvalid)?,
        };

        let tcb = unsafe { handle.as_mut() };
        if tcb.state == TaskState::Deleted {
            return Err(SchedError::TaskInvalid);
        }

        crate::debug!("task deleted: {=str}", tcb.name);

        if tcb.state == TaskState::Ready {
            unsafe { sched::rdy_remove(handle) };
        }

        let is_current = kernel::tcb_cur() == Some(handle);
        if is_current {
            // The dying stack takes one more hardware frame at the switch
            // exception entry; defer the slot release to the switch itself.
            unsafe {
                kernel::set_pending_stack_release(tcb.stack_slot);
                kernel::tcb_pool().release(handle);
            }
            kernel::set_tcb_cur(None);
            crate::port::pend_switch();
        } else {
            unsafe {
                kernel::stack_pool().release(tcb.stack_slot);
                kernel::tcb_pool().release(handle);
            }
        }

        Ok(())
    })
}

/// Suspend a task until [`task_resume`] is called for it
///
/// `None` suspends the calling task and pends a switch. Suspending a
/// Blocked task abandons its pending delay.
pub fn task_suspend(task: Option<TaskHandle>) -> SchedResult<()> {
    if !kernel::KERNEL.is_running() {
        return Err(SchedError::NotRunning);
    }
    if is_isr_context() {
        return Err(SchedError::IsrContext);
    }

    critical_section(|_cs| {
        let mut handle = match task {
            Some(handle) => handle,
            None => kernel::tcb_cur().ok_or(SchedError::TaskInvalid)?,
        };

        let tcb = unsafe { handle.as_mut() };
        match tcb.state {
            TaskState::Ready => {
                unsafe { sched::rdy_remove(handle) };
                tcb.state = TaskState::Suspended;
            }
            TaskState::Running => {
                // The runner is not in a ready queue; flipping its state
                // keeps the switch handler from re-queueing it.
                tcb.state = TaskState::Suspended;
                if kernel::tcb_cur() == Some(handle) {
                    crate::port::pend_switch();
                }
            }
            TaskState::Blocked => {
                tcb.state = TaskState::Suspended;
            }
            TaskState::Suspended => return Err(SchedError::AlreadySuspended),
            TaskState::Deleted => return Err(SchedError::TaskInvalid),
        }

        Ok(())
    })
}

/// Make a suspended task ready again
///
/// The task re-enters the tail of its priority's queue; if it outranks
/// the running task a switch is pended.
pub fn task_resume(task: TaskHandle) -> SchedResult<()> {
    if !kernel::KERNEL.is_running() {
        return Err(SchedError::NotRunning);
    }
    if is_isr_context() {
        return Err(SchedError::IsrContext);
    }

    critical_section(|_cs| {
        let mut handle = task;
        let tcb = unsafe { handle.as_mut() };

        if tcb.state != TaskState::Suspended {
            return Err(SchedError::NotSuspended);
        }

        tcb.state = TaskState::Ready;
        unsafe { sched::rdy_insert(handle) };

        if let Some(cur) = kernel::tcb_cur() {
            if tcb.prio > unsafe { cur.as_ref() }.prio {
                crate::port::pend_switch();
            }
        }

        Ok(())
    })
}
