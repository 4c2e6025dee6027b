//! Time management
//!
//! Tick accounting, task delays and the periodic tick routine. The tick
//! counter is a free-running 32-bit value; every deadline comparison
//! goes through [`tick_reached`] so delays straddling the wrap still
//! fire.

use core::ptr::NonNull;

use crate::kern::config::CFG_MAX_TASKS;
use crate::kern::critical::{critical_section, is_isr_context};
use crate::kern::error::{SchedError, SchedResult};
use crate::kern::kernel;
use crate::kern::sched;
use crate::kern::types::{SchedTick, TaskState};

/// Current tick count; callable from any context
#[inline]
pub fn tick_count() -> SchedTick {
    kernel::KERNEL.tick_get()
}

/// Wrap-safe deadline test: has `deadline` arrived at time `now`?
///
/// Signed-difference compare, so it stays correct when the tick counter
/// wraps between scheduling a delay and its expiry.
#[inline]
pub fn tick_reached(now: SchedTick, deadline: SchedTick) -> bool {
    now.wrapping_sub(deadline) as i32 >= 0
}

/// Block the calling task for `ticks` ticks
///
/// `ticks == 0` is a no-op. Otherwise the task records its absolute wake
/// tick, leaves the running state and a switch is pended; the tick
/// routine makes it ready again once the wake tick arrives.
pub fn time_delay(ticks: SchedTick) -> SchedResult<()> {
    if !kernel::KERNEL.is_running() {
        return Err(SchedError::NotRunning);
    }
    if is_isr_context() {
        return Err(SchedError::IsrContext);
    }
    if ticks == 0 {
        return Ok(());
    }

    critical_section(|_cs| {
        let mut cur = kernel::tcb_cur().ok_or(SchedError::TaskInvalid)?;
        let tcb = unsafe { cur.as_mut() };

        // The runner is not held in a ready queue, so blocking is just a
        // state change plus the wake bookkeeping.
        tcb.wake_tick = kernel::KERNEL.tick_get().wrapping_add(ticks);
        tcb.state = TaskState::Blocked;

        crate::port::pend_switch();
        Ok(())
    })
}

/// Periodic tick routine; invoked by the tick exception
///
/// Advances the tick counter, wakes Blocked tasks whose deadline has
/// arrived, charges the running task's time slice, and pends a switch
/// when a waker outranks the runner or the slice ran out.
pub fn tick_handler() {
    if !kernel::KERNEL.is_running() {
        return;
    }

    let now = kernel::KERNEL.tick_increment();

    critical_section(|_cs| {
        let cur = kernel::tcb_cur();
        let cur_prio = cur.map(|t| unsafe { t.as_ref() }.prio);

        let mut need_switch = false;

        // Age the delayed tasks. The pool is scanned by index so each
        // iteration takes a fresh short borrow of the scheduler state.
        for idx in 0..CFG_MAX_TASKS {
            let tcb = unsafe { kernel::tcb_pool() }.get(idx);
            if tcb.state == TaskState::Blocked && tick_reached(now, tcb.wake_tick) {
                tcb.state = TaskState::Ready;
                let waker_prio = tcb.prio;
                unsafe { sched::rdy_insert(NonNull::from(tcb)) };
                if cur_prio.map_or(true, |p| waker_prio > p) {
                    need_switch = true;
                }
            }
        }

        // Round-robin accounting for the runner; the slice is recharged
        // when the task is next scheduled.
        if let Some(mut cur) = cur {
            let tcb = unsafe { cur.as_mut() };
            if tcb.slice > 0 {
                tcb.slice -= 1;
            }
            if tcb.slice == 0 {
                need_switch = true;
            }
        }

        if need_switch {
            crate::port::pend_switch();
        }
    });
}
