//! Task Control Block (TCB) definition

use core::ptr::NonNull;

use crate::kern::types::{SchedPrio, SchedTick, StackElem, TaskFn, TaskState};

/// Task Control Block
///
/// One per task, drawn from the static TCB pool. Mutated by the
/// scheduler only. The `next` link threads the TCB through exactly one
/// list at a time: a ready queue while Ready, or the pool free list
/// while Deleted.
#[repr(C)]
pub struct Tcb {
    /// Saved stack pointer; valid whenever the task is not Running
    pub sp: *mut StackElem,

    /// Base of the task's pool stack
    pub stack_base: *mut StackElem,
    /// Stack size in bytes
    pub stack_bytes: usize,
    /// Which pool stack slot this task owns
    pub stack_slot: u8,

    /// Entry function
    pub entry: Option<TaskFn>,
    /// Opaque argument handed to the entry function
    pub arg: *mut (),

    /// Priority; higher numeric value wins
    pub prio: SchedPrio,
    /// Current lifecycle state
    pub state: TaskState,

    /// Remaining round-robin quantum in ticks
    pub slice: SchedTick,
    /// Absolute tick at which a Blocked task becomes Ready again
    pub wake_tick: SchedTick,

    /// Task name for debugging
    pub name: &'static str,

    /// Intrusive link for the ready queue / free list
    pub next: Option<NonNull<Tcb>>,
}

impl Tcb {
    /// Create an empty TCB
    pub const fn new() -> Self {
        Tcb {
            sp: core::ptr::null_mut(),
            stack_base: core::ptr::null_mut(),
            stack_bytes: 0,
            stack_slot: 0,
            entry: None,
            arg: core::ptr::null_mut(),
            prio: 0,
            state: TaskState::Deleted,
            slice: 0,
            wake_tick: 0,
            name: "",
            next: None,
        }
    }

    /// Reset to the pristine state
    pub fn init(&mut self) {
        *self = Self::new();
    }

    /// Check if the task is waiting in a ready queue
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Ready
    }

    /// Check if the task is delayed
    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.state == TaskState::Blocked
    }
}

impl Default for Tcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for Tcb {}
unsafe impl Sync for Tcb {}
