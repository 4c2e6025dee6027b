//! Core type definitions for the scheduler

/// Task priority; higher numeric value means higher urgency
pub type SchedPrio = u8;

/// Tick counter type (free-running, wraps)
pub type SchedTick = u32;

/// Stack element type
pub type StackElem = u32;

/// Task entry point; tasks never return (a returning task lands in the
/// port's return trap, which halts the CPU)
pub type TaskFn = fn(*mut ()) -> !;

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Waiting in a ready queue
    Ready = 0,
    /// Currently executing (held in the current-task pointer, not in a
    /// ready queue)
    Running = 1,
    /// Delayed until the wake tick arrives
    Blocked = 2,
    /// Withheld from scheduling until resumed
    Suspended = 3,
    /// TCB returned to the free pool
    Deleted = 4,
}
