//! Error types for the scheduler core
//!
//! Recoverable failures are plain `Result` values; there is no unwinding.

/// Scheduler error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SchedError {
    // ============ Lifecycle errors ============
    /// Scheduler has not been initialized
    NotInit = 100,
    /// Scheduler is already running
    Running = 101,
    /// Scheduler is not running yet
    NotRunning = 102,
    /// No task is ready to run
    NoTaskReady = 103,

    // ============ Resource errors ============
    /// TCB pool exhausted
    NoFreeTcb = 200,
    /// Stack pool exhausted
    NoFreeStack = 201,

    // ============ Argument errors ============
    /// Priority outside 0..CFG_MAX_PRIORITIES
    PrioInvalid = 300,
    /// Handle does not name a live task
    TaskInvalid = 301,

    // ============ State errors ============
    /// Task is not suspended
    NotSuspended = 400,
    /// Task is already suspended
    AlreadySuspended = 401,

    // ============ Context errors ============
    /// Operation is not legal from interrupt context
    IsrContext = 500,
}

/// Result type alias for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;
