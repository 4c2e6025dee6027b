//! hycore firmware core
//!
//! The two load-bearing subsystems of the firmware template:
//! - Preemptive fixed-priority task scheduling with round-robin
//!   time-slicing, tick-based delays and static resource pools
//! - HYlink framed-protocol parsing driven by a byte-at-a-time
//!   state machine with CRC16-CCITT body validation
//!
//! Board bring-up, UART transport and demo programs live outside this
//! crate; the parser only needs a byte source and the scheduler only
//! needs the SysTick/PendSV exceptions wired to its port layer.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod hylink;
pub mod kern;
pub mod port;

// ============ Re-exports ============

pub use kern::config;
pub use kern::config::*;
pub use kern::critical;
pub use kern::critical::{
    critical_nesting, critical_section, enter_critical, exit_critical, CriticalSection,
};
pub use kern::error;
pub use kern::error::{SchedError, SchedResult};
pub use kern::kernel;
pub use kern::kernel::{sched_init, sched_start};
pub use kern::sched;
pub use kern::sched::{current_task, sched_yield};
pub use kern::task;
pub use kern::task::{task_create, task_delete, task_resume, task_suspend, TaskHandle};
pub use kern::time;
pub use kern::time::{tick_count, time_delay};
pub use kern::types;
pub use kern::types::*;

pub use hylink::{HylinkPacket, HylinkParser};
