//! Cortex-M port implementation
//!
//! Context switching runs through the PendSV exception, the periodic
//! tick through SysTick. Both live at the lowest exception priority so
//! application critical sections reliably hold them off and neither can
//! preempt the other mid-handler. The layout of the synthesized frame
//! avoids FPU lazy-stacking assumptions, so the port also serves
//! FPU-less ARMv7-M parts.

use core::arch::naked_asm;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;

use crate::kern::types::{StackElem, TaskFn};

/// Initial xPSR: Thumb state bit set, everything else clear
const INITIAL_XPSR: u32 = 0x0100_0000;

/// Exception-return cookie: resume thread mode on the process stack
const INITIAL_EXC_RETURN: u32 = 0xFFFF_FFFD;

/// Layout of a freshly synthesized context, lowest address first.
///
/// The top eight words are the hardware exception frame the CPU pops on
/// exception return; below them sit the software-saved registers and the
/// exception-return cookie that PendSV transfers with `stmdb`/`ldmia`.
#[repr(C, align(4))]
struct InitFrame {
    r4: u32,
    r5: u32,
    r6: u32,
    r7: u32,
    r8: u32,
    r9: u32,
    r10: u32,
    r11: u32,
    exc_return: u32,
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}

const FRAME_WORDS: usize = 17;

/// Synthesize the initial exception frame for a task
///
/// Returning from PendSV into this frame starts `entry(arg)` in thread
/// mode on the process stack. The LR slot carries the return trap so a
/// task that falls off the end of its entry halts deterministically.
///
/// Returns the stack pointer to store in the TCB.
///
/// # Safety
/// `stk_base..stk_base + stk_words` must be a valid, exclusively owned
/// stack region.
pub unsafe fn init_task_stack(
    stk_base: *mut StackElem,
    stk_words: usize,
    entry: TaskFn,
    arg: *mut (),
) -> *mut StackElem {
    unsafe {
        let stk_top = stk_base.add(stk_words);
        // Hardware pushes the exception frame onto an 8-byte boundary.
        let stk_aligned = ((stk_top as usize) & !7) as *mut u32;

        let frame_ptr = stk_aligned.sub(FRAME_WORDS) as *mut InitFrame;

        (*frame_ptr) = InitFrame {
            r4: 0,
            r5: 0,
            r6: 0,
            r7: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            exc_return: INITIAL_EXC_RETURN,
            r0: arg as u32,
            r1: 0,
            r2: 0,
            r3: 0,
            r12: 0,
            lr: task_return_trap as *const () as u32,
            pc: (entry as usize as u32) | 1, // Thumb bit
            xpsr: INITIAL_XPSR,
        };

        frame_ptr as *mut StackElem
    }
}

/// Program SysTick for the periodic tick and drop both scheduler
/// exceptions to the lowest priority
///
/// Masks interrupts for the remainder of startup: the process stack is
/// not live yet, so no tick may pend a switch until the first task
/// launch re-enables interrupts.
///
/// # Arguments
/// * `cnts` - core-clock cycles per tick, e.g. `CPU_HZ / TICK_HZ`
pub fn systick_init(cnts: u32) {
    cortex_m::interrupt::disable();

    let mut p = unsafe { cortex_m::Peripherals::steal() };

    unsafe {
        p.SCB.set_priority(SystemHandler::PendSV, 0xFF);
        p.SCB.set_priority(SystemHandler::SysTick, 0xFF);
    }

    p.SYST.set_reload(cnts - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

/// Pend the context-switch exception
///
/// Safe from any context, including ISRs; the switch is taken once no
/// higher-priority exception is active.
#[inline(always)]
pub fn pend_switch() {
    cortex_m::peripheral::SCB::set_pendsv();
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

/// Launch the first task; never returns
///
/// Consumes the software half of the synthesized frame, points PSP at
/// the hardware half, switches thread mode onto the process stack,
/// enables interrupts and branches into the task entry.
///
/// # Safety
/// The current-task pointer must name a task with a freshly synthesized
/// frame. Must be called exactly once, from thread mode on the main
/// stack.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn start_first_task() {
    naked_asm!(
        "bl {first_sp}",
        // Drop the software frame: zeroed R4-R11 plus the cookie.
        "ldmia r0!, {{r4-r11, lr}}",
        "msr psp, r0",
        "isb",
        // Thread mode runs on PSP from here on.
        "movs r0, #2",
        "msr control, r0",
        "isb",
        // Consume the hardware frame by hand: R0 gets the task argument,
        // LR the return trap, then entry PC and xPSR.
        "pop {{r0-r3, r12, lr}}",
        "pop {{r4, r5}}",
        "cpsie i",
        "cpsie f",
        "dsb",
        "isb",
        "bx r4",
        first_sp = sym first_task_sp,
    );
}

/// Stack pointer of the task selected to run first
#[no_mangle]
extern "C" fn first_task_sp() -> *mut StackElem {
    unsafe { (*crate::kern::kernel::CURRENT_TCB).sp }
}

/// PendSV exception handler - the context switch
///
/// 1. Save R4-R11 and the exception-return cookie onto the outgoing
///    task's process stack (skipped when no task owns the CPU: first
///    launch, or the outgoing task deleted itself)
/// 2. Let the scheduler pick the next task and bank the outgoing stack
///    pointer
/// 3. Restore the incoming frame and exception-return through its cookie
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "mrs r0, psp",
        "isb",
        "ldr r1, ={current}",
        "ldr r1, [r1]",
        "cbz r1, 1f",
        "stmdb r0!, {{r4-r11, lr}}",
        "1:",
        "bl {switch}",
        "cbz r0, 2f",
        "ldmia r0!, {{r4-r11, lr}}",
        "msr psp, r0",
        "dsb",
        "isb",
        "cpsie i",
        "bx lr",
        // No runnable task and no outgoing context: nothing to return
        // into, so halt.
        "2:",
        "b {trap}",
        current = sym crate::kern::kernel::CURRENT_TCB,
        switch = sym crate::kern::sched::sched_switch_context,
        trap = sym task_return_trap,
    );
}

/// SysTick exception handler - the periodic tick
#[no_mangle]
pub extern "C" fn SysTick() {
    crate::kern::time::tick_handler();
}

/// Trap for a task that returns from its entry function
///
/// Installed as the LR of every initial frame. Masks interrupts and
/// parks the CPU.
#[no_mangle]
pub extern "C" fn task_return_trap() -> ! {
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::nop();
    }
}
