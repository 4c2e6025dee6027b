//! Nestable critical sections
//!
//! Mutual exclusion against interrupts and preemption. Entries nest; only
//! the outermost exit re-enables interrupts, and only when they were
//! enabled before the outermost entry. Legal from thread and ISR context.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Nesting depth of the global critical section
static NESTING: AtomicU32 = AtomicU32::new(0);

/// Interrupt-enable state captured at the outermost entry
static OUTER_IRQ_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Disable interrupts and bump the nesting depth.
///
/// Safe to call with interrupts already disabled; the prior enable state
/// is remembered from the outermost call only.
pub fn enter_critical() {
    #[cfg(target_arch = "arm")]
    {
        let was_active = cortex_m::register::primask::read().is_active();
        cortex_m::interrupt::disable();
        if NESTING.fetch_add(1, Ordering::SeqCst) == 0 {
            OUTER_IRQ_ACTIVE.store(was_active, Ordering::SeqCst);
        }
    }

    #[cfg(not(target_arch = "arm"))]
    {
        if NESTING.fetch_add(1, Ordering::SeqCst) == 0 {
            OUTER_IRQ_ACTIVE.store(true, Ordering::SeqCst);
        }
    }
}

/// Drop one nesting level; the outermost exit restores the interrupt
/// state captured on entry.
pub fn exit_critical() {
    let depth = NESTING.load(Ordering::SeqCst);
    if depth == 0 {
        return;
    }

    NESTING.store(depth - 1, Ordering::SeqCst);

    if depth == 1 && OUTER_IRQ_ACTIVE.load(Ordering::SeqCst) {
        #[cfg(target_arch = "arm")]
        unsafe {
            cortex_m::interrupt::enable()
        }
    }
}

/// Current critical-section nesting depth
#[inline]
pub fn critical_nesting() -> u32 {
    NESTING.load(Ordering::SeqCst)
}

/// Forget any leftover nesting (scheduler re-initialization only).
/// Does not touch the interrupt mask.
pub(crate) fn reset_nesting() {
    NESTING.store(0, Ordering::SeqCst);
}

/// RAII guard for a critical section
///
/// Interrupts are disabled while at least one guard is alive.
pub struct CriticalSection {
    _private: (),
}

impl CriticalSection {
    /// Enter a critical section, returning a guard that exits on drop.
    #[inline(always)]
    pub fn enter() -> Self {
        enter_critical();
        CriticalSection { _private: () }
    }
}

impl Drop for CriticalSection {
    #[inline(always)]
    fn drop(&mut self) {
        exit_critical();
    }
}

/// Execute a closure with interrupts disabled
///
/// The closure receives a reference to the guard, which unlocks
/// [`CsCell`](crate::kern::cs_cell::CsCell) protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let cs = CriticalSection::enter();
    f(&cs)
}

/// Check if currently executing in an ISR context
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}
