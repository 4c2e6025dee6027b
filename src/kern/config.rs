//! Compile-time configuration
//!
//! These constants control the resource limits and timing behavior of
//! the scheduler and the HYlink parser.

/// Maximum number of tasks (TCB pool and stack pool size)
pub const CFG_MAX_TASKS: usize = 16;

/// Number of priority levels; valid priorities are 0..CFG_MAX_PRIORITIES,
/// with the higher number being the more urgent task
pub const CFG_MAX_PRIORITIES: usize = 8;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Round-robin quantum in ticks
pub const CFG_TIME_SLICE_TICKS: u32 = 10;

/// Size of every pool stack in bytes (8-byte aligned)
pub const CFG_DEFAULT_STACK_BYTES: usize = 1024;

/// Pool stack size in 32-bit words
pub const CFG_STACK_WORDS: usize = CFG_DEFAULT_STACK_BYTES / 4;

/// Largest HYlink payload the parser will accept
pub const CFG_MAX_PAYLOAD_BYTES: usize = 1024;

/// Core clock feeding SysTick
pub const CFG_CPU_CLOCK_HZ: u32 = 16_000_000;

const _: () = assert!(CFG_MAX_PRIORITIES <= 32, "priority bitmap is a single 32-bit word");
const _: () = assert!(CFG_MAX_TASKS <= 32, "stack allocation bitmap is a single 32-bit word");
const _: () = assert!(CFG_DEFAULT_STACK_BYTES % 8 == 0, "pool stacks must stay 8-byte aligned");
