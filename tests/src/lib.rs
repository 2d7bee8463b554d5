//! rtsched Test Suite
//!
//! This crate tests the scheduling core by directly including its source
//! files. This bypasses no_std restrictions while testing the actual
//! scheduling logic.
//!
//! # How it works
//! 1. We define stub macros (kinfo!, ktrace!, etc.) that map to eprintln! or no-op
//! 2. We use `#[path = "..."]` to include the core's source files directly
//! 3. The `core::` references in the sources work because std re-exports core
//!
//! This allows testing real scheduler code without a target platform.

// Re-export alloc crate for code that uses alloc::vec, alloc::boxed, etc.
extern crate alloc;

// ===========================================================================
// Logging macro stubs - these replace the core's logging macros for testing
// ===========================================================================

/// Stub for kinfo! - prints to stderr in tests
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        #[cfg(test)]
        eprintln!("[INFO] {}", format_args!($($arg)*));
    }};
}

/// Stub for ktrace! - no-op in tests (too verbose)
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{}};
}

/// Stub for kwarn! - prints to stderr in tests
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        #[cfg(test)]
        eprintln!("[WARN] {}", format_args!($($arg)*));
    }};
}

/// Stub for kerror! - prints to stderr in tests
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        #[cfg(test)]
        eprintln!("[ERROR] {}", format_args!($($arg)*));
    }};
}

/// Stub for kfatal! - prints to stderr in tests
#[macro_export]
macro_rules! kfatal {
    ($($arg:tt)*) => {{
        #[cfg(test)]
        eprintln!("[FATAL] {}", format_args!($($arg)*));
    }};
}

/// Stub for kdebug! - no-op in tests
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{}};
}

// ===========================================================================
// Import scheduling core source files directly using #[path]
// ===========================================================================

#[path = "../../src/logger.rs"]
pub mod logger;

#[path = "../../src/config.rs"]
pub mod config;

#[path = "../../src/scheduler/mod.rs"]
pub mod scheduler;

// ===========================================================================
// Mocks and tests
// ===========================================================================



#[cfg(test)]
#[path = "scheduler/mod.rs"]
mod scheduler_tests;
