//! FerruleOS Kernel — ядро планировщика потоков / thread scheduler core
//!
//! Однопроцессорный вытесняющий планировщик потоков ядра.
//! Single-processor preemptive scheduler for kernel threads.
//!
//! Подсистемы / Subsystems:
//!   arch   — уровень прерываний, переключение контекста / interrupt level, context switch
//!   mm     — постраничный аллокатор для TCB / page allocator for thread control blocks
//!   sched  — потоки, очередь готовых, будильник, донорство, MLFQS
//!            threads, ready queue, alarm clock, donation, MLFQS
//!   sync   — семафоры, блокировки, условные переменные / semaphores, locks, condvars
//!   config — разбор командной строки ядра / kernel command line
//!   klog   — бэкенд для `log` / `log` backend

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

// Подключить стандартный alloc крейт (Box, Vec, BTreeMap, ...)
// Connect standard alloc crate (Box, Vec, BTreeMap, ...)
extern crate alloc;

pub mod arch;
pub mod config;
pub mod error;
pub mod klog;
pub mod mm;
pub mod sched;
pub mod sync;

pub use config::{Config, SchedMode, TraceFlags};
pub use error::{Error, Result};
pub use sched::{Scheduler, Thread, ThreadStatus, Tid};

#[cfg(test)]
pub(crate) mod testing;
