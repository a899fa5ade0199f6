//! Scheduler — приоритеты + донорство, либо MLFQS
//! Scheduler — priorities with donation, or MLFQS
//!
//! Однопроцессорный вытесняющий планировщик. Всё состояние — очередь
//! готовых, очередь спящих, таблица потоков, load_avg — живёт в одном
//! объекте `Scheduler`, созданном при загрузке.
//! Single-CPU preemptive scheduler. All state (ready queue, sleep queue,
//! thread table, load_avg) lives in one `Scheduler` created at boot.
//!
//! Модули / Modules:
//!   fixed_point — 17.14 для статистики MLFQS / 17.14 for MLFQS statistics
//!   thread      — TCB
//!   ready       — очередь готовых / ready queue
//!   scheduler   — выбор, переключение, вытеснение / pick, switch, preempt
//!   alarm       — сон до тика / sleep until a tick
//!   donation    — донорство приоритета / priority donation
//!   mlfqs       — recent_cpu, load_avg, приоритет из формулы / formula priority
//!
//! Таймер вызывает `tick()` на каждое прерывание; будильник и MLFQS
//! работают внутри него, а вытеснение откладывается до выхода из
//! прерывания.
//! The timer calls `tick()` on every interrupt; alarm and MLFQS run
//! inside it and preemption is deferred to interrupt return.

pub mod alarm;
pub mod donation;
pub mod fixed_point;
pub mod mlfqs;
pub mod ready;
pub mod scheduler;
pub mod thread;

pub use fixed_point::Fixed;
pub use scheduler::{Scheduler, TickStats};
pub use thread::{Thread, ThreadFn, ThreadStatus, Tid};
pub use thread::{NICE_DEFAULT, NICE_MAX, NICE_MIN, PRI_DEFAULT, PRI_MAX, PRI_MIN};
