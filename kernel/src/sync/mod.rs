//! Примитивы синхронизации поверх планировщика
//! Synchronization primitives on top of the scheduler
//!
//!   Semaphore — счётчик + ждущие / counter plus waiters
//!   Lock      — владелец + ждущие, донорство приоритета / holder plus waiters, priority donation
//!   Condvar   — семантика Mesa / Mesa semantics
//!
//! Объекты живут в таблицах `Scheduler` и адресуются индексами: ждущий
//! поток блокируется, и ссылка на примитив у него не остаётся.
//! Objects live in `Scheduler` tables and are addressed by index: a
//! waiting thread blocks and keeps no reference to the primitive.
//!
//! Ждущего всегда будит поток с высшим эффективным приоритетом, при
//! равенстве — пришедший раньше.
//! The waiter woken is always the one with the highest effective
//! priority, the earliest arrival on ties.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::sched::{Thread, Tid};

pub mod condvar;
pub mod lock;
pub mod semaphore;

pub use condvar::Condvar;
pub use lock::Lock;
pub use semaphore::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CondId(pub(crate) usize);

/// Снять из списка ждущего с высшим приоритетом.
/// Take the highest-priority waiter off the list.
pub(crate) fn pick_waiter(threads: &BTreeMap<Tid, Thread>, waiters: &mut Vec<Tid>) -> Option<Tid> {
    let mut best: Option<(usize, i32)> = None;
    for (i, tid) in waiters.iter().enumerate() {
        let priority = threads[tid].priority;
        if best.map_or(true, |(_, p)| priority > p) {
            best = Some((i, priority));
        }
    }
    best.map(|(i, _)| waiters.remove(i))
}
