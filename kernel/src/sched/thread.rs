//! Thread Control Block — запись о потоке ядра / kernel thread record
//!
//! Жизненный цикл / Lifecycle:
//!
//!   create ─► Ready ◄──── unblock ──── Blocked
//!               │  ▲                      ▲
//!      dispatch │  │ yield / preempt      │ sleep / lock wait
//!               ▼  │                      │
//!             Running ────────────────────┘
//!               │
//!          exit ▼
//!             Dying ─► destroyed (после следующего переключения / after the next switch)

use alloc::vec::Vec;
use core::fmt;

use super::fixed_point::Fixed;
use crate::mm::PhysAddr;
use crate::sync::LockId;

// ── Приоритеты / Priorities ──────────────────────────────────────────────────

pub const PRI_MIN: i32 = 0;
pub const PRI_DEFAULT: i32 = 31;
pub const PRI_MAX: i32 = 63;

pub const NICE_MIN: i32 = -20;
pub const NICE_DEFAULT: i32 = 0;
pub const NICE_MAX: i32 = 20;

/// Длина цепочки донорства, дальше которой не идём.
/// How far along a donation chain priority is pushed.
pub const MAX_DONATION_DEPTH: usize = 8;

/// Сторож в конце TCB: переполнение стека его затирает.
/// Sentinel at the end of the TCB: a stack overflow clobbers it.
pub const THREAD_MAGIC: u32 = 0xcd6a_bf4b;

const NAME_LEN: usize = 16;

/// Точка входа потока / Thread entry point
pub type ThreadFn = fn(usize);

/// Идентификатор потока / Thread identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Running,
    Ready,
    Blocked,
    Dying,
}

pub struct Thread {
    pub(crate) tid:    Tid,
    pub(crate) status: ThreadStatus,
    name:              [u8; NAME_LEN],
    name_len:          usize,

    /// Назначенный приоритет / Assigned priority
    pub(crate) base_priority: i32,
    /// Приоритет для планирования, с учётом донорства / Scheduling priority, donation included
    pub(crate) priority:      i32,

    // MLFQS
    pub(crate) nice:       i32,
    pub(crate) recent_cpu: Fixed,

    // будильник / alarm clock
    pub(crate) wakeup_time: Option<i64>,

    // донорство / donation
    pub(crate) waiting_lock: Option<LockId>,
    pub(crate) donations:    Vec<Tid>,

    entry: Option<(ThreadFn, usize)>,
    page:  Option<PhysAddr>,
    pub(crate) magic: u32,
}

impl Thread {
    pub(crate) fn new(tid: Tid, name: &str, priority: i32) -> Self {
        let (name, name_len) = truncate_name(name);
        Self {
            tid,
            status: ThreadStatus::Blocked,
            name,
            name_len,
            base_priority: priority,
            priority,
            nice: NICE_DEFAULT,
            recent_cpu: Fixed::ZERO,
            wakeup_time: None,
            waiting_lock: None,
            donations: Vec::new(),
            entry: None,
            page: None,
            magic: THREAD_MAGIC,
        }
    }

    pub(crate) fn with_entry(mut self, entry: ThreadFn, aux: usize, page: PhysAddr) -> Self {
        self.entry = Some((entry, aux));
        self.page = Some(page);
        self
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len]).unwrap_or("?")
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    /// Эффективный приоритет / Effective priority
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn base_priority(&self) -> i32 {
        self.base_priority
    }

    pub fn nice(&self) -> i32 {
        self.nice
    }

    pub fn recent_cpu(&self) -> Fixed {
        self.recent_cpu
    }

    pub fn wakeup_time(&self) -> Option<i64> {
        self.wakeup_time
    }

    pub fn waiting_lock(&self) -> Option<LockId> {
        self.waiting_lock
    }

    /// Потоки, отдающие нам приоритет, в порядке прихода.
    /// Threads donating priority to this one, in arrival order.
    pub fn donations(&self) -> &[Tid] {
        &self.donations
    }

    /// `None` у загрузочного потока main / `None` for the boot thread
    pub fn entry(&self) -> Option<(ThreadFn, usize)> {
        self.entry
    }

    /// Страница стека ядра / Kernel stack page
    pub fn page(&self) -> Option<PhysAddr> {
        self.page
    }

    pub(crate) fn check_magic(&self) {
        assert_eq!(
            self.magic, THREAD_MAGIC,
            "thread {} ({}): magic clobbered, kernel stack overflow",
            self.tid, self.name()
        );
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid)
            .field("name", &self.name())
            .field("status", &self.status)
            .field("priority", &self.priority)
            .field("base_priority", &self.base_priority)
            .finish_non_exhaustive()
    }
}

/// Имя обрезается до 15 байт по границе символа.
/// Names are cut to 15 bytes on a char boundary.
fn truncate_name(name: &str) -> ([u8; NAME_LEN], usize) {
    let mut len = name.len().min(NAME_LEN - 1);
    while !name.is_char_boundary(len) {
        len -= 1;
    }
    let mut buf = [0u8; NAME_LEN];
    buf[..len].copy_from_slice(&name.as_bytes()[..len]);
    (buf, len)
}
