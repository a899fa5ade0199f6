//! Alarm clock — сон до заданного тика / sleeping until a given tick
//!
//! Очередь спящих упорядочена по времени пробуждения, поэтому на каждом
//! тике просматривается только её начало.
//! The sleep queue is ordered by wakeup time, so each tick only looks at
//! its front.

use alloc::collections::VecDeque;

use super::scheduler::{Guard, Scheduler};
use super::thread::Tid;
use crate::arch::Cpu;
use crate::config::TraceFlags;
use crate::mm::PageAllocator;

/// Спящие потоки по возрастанию `wakeup_time`; равные — в порядке засыпания.
/// Sleeping threads by ascending `wakeup_time`; ties in the order they fell asleep.
#[derive(Debug, Default)]
pub struct SleepQueue {
    queue: VecDeque<(i64, Tid)>,
}

impl SleepQueue {
    pub fn new() -> Self {
        Self { queue: VecDeque::new() }
    }

    pub fn insert(&mut self, wakeup: i64, tid: Tid) {
        let pos = self.queue.partition_point(|&(w, _)| w <= wakeup);
        self.queue.insert(pos, (wakeup, tid));
    }

    /// Снять первый поток, если его время пришло.
    /// Take the first thread off if it is due.
    pub fn pop_due(&mut self, now: i64) -> Option<Tid> {
        match self.queue.front() {
            Some(&(wakeup, tid)) if wakeup <= now => {
                self.queue.pop_front();
                Some(tid)
            }
            _ => None,
        }
    }

    pub fn next_wakeup(&self) -> Option<i64> {
        self.queue.front().map(|&(w, _)| w)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, Tid)> + '_ {
        self.queue.iter().copied()
    }
}

impl<C: Cpu, P: PageAllocator> Scheduler<C, P> {
    /// Усыпить текущий поток на `duration` тиков, считая от `now`.
    /// Put the running thread to sleep for `duration` ticks counted from `now`.
    pub fn sleep(&mut self, duration: i64, now: i64) {
        if duration <= 0 {
            return;
        }
        assert!(!self.in_intr, "sleep() from interrupt context");
        let _guard = Guard::<C>::new();

        let cur = self.current;
        assert_ne!(Some(cur), self.idle, "idle thread cannot sleep");

        let wakeup = now + duration;
        self.thread_mut(cur).wakeup_time = Some(wakeup);
        self.sleepers.insert(wakeup, cur);
        if self.traces(TraceFlags::ALARM) {
            log::trace!(target: "sched::alarm", "{} sleeps until tick {}", cur, wakeup);
        }
        self.block_current();
    }

    /// `sleep` от текущего тика / `sleep` from the current tick
    pub fn timer_sleep(&mut self, duration: i64) {
        self.sleep(duration, self.ticks);
    }

    /// Когда проснётся ближайший спящий / When the next sleeper is due
    pub fn next_wakeup(&self) -> Option<i64> {
        self.sleepers.next_wakeup()
    }

    /// Разбудить всех, чьё время пришло. Вызывается из тика.
    /// Wake everyone who is due. Called from the tick.
    pub(crate) fn wake_sleepers(&mut self, now: i64) {
        let mut woke = false;
        while let Some(tid) = self.sleepers.pop_due(now) {
            self.thread_mut(tid).wakeup_time = None;
            if self.traces(TraceFlags::ALARM) {
                log::trace!(target: "sched::alarm", "tick {}: wake {}", now, tid);
            }
            self.make_ready(tid);
            woke = true;
        }
        if woke {
            self.preempt_if_needed();
        }
    }
}
