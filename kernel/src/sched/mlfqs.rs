//! MLFQS — приоритет из статистики, без явных приоритетов
//! MLFQS — priority derived from statistics, not set explicitly
//!
//!   каждый тик / every tick          recent_cpu(running) += 1
//!   раз в секунду / once a second    load_avg, recent_cpu всех / of everyone
//!   раз в квант / every time slice   priority всех / of everyone
//!
//!   priority   = 63 - round(recent_cpu / 4) - 2 * nice
//!   load_avg   = 59/60 * load_avg + 1/60 * ready_count
//!   recent_cpu = 2*load_avg / (2*load_avg + 1) * recent_cpu + nice
//!
//! idle не учитывается нигде. / idle is left out of everything.

use alloc::vec::Vec;

use super::fixed_point::Fixed;
use super::scheduler::{Guard, Scheduler};
use super::thread::{ThreadStatus, Tid, NICE_MAX, NICE_MIN, PRI_MAX, PRI_MIN};
use crate::arch::Cpu;
use crate::config::TraceFlags;
use crate::error::{Error, Result};
use crate::mm::PageAllocator;

/// Приоритет по формуле, зажатый в [PRI_MIN, PRI_MAX].
/// Formula priority, clamped to [PRI_MIN, PRI_MAX].
pub(crate) fn priority_for(recent_cpu: Fixed, nice: i32) -> i32 {
    (PRI_MAX - (recent_cpu / 4).round() - 2 * nice).clamp(PRI_MIN, PRI_MAX)
}

pub(crate) fn next_load_avg(load_avg: Fixed, ready: i32) -> Fixed {
    let decay = Fixed::from_int(59) / Fixed::from_int(60);
    let weight = Fixed::from_int(1) / Fixed::from_int(60);
    decay * load_avg + weight * ready
}

pub(crate) fn decay_recent_cpu(recent_cpu: Fixed, load_avg: Fixed, nice: i32) -> Fixed {
    let twice = load_avg * 2;
    twice / (twice + 1) * recent_cpu + nice
}

impl<C: Cpu, P: PageAllocator> Scheduler<C, P> {
    /// Часть тика для MLFQS. Вызывается внутри прерывания.
    /// The MLFQS share of a tick. Runs in interrupt context.
    pub(crate) fn mlfqs_tick(&mut self, now: i64) {
        let cur = self.current;
        if Some(cur) != self.idle {
            self.thread_mut(cur).recent_cpu += 1;
        }

        if now % i64::from(self.config.timer_freq) == 0 {
            self.load_avg = next_load_avg(self.load_avg, self.ready_count());
            let load_avg = self.load_avg;
            for tid in self.scheduled_threads() {
                let thread = self.thread_mut(tid);
                thread.recent_cpu = decay_recent_cpu(thread.recent_cpu, load_avg, thread.nice);
            }
            if self.traces(TraceFlags::MLFQS) {
                log::trace!(target: "sched::mlfqs", "tick {}: load_avg {}", now, load_avg);
            }
        }

        if now % i64::from(self.config.time_slice) == 0 {
            for tid in self.scheduled_threads() {
                self.recompute_priority(tid);
            }
        }
        self.preempt_if_needed();
    }

    /// Живые потоки кроме idle / Live threads other than idle
    fn scheduled_threads(&self) -> Vec<Tid> {
        self.threads()
            .map(|t| t.tid)
            .filter(|&tid| Some(tid) != self.idle)
            .collect()
    }

    fn recompute_priority(&mut self, tid: Tid) {
        let thread = &self.threads[&tid];
        let p = priority_for(thread.recent_cpu, thread.nice);
        self.thread_mut(tid).base_priority = p;
        self.set_effective(tid, p);
    }

    /// Готовые плюс работающий, без idle.
    /// Ready threads plus the running one, idle excluded.
    pub fn ready_count(&self) -> i32 {
        let running = Some(self.current) != self.idle
            && self.threads[&self.current].status == ThreadStatus::Running;
        self.ready.len() as i32 + i32::from(running)
    }

    pub fn get_nice(&self) -> i32 {
        self.running().nice
    }

    /// Задать nice текущего потока; в MLFQS приоритет пересчитывается сразу.
    /// Set the running thread's nice; under MLFQS its priority follows at once.
    pub fn set_nice(&mut self, nice: i32) -> Result<()> {
        if !(NICE_MIN..=NICE_MAX).contains(&nice) {
            return Err(Error::InvalidNice(nice));
        }

        let _guard = Guard::<C>::new();
        let cur = self.current;
        self.thread_mut(cur).nice = nice;
        if self.config.is_mlfqs() {
            self.recompute_priority(cur);
            self.preempt_if_needed();
        }
        Ok(())
    }

    /// recent_cpu текущего потока × 100 / The running thread's recent_cpu × 100
    pub fn get_recent_cpu(&self) -> i32 {
        (self.running().recent_cpu * 100).round()
    }

    /// load_avg × 100
    pub fn get_load_avg(&self) -> i32 {
        (self.load_avg * 100).round()
    }

    pub fn load_avg(&self) -> Fixed {
        self.load_avg
    }
}
