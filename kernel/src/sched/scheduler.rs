//! Контекст планировщика: выбор потока, переключение, вытеснение.
//! Scheduler context: picking a thread, switching, preemption.
//!
//! Каждая публичная операция берёт `IntrGuard`: таймер меняет те же
//! очереди из прерывания, а другого CPU нет.
//! Every public operation takes an `IntrGuard`: the timer mutates the
//! same queues from interrupt context and there is no other CPU.
//!
//! Модель переключения: `switch_to` возвращает управление уже от имени
//! нового текущего потока. Поэтому `block`, `yield_now` и `exit`
//! возвращаются "в другой поток".
//! Switch model: `switch_to` returns on behalf of the new current
//! thread, so `block`, `yield_now` and `exit` return "into" another
//! thread.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::alarm::SleepQueue;
use super::fixed_point::Fixed;
use super::mlfqs;
use super::ready::ReadyQueue;
use super::thread::{Thread, ThreadFn, ThreadStatus, Tid, PRI_DEFAULT, PRI_MAX, PRI_MIN};
use crate::arch::{Cpu, IntrGuard, IntrLevel, Interrupts};
use crate::config::{Config, SchedMode, TraceFlags};
use crate::error::{Error, Result};
use crate::mm::PageAllocator;
use crate::sync::{Condvar, Lock, Semaphore};

pub(crate) type Guard<C> = IntrGuard<<C as Cpu>::Intr>;

/// Счётчики тиков / Tick counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub idle_ticks:   u64,
    pub kernel_ticks: u64,
}

pub struct Scheduler<C: Cpu, P: PageAllocator> {
    pub(crate) config: Config,
    cpu:   C,
    pages: P,

    /// Все потоки, включая умирающих до их уничтожения.
    /// Every thread, dying ones included until destroyed.
    pub(crate) threads:  BTreeMap<Tid, Thread>,
    pub(crate) ready:    ReadyQueue,
    pub(crate) sleepers: SleepQueue,
    pub(crate) current:  Tid,
    pub(crate) idle:     Option<Tid>,
    next_tid: u32,

    pub(crate) ticks:    i64,
    /// Тиков с момента последнего dispatch / Ticks since the last dispatch
    slice_ticks: u32,
    pub(crate) load_avg: Fixed,

    pub(crate) in_intr: bool,
    yield_on_return: bool,
    /// Умершие потоки, чьи страницы освободит следующий schedule().
    /// Dead threads whose pages the next schedule() frees.
    destruction: Vec<Tid>,
    stats: TickStats,

    pub(crate) semas: Vec<Semaphore>,
    pub(crate) locks: Vec<Lock>,
    pub(crate) conds: Vec<Condvar>,
}

fn idle_loop(_: usize) {
    loop {
        core::hint::spin_loop();
    }
}

impl<C: Cpu, P: PageAllocator> Scheduler<C, P> {
    /// Превратить загрузочный контекст в поток "main".
    /// Turn the boot context into the "main" thread.
    pub fn new(config: Config, cpu: C, pages: P) -> Self {
        let mut sched = Self {
            config,
            cpu,
            pages,
            threads: BTreeMap::new(),
            ready: ReadyQueue::new(),
            sleepers: SleepQueue::new(),
            current: Tid(0),
            idle: None,
            next_tid: 1,
            ticks: 0,
            slice_ticks: 0,
            load_avg: Fixed::ZERO,
            in_intr: false,
            yield_on_return: false,
            destruction: Vec::new(),
            stats: TickStats::default(),
            semas: Vec::new(),
            locks: Vec::new(),
            conds: Vec::new(),
        };

        let tid = sched.allocate_tid();
        let mut main = Thread::new(tid, "main", PRI_DEFAULT);
        if config.is_mlfqs() {
            let p = mlfqs::priority_for(main.recent_cpu, main.nice);
            main.base_priority = p;
            main.priority = p;
        }
        main.status = ThreadStatus::Running;
        sched.threads.insert(tid, main);
        sched.current = tid;

        log::info!(target: "sched", "scheduler up, mode {:?}, {} Hz", config.mode, config.timer_freq);
        sched
    }

    /// Создать idle-поток и включить прерывания.
    /// Create the idle thread and enable interrupts.
    pub fn start(&mut self) -> Result<()> {
        {
            let _guard = Guard::<C>::new();
            assert!(self.idle.is_none(), "scheduler started twice");

            let page = self.pages.alloc_page().ok_or(Error::NoMemory)?;
            let tid = self.allocate_tid();
            // idle никогда не стоит в очереди готовых: пока не работает, он Blocked
            // idle never sits in the ready queue: while not running it is Blocked
            let idle = Thread::new(tid, "idle", PRI_MIN).with_entry(idle_loop, 0, page);
            self.threads.insert(tid, idle);
            self.idle = Some(tid);
        }
        C::Intr::enable();
        Ok(())
    }

    fn allocate_tid(&mut self) -> Tid {
        let tid = Tid(self.next_tid);
        self.next_tid += 1;
        tid
    }

    // ── Жизненный цикл / Lifecycle ───────────────────────────────────────────

    /// Создать поток и поставить его в очередь готовых.
    /// Create a thread and put it on the ready queue.
    ///
    /// The new thread preempts the caller right away if it has a higher
    /// priority. In MLFQS mode `priority` is ignored: the thread inherits
    /// `nice` and `recent_cpu` from its creator and gets a formula priority.
    pub fn create(&mut self, name: &str, priority: i32, entry: ThreadFn, aux: usize) -> Result<Tid> {
        if !(PRI_MIN..=PRI_MAX).contains(&priority) {
            return Err(Error::InvalidPriority(priority));
        }

        let _guard = Guard::<C>::new();
        let page = self.pages.alloc_page().ok_or(Error::NoMemory)?;
        let tid = self.allocate_tid();
        let mut thread = Thread::new(tid, name, priority).with_entry(entry, aux, page);

        if self.config.is_mlfqs() {
            let parent = self.running();
            thread.nice = parent.nice;
            thread.recent_cpu = parent.recent_cpu;
            let p = mlfqs::priority_for(thread.recent_cpu, thread.nice);
            thread.base_priority = p;
            thread.priority = p;
        }

        if self.traces(TraceFlags::DISPATCH) {
            log::debug!(target: "sched", "create {} {:?} priority {}", tid, name, thread.priority);
        }
        self.threads.insert(tid, thread);
        self.make_ready(tid);
        self.preempt_if_needed();
        Ok(tid)
    }

    /// Усыпить текущий поток до `unblock`.
    /// Put the running thread to sleep until someone calls `unblock`.
    pub fn block(&mut self) {
        assert!(!self.in_intr, "block() from interrupt context");
        let _guard = Guard::<C>::new();
        self.block_current();
    }

    pub(crate) fn block_current(&mut self) {
        let cur = self.current;
        self.thread_mut(cur).status = ThreadStatus::Blocked;
        self.schedule();
    }

    /// Blocked → Ready, затем проверка вытеснения.
    /// Blocked → Ready, then a preemption check.
    pub fn unblock(&mut self, tid: Tid) {
        let _guard = Guard::<C>::new();
        self.make_ready(tid);
        self.preempt_if_needed();
    }

    pub(crate) fn make_ready(&mut self, tid: Tid) {
        assert_ne!(Some(tid), self.idle, "idle thread is never made ready");
        let thread = self.thread_mut(tid);
        assert_eq!(
            thread.status,
            ThreadStatus::Blocked,
            "unblock of thread {} in state {:?}",
            tid,
            thread.status
        );
        thread.status = ThreadStatus::Ready;
        let priority = thread.priority;
        self.ready.push(tid, priority);
    }

    /// Отдать процессор / Give up the CPU
    pub fn yield_now(&mut self) {
        assert!(!self.in_intr, "yield_now() from interrupt context");
        let _guard = Guard::<C>::new();

        let cur = self.current;
        if Some(cur) == self.idle {
            self.thread_mut(cur).status = ThreadStatus::Blocked;
        } else {
            let thread = self.thread_mut(cur);
            thread.status = ThreadStatus::Ready;
            let priority = thread.priority;
            self.ready.push(cur, priority);
        }
        self.schedule();
    }

    /// Завершить текущий поток. Сюда он больше не вернётся.
    /// Terminate the running thread. It never comes back here.
    ///
    /// The thread's page is freed by the scheduling pass after the one
    /// that switches away from it.
    pub fn exit(&mut self) {
        assert!(!self.in_intr, "exit() from interrupt context");
        let _guard = Guard::<C>::new();

        let cur = self.current;
        assert_ne!(Some(cur), self.idle, "idle thread cannot exit");
        assert!(
            self.locks.iter().all(|l| l.holder != Some(cur)),
            "thread {} exiting while holding a lock",
            cur
        );

        if self.traces(TraceFlags::DISPATCH) {
            log::debug!(target: "sched", "exit {} ({})", cur, self.threads[&cur].name());
        }
        self.thread_mut(cur).status = ThreadStatus::Dying;
        self.schedule();
    }

    // ── Выбор и переключение / Pick and switch ───────────────────────────────

    fn next_thread_to_run(&mut self) -> Tid {
        match self.ready.pop_highest() {
            Some(tid) => tid,
            None => self
                .idle
                .unwrap_or_else(|| panic!("nothing to run: ready queue empty, no idle thread")),
        }
    }

    /// Текущий поток уже не Running; выбрать следующий и переключиться.
    /// The current thread is no longer Running; pick the next one and switch.
    fn schedule(&mut self) {
        debug_assert_eq!(C::Intr::level(), IntrLevel::Off);
        let prev = self.current;
        debug_assert_ne!(self.threads[&prev].status, ThreadStatus::Running);

        self.reap_dying();

        let next = self.next_thread_to_run();
        self.thread_mut(next).status = ThreadStatus::Running;
        self.slice_ticks = 0;

        if next == prev {
            return;
        }
        if self.threads[&prev].status == ThreadStatus::Dying {
            self.destruction.push(prev);
        }
        if self.traces(TraceFlags::DISPATCH) {
            log::debug!(target: "sched", "switch {} -> {}", prev, next);
        }
        self.cpu.switch_to(&self.threads[&prev], &self.threads[&next]);
        self.current = next;
        self.running().check_magic();
    }

    /// Освободить потоки, от которых мы уже ушли.
    /// Free threads we have already switched away from.
    fn reap_dying(&mut self) {
        for tid in core::mem::take(&mut self.destruction) {
            debug_assert_ne!(tid, self.current);
            if let Some(thread) = self.threads.remove(&tid) {
                if let Some(page) = thread.page() {
                    self.pages.free_page(page);
                }
            }
        }
    }

    /// Уступить, если есть готовый поток важнее текущего.
    /// Yield if a ready thread outranks the running one.
    ///
    /// In interrupt context the yield waits until the interrupt returns.
    pub(crate) fn preempt_if_needed(&mut self) {
        let Some(best) = self.ready.highest_priority() else {
            return;
        };
        let idle_running = Some(self.current) == self.idle;
        if !idle_running && best <= self.running().priority {
            return;
        }
        if self.in_intr {
            self.yield_on_return = true;
        } else {
            self.yield_now();
        }
    }

    /// Сменить эффективный приоритет; готовый поток переезжает на новый уровень.
    /// Change the effective priority; a ready thread moves to its new level.
    pub(crate) fn set_effective(&mut self, tid: Tid, new: i32) -> bool {
        let thread = self.thread_mut(tid);
        let old = thread.priority;
        if old == new {
            return false;
        }
        thread.priority = new;
        if thread.status == ThreadStatus::Ready {
            self.ready.refile(tid, old, new);
        }
        true
    }

    // ── Таймер / Timer ───────────────────────────────────────────────────────

    /// Обработчик тика таймера. `now` не убывает.
    /// Timer tick handler. `now` never goes backwards.
    pub fn tick(&mut self, now: i64) {
        assert!(!self.in_intr, "nested timer interrupt");
        let _guard = Guard::<C>::new();
        debug_assert!(now >= self.ticks, "tick {} after {}", now, self.ticks);

        self.ticks = now;
        self.in_intr = true;

        if Some(self.current) == self.idle {
            self.stats.idle_ticks += 1;
        } else {
            self.stats.kernel_ticks += 1;
        }

        self.wake_sleepers(now);
        if self.config.is_mlfqs() {
            self.mlfqs_tick(now);
        }

        self.slice_ticks += 1;
        if self.slice_ticks >= self.config.time_slice {
            self.yield_on_return = true;
        }

        self.in_intr = false;
        // выход из прерывания / interrupt return
        if core::mem::take(&mut self.yield_on_return) {
            self.yield_now();
        }
    }

    /// Следующий тик после `ticks()` / The tick after `ticks()`
    pub fn timer_interrupt(&mut self) {
        self.tick(self.ticks + 1);
    }

    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    // ── Доступ / Accessors ───────────────────────────────────────────────────

    pub fn current(&self) -> Tid {
        self.current
    }

    /// Текущий поток; проверяет magic / The running thread; checks its magic
    pub fn running(&self) -> &Thread {
        let thread = &self.threads[&self.current];
        thread.check_magic();
        thread
    }

    pub fn thread(&self, tid: Tid) -> Option<&Thread> {
        self.threads.get(&tid)
    }

    pub(crate) fn thread_mut(&mut self, tid: Tid) -> &mut Thread {
        self.threads
            .get_mut(&tid)
            .unwrap_or_else(|| panic!("no thread {}", tid))
    }

    /// Живые потоки (без умирающих) / Live threads (dying ones skipped)
    pub fn threads(&self) -> impl Iterator<Item = &Thread> + '_ {
        self.threads.values().filter(|t| t.status != ThreadStatus::Dying)
    }

    pub fn idle_thread(&self) -> Option<Tid> {
        self.idle
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn mode(&self) -> SchedMode {
        self.config.mode
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn pages(&self) -> &P {
        &self.pages
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    pub fn print_stats(&self) {
        crate::kprintln!(
            "Thread: {} idle ticks, {} kernel ticks",
            self.stats.idle_ticks,
            self.stats.kernel_ticks
        );
    }

    pub(crate) fn traces(&self, flag: TraceFlags) -> bool {
        self.config.trace.contains(flag)
    }

    // ── Приоритет / Priority ─────────────────────────────────────────────────

    pub fn get_priority(&self) -> i32 {
        self.running().priority
    }

    // ── Инварианты / Invariants ──────────────────────────────────────────────

    /// Проверить инварианты планировщика; нарушение — panic.
    /// Check the scheduler invariants; a violation panics.
    pub fn check_invariants(&self) {
        let running: Vec<Tid> = self
            .threads
            .values()
            .filter(|t| t.status == ThreadStatus::Running)
            .map(|t| t.tid)
            .collect();
        assert_eq!(running, [self.current], "exactly one running thread");

        for thread in self.threads.values() {
            thread.check_magic();
        }

        let mut queued = 0;
        for (tid, level) in self.ready.iter() {
            let thread = &self.threads[&tid];
            assert_eq!(thread.status, ThreadStatus::Ready, "{} in ready queue", tid);
            assert_eq!(thread.priority, level, "{} filed under a stale priority", tid);
            queued += 1;
        }
        let ready = self.threads().filter(|t| t.status == ThreadStatus::Ready).count();
        assert_eq!(queued, ready, "every ready thread is queued exactly once");

        let mut last = i64::MIN;
        for (wakeup, tid) in self.sleepers.iter() {
            assert!(wakeup >= last, "sleep queue out of order");
            last = wakeup;
            let thread = &self.threads[&tid];
            assert_eq!(thread.status, ThreadStatus::Blocked, "{} sleeping", tid);
            assert_eq!(thread.wakeup_time, Some(wakeup), "{} wakeup time", tid);
        }
        let sleeping = self.threads().filter(|t| t.wakeup_time.is_some()).count();
        assert_eq!(sleeping, self.sleepers.len(), "wakeup_time set only while asleep");

        if self.config.is_mlfqs() {
            return;
        }
        for thread in self.threads() {
            let donated = thread.donations.iter().map(|d| {
                let donor = &self.threads[d];
                let lock = donor
                    .waiting_lock
                    .unwrap_or_else(|| panic!("donor {} not waiting on a lock", donor.tid));
                assert_eq!(self.locks[lock.0].holder, Some(thread.tid), "donor waits elsewhere");
                donor.priority
            });
            let expected = donated.fold(thread.base_priority, i32::max);
            assert_eq!(thread.priority, expected, "effective priority of {}", thread.tid);
        }
    }
}
