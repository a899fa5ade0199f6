//! Condition variable (Mesa)
//!
//! `signal` не передаёт управление: разбуженный поток встаёт в очередь
//! за блокировкой и должен перепроверить условие.
//! `signal` does not hand over control: the woken thread queues for the
//! lock and must recheck its condition.

use alloc::vec::Vec;

use super::{pick_waiter, CondId, LockId};
use crate::arch::Cpu;
use crate::mm::PageAllocator;
use crate::sched::scheduler::Guard;
use crate::sched::{Scheduler, Tid};

#[derive(Debug, Default)]
pub struct Condvar {
    pub(crate) waiters: Vec<Tid>,
}

impl<C: Cpu, P: PageAllocator> Scheduler<C, P> {
    pub fn cond_create(&mut self) -> CondId {
        self.conds.push(Condvar::default());
        CondId(self.conds.len() - 1)
    }

    /// Атомарно отпустить `lock` и ждать сигнала; вернёмся, снова владея `lock`.
    /// Atomically release `lock` and wait for a signal; returns holding `lock` again.
    pub fn cond_wait(&mut self, cond: CondId, lock: LockId) {
        assert!(!self.in_intr, "cond_wait() from interrupt context");
        let _guard = Guard::<C>::new();

        let cur = self.current;
        self.conds[cond.0].waiters.push(cur);
        self.release_lock(lock);
        self.block_current();
    }

    /// Разбудить самого важного ждущего. Вызывающий держит `lock`.
    /// Wake the most important waiter. The caller holds `lock`.
    pub fn cond_signal(&mut self, cond: CondId, lock: LockId) {
        let _guard = Guard::<C>::new();
        let cur = self.current;
        assert!(
            self.lock_held_by_current(lock),
            "thread {} signals {:?} without holding {:?}",
            cur,
            cond,
            lock
        );

        let Some(waiter) = pick_waiter(&self.threads, &mut self.conds[cond.0].waiters) else {
            return;
        };
        // ждущий переходит в очередь блокировки и отдаёт приоритет нам
        self.locks[lock.0].waiters.push(waiter);
        self.donate(waiter, lock, cur);
    }

    pub fn cond_broadcast(&mut self, cond: CondId, lock: LockId) {
        let _guard = Guard::<C>::new();
        while !self.conds[cond.0].waiters.is_empty() {
            self.cond_signal(cond, lock);
        }
    }

    pub fn cond_waiters(&self, cond: CondId) -> usize {
        self.conds[cond.0].waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::sched::{ThreadStatus, PRI_DEFAULT};
    use crate::testing::{boot, spawn};

    #[test]
    fn signal_wakes_by_priority_after_release() {
        let mut s = boot(Config::new());
        let main = s.current();
        let lock = s.lock_create();
        let cond = s.cond_create();

        let mut waiters = Vec::new();
        for pri in [33, 38, 35] {
            let t = spawn(&mut s, "waiter", pri);
            s.lock_acquire(lock);
            s.cond_wait(cond, lock);
            assert_eq!(s.current(), main);
            waiters.push(t);
        }
        assert_eq!(s.cond_waiters(cond), 3);
        assert_eq!(s.lock_holder(lock), None);

        s.lock_acquire(lock);
        s.cond_signal(cond, lock);
        // Mesa: сигнал не переключает, ждущий теперь ждёт блокировку
        assert_eq!(s.current(), main);
        assert_eq!(s.get_priority(), 38);
        assert_eq!(s.thread(waiters[1]).unwrap().status(), ThreadStatus::Blocked);

        s.lock_release(lock);
        assert_eq!(s.current(), waiters[1]);
        assert!(s.lock_held_by_current(lock));
        assert_eq!(s.thread(main).unwrap().priority(), PRI_DEFAULT);
        s.lock_release(lock);
        s.exit();
        s.check_invariants();

        assert_eq!(s.current(), main);
        assert_eq!(s.cond_waiters(cond), 2);
    }

    #[test]
    fn broadcast_wakes_everyone_in_priority_order() {
        let mut s = boot(Config::new());
        let main = s.current();
        let lock = s.lock_create();
        let cond = s.cond_create();

        for pri in [34, 36, 32] {
            spawn(&mut s, "waiter", pri);
            s.lock_acquire(lock);
            s.cond_wait(cond, lock);
        }

        s.lock_acquire(lock);
        s.cond_broadcast(cond, lock);
        assert_eq!(s.cond_waiters(cond), 0);
        assert_eq!(s.get_priority(), 36);

        let mut order = Vec::new();
        s.lock_release(lock);
        while s.current() != main {
            order.push(s.get_priority());
            s.lock_release(lock);
            s.exit();
        }
        assert_eq!(order, [36, 34, 32]);
        assert_eq!(s.lock_holder(lock), None);
        s.check_invariants();
    }

    #[test]
    fn signal_without_waiters_is_a_no_op() {
        let mut s = boot(Config::new());
        let lock = s.lock_create();
        let cond = s.cond_create();
        s.lock_acquire(lock);
        s.cond_signal(cond, lock);
        s.cond_broadcast(cond, lock);
        assert!(s.lock_held_by_current(lock));
    }

    #[test]
    #[should_panic(expected = "without holding")]
    fn signal_requires_the_lock() {
        let mut s = boot(Config::new());
        let lock = s.lock_create();
        let cond = s.cond_create();
        s.cond_signal(cond, lock);
    }
}
