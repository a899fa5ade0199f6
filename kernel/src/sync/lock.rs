//! Lock — взаимное исключение с владельцем
//! Lock — mutual exclusion with an owner
//!
//! Ожидание занятой блокировки отдаёт владельцу приоритет (см.
//! `sched::donation`). Освобождение передаёт блокировку прямо самому
//! важному ждущему, остальные ждущие начинают донорство новому владельцу.
//! Waiting on a held lock donates priority to the holder (see
//! `sched::donation`). Release hands the lock straight to the most
//! important waiter and the remaining waiters donate to the new holder.

use alloc::vec::Vec;

use super::{pick_waiter, LockId};
use crate::arch::Cpu;
use crate::config::TraceFlags;
use crate::mm::PageAllocator;
use crate::sched::scheduler::Guard;
use crate::sched::{Scheduler, Tid};

#[derive(Debug, Default)]
pub struct Lock {
    pub(crate) holder:  Option<Tid>,
    pub(crate) waiters: Vec<Tid>,
}

impl<C: Cpu, P: PageAllocator> Scheduler<C, P> {
    pub fn lock_create(&mut self) -> LockId {
        self.locks.push(Lock::default());
        LockId(self.locks.len() - 1)
    }

    /// Захватить; при занятой блокировке ждать, отдав приоритет владельцу.
    /// Acquire; if held, wait and donate priority to the holder.
    pub fn lock_acquire(&mut self, id: LockId) {
        assert!(!self.in_intr, "lock_acquire() from interrupt context");
        let _guard = Guard::<C>::new();

        let cur = self.current;
        let lock = &mut self.locks[id.0];
        match lock.holder {
            None => lock.holder = Some(cur),
            Some(holder) => {
                assert_ne!(holder, cur, "thread {} acquires {:?} twice", cur, id);
                lock.waiters.push(cur);
                self.donate(cur, id, holder);
                // вернёмся уже владельцем: release передаёт блокировку сама
                // we come back as the holder: release hands the lock over
                self.block_current();
            }
        }
    }

    pub fn lock_try_acquire(&mut self, id: LockId) -> bool {
        let _guard = Guard::<C>::new();
        let lock = &mut self.locks[id.0];
        if lock.holder.is_some() {
            return false;
        }
        lock.holder = Some(self.current);
        true
    }

    /// Освободить; может сразу отдать процессор новому владельцу.
    /// Release; may hand the CPU to the new holder at once.
    pub fn lock_release(&mut self, id: LockId) {
        let _guard = Guard::<C>::new();
        self.release_lock(id);
        self.preempt_if_needed();
    }

    /// Освобождение без проверки вытеснения.
    /// Release without the preemption check.
    pub(crate) fn release_lock(&mut self, id: LockId) {
        let cur = self.current;
        assert_eq!(
            self.locks[id.0].holder,
            Some(cur),
            "thread {} releases {:?} it does not hold",
            cur,
            id
        );
        self.revoke_donations(cur, id);

        let lock = &mut self.locks[id.0];
        let Some(next) = pick_waiter(&self.threads, &mut lock.waiters) else {
            lock.holder = None;
            return;
        };
        lock.holder = Some(next);
        let rest = lock.waiters.clone();

        self.thread_mut(next).waiting_lock = None;
        if self.traces(TraceFlags::DONATION) {
            log::trace!(target: "sched::donation", "{:?}: {} -> {}", id, cur, next);
        }
        self.inherit_donations(next, &rest);
        self.make_ready(next);
    }

    pub fn lock_held_by_current(&self, id: LockId) -> bool {
        self.locks[id.0].holder == Some(self.current)
    }

    pub fn lock_holder(&self, id: LockId) -> Option<Tid> {
        self.locks[id.0].holder
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::sched::{ThreadStatus, PRI_DEFAULT};
    use crate::testing::{boot, spawn};

    #[test]
    fn uncontended_acquire_and_release() {
        let mut s = boot(Config::new());
        let lock = s.lock_create();
        assert_eq!(s.lock_holder(lock), None);

        s.lock_acquire(lock);
        assert!(s.lock_held_by_current(lock));
        assert!(!s.lock_try_acquire(lock));

        s.lock_release(lock);
        assert_eq!(s.lock_holder(lock), None);
        assert!(s.lock_try_acquire(lock));
        assert!(s.lock_held_by_current(lock));
    }

    #[test]
    fn waiter_is_handed_the_lock() {
        let mut s = boot(Config::new());
        let main = s.current();
        let lock = s.lock_create();
        s.lock_acquire(lock);

        let t = spawn(&mut s, "t", 20);
        assert_eq!(s.current(), main);
        s.set_priority(10).unwrap();
        assert_eq!(s.current(), t);

        s.lock_acquire(lock);
        // t ждёт и отдаёт main свои 20
        assert_eq!(s.current(), main);
        assert_eq!(s.get_priority(), 20);
        assert_eq!(s.thread(t).unwrap().status(), ThreadStatus::Blocked);

        s.lock_release(lock);
        assert_eq!(s.current(), t);
        assert!(s.lock_held_by_current(lock));
        assert_eq!(s.thread(t).unwrap().waiting_lock(), None);
        assert_eq!(s.thread(main).unwrap().priority(), 10);
        s.check_invariants();
    }

    #[test]
    fn remaining_waiters_donate_to_the_new_holder() {
        let mut s = boot(Config::new());
        let lock = s.lock_create();
        s.lock_acquire(lock);

        let a = spawn(&mut s, "a", 40);
        s.lock_acquire(lock);
        let b = spawn(&mut s, "b", 45);
        s.lock_acquire(lock);
        let c = spawn(&mut s, "c", 35);
        assert_ne!(s.current(), c);

        s.lock_release(lock);
        assert_eq!(s.current(), b);
        assert_eq!(s.running().donations(), [a]);
        assert_eq!(s.get_priority(), 45);
        s.check_invariants();

        s.set_priority(PRI_DEFAULT).unwrap();
        // донорство a держит b выше c / a's donation keeps b above c
        assert_eq!(s.current(), b);
        assert_eq!(s.get_priority(), 40);
        s.check_invariants();
    }

    #[test]
    fn try_acquire_never_donates() {
        let mut s = boot(Config::new());
        let main = s.current();
        let lock = s.lock_create();
        s.lock_acquire(lock);
        spawn(&mut s, "t", 50);
        assert!(!s.lock_try_acquire(lock));
        s.block();
        assert_eq!(s.current(), main);
        assert_eq!(s.get_priority(), PRI_DEFAULT);
    }

    #[test]
    #[should_panic(expected = "does not hold")]
    fn releasing_an_unheld_lock_is_misuse() {
        let mut s = boot(Config::new());
        let lock = s.lock_create();
        s.lock_release(lock);
    }

    #[test]
    #[should_panic(expected = "twice")]
    fn recursive_acquire_is_misuse() {
        let mut s = boot(Config::new());
        let lock = s.lock_create();
        s.lock_acquire(lock);
        s.lock_acquire(lock);
    }

    #[test]
    #[should_panic(expected = "holding a lock")]
    fn exiting_with_a_lock_is_misuse() {
        let mut s = boot(Config::new());
        let lock = s.lock_create();
        spawn(&mut s, "t", 40);
        s.lock_acquire(lock);
        s.exit();
    }
}
