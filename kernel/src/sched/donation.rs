//! Priority donation — наследование приоритета через цепочку блокировок
//! Priority donation — priority inheritance along a chain of locks
//!
//!   A ──ждёт/waits L1──► B ──ждёт/waits L2──► C
//!
//! A отдаёт приоритет B, B — дальше C. Цепочка проходится циклом, не
//! рекурсией, и не глубже `MAX_DONATION_DEPTH`.
//! A donates to B, and B passes it on to C. The chain is walked with a
//! loop, not recursion, and no deeper than `MAX_DONATION_DEPTH`.
//!
//! В режиме MLFQS донорства нет: запоминается только `waiting_lock`.
//! No donation in MLFQS mode: only `waiting_lock` is recorded.

use alloc::vec::Vec;

use super::scheduler::{Guard, Scheduler};
use super::thread::{Tid, MAX_DONATION_DEPTH, PRI_MAX, PRI_MIN};
use crate::arch::Cpu;
use crate::config::TraceFlags;
use crate::error::{Error, Result};
use crate::mm::PageAllocator;
use crate::sync::LockId;

impl<C: Cpu, P: PageAllocator> Scheduler<C, P> {
    /// `donor` начинает ждать `lock`, которую держит `holder`.
    /// `donor` starts waiting for `lock`, held by `holder`.
    pub(crate) fn donate(&mut self, donor: Tid, lock: LockId, holder: Tid) {
        self.thread_mut(donor).waiting_lock = Some(lock);
        if self.config.is_mlfqs() {
            return;
        }

        self.thread_mut(holder).donations.push(donor);
        if self.traces(TraceFlags::DONATION) {
            log::trace!(
                target: "sched::donation",
                "{} (priority {}) donates to {} via {:?}",
                donor, self.threads[&donor].priority, holder, lock
            );
        }
        self.propagate_donation(holder);
    }

    /// Пересчитать `from` и всех, кого он ждёт, вверх по цепочке.
    /// Refresh `from` and everyone it waits on, up the chain.
    fn propagate_donation(&mut self, from: Tid) {
        let mut tid = from;
        for depth in 0..MAX_DONATION_DEPTH {
            if !self.refresh_priority(tid) {
                return;
            }
            let Some(lock) = self.threads[&tid].waiting_lock else {
                return;
            };
            let Some(holder) = self.locks[lock.0].holder else {
                return;
            };
            if depth + 1 == MAX_DONATION_DEPTH {
                log::warn!(
                    target: "sched::donation",
                    "donation chain deeper than {}, stopped at {}",
                    MAX_DONATION_DEPTH, holder
                );
                return;
            }
            tid = holder;
        }
    }

    /// Убрать доноров, ждавших именно `lock`, и пересчитать приоритет.
    /// Drop the donors that waited on `lock` only, then recompute.
    pub(crate) fn revoke_donations(&mut self, holder: Tid, lock: LockId) {
        if self.config.is_mlfqs() {
            return;
        }
        let donors = core::mem::take(&mut self.thread_mut(holder).donations);
        let kept: Vec<Tid> = donors
            .into_iter()
            .filter(|d| self.threads[d].waiting_lock != Some(lock))
            .collect();
        self.thread_mut(holder).donations = kept;
        self.refresh_priority(holder);
    }

    /// Новый владелец блокировки получает доноров от остальных ждущих.
    /// The lock's new holder picks up donations from the remaining waiters.
    pub(crate) fn inherit_donations(&mut self, holder: Tid, waiters: &[Tid]) {
        if self.config.is_mlfqs() || waiters.is_empty() {
            return;
        }
        self.thread_mut(holder).donations.extend_from_slice(waiters);
        self.refresh_priority(holder);
    }

    /// priority = max(base_priority, приоритеты доноров / donor priorities).
    /// Returns whether the effective priority changed.
    pub(crate) fn refresh_priority(&mut self, tid: Tid) -> bool {
        if self.config.is_mlfqs() {
            return false;
        }
        let thread = &self.threads[&tid];
        let new = thread
            .donations
            .iter()
            .map(|d| self.threads[d].priority)
            .fold(thread.base_priority, i32::max);
        self.set_effective(tid, new)
    }

    /// Задать базовый приоритет текущего потока. В MLFQS игнорируется.
    /// Set the running thread's base priority. Ignored under MLFQS.
    ///
    /// Donations still apply on top, and lowering the priority may hand
    /// the CPU to a ready thread at once.
    pub fn set_priority(&mut self, priority: i32) -> Result<()> {
        if !(PRI_MIN..=PRI_MAX).contains(&priority) {
            return Err(Error::InvalidPriority(priority));
        }
        if self.config.is_mlfqs() {
            return Ok(());
        }

        let _guard = Guard::<C>::new();
        let cur = self.current;
        self.thread_mut(cur).base_priority = priority;
        self.refresh_priority(cur);
        self.preempt_if_needed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::sched::{ThreadStatus, PRI_DEFAULT};
    use crate::testing::{boot, spawn};

    #[test]
    fn single_donation_and_release() {
        let mut s = boot(Config::new());
        let main = s.current();
        let lock = s.lock_create();
        s.lock_acquire(lock);

        let a = spawn(&mut s, "a", 32);
        s.lock_acquire(lock);
        assert_eq!(s.current(), main);
        assert_eq!(s.get_priority(), 32);
        s.check_invariants();

        let b = spawn(&mut s, "b", 33);
        s.lock_acquire(lock);
        assert_eq!(s.current(), main);
        assert_eq!(s.get_priority(), 33);
        assert_eq!(s.running().donations(), [a, b]);
        s.check_invariants();

        s.lock_release(lock);
        // b — самый важный ждущий, получает блокировку и сразу работает
        assert_eq!(s.current(), b);
        assert_eq!(s.lock_holder(lock), Some(b));
        assert_eq!(s.thread(main).unwrap().priority(), PRI_DEFAULT);
        assert_eq!(s.running().donations(), [a]);
        s.check_invariants();

        s.lock_release(lock);
        assert_eq!(s.current(), b);
        assert_eq!(s.lock_holder(lock), Some(a));
        s.exit();
        assert_eq!(s.current(), a);
        s.lock_release(lock);
        s.exit();
        assert_eq!(s.current(), main);
        s.check_invariants();
    }

    #[test]
    fn donation_is_transitive_and_restored() {
        let mut s = boot(Config::new());
        let c = s.current();
        let l1 = s.lock_create();
        let l2 = s.lock_create();
        s.lock_acquire(l2);

        // B держит L1 и ждёт L2 (у C)
        let b = spawn(&mut s, "b", 33);
        s.lock_acquire(l1);
        s.lock_acquire(l2);
        assert_eq!(s.current(), c);
        assert_eq!(s.get_priority(), 33);

        // A ждёт L1 (у B): приоритет идёт A → B → C
        let a = spawn(&mut s, "a", 40);
        s.lock_acquire(l1);
        assert_eq!(s.current(), c);
        assert_eq!(s.thread(b).unwrap().priority(), 40);
        assert_eq!(s.get_priority(), 40);
        s.check_invariants();

        s.lock_release(l2);
        assert_eq!(s.thread(c).unwrap().priority(), PRI_DEFAULT);
        assert_eq!(s.current(), b);
        assert_eq!(s.get_priority(), 40);
        s.check_invariants();

        s.lock_release(l1);
        assert_eq!(s.thread(b).unwrap().priority(), 33);
        assert_eq!(s.current(), a);
        s.lock_release(l1);
        s.exit();

        assert_eq!(s.current(), b);
        assert_eq!(s.get_priority(), 33);
        s.lock_release(l2);
        s.exit();
        assert_eq!(s.current(), c);
        assert_eq!(s.get_priority(), PRI_DEFAULT);
        s.check_invariants();
    }

    #[test]
    fn release_drops_only_that_locks_donors() {
        let mut s = boot(Config::new());
        let main = s.current();
        let l1 = s.lock_create();
        let l2 = s.lock_create();
        s.lock_acquire(l1);
        s.lock_acquire(l2);

        let a = spawn(&mut s, "a", 32);
        s.lock_acquire(l1);
        let b = spawn(&mut s, "b", 34);
        s.lock_acquire(l2);
        assert_eq!(s.get_priority(), 34);

        s.lock_release(l2);
        assert_eq!(s.current(), b);
        assert_eq!(s.thread(main).unwrap().priority(), 32);
        assert_eq!(s.thread(main).unwrap().donations(), [a]);
        s.lock_release(l2);
        s.exit();

        assert_eq!(s.current(), main);
        s.lock_release(l1);
        assert_eq!(s.current(), a);
        assert_eq!(s.thread(main).unwrap().priority(), PRI_DEFAULT);
        s.check_invariants();
    }

    #[test]
    fn set_priority_keeps_donation_on_top() {
        let mut s = boot(Config::new());
        let lock = s.lock_create();
        s.lock_acquire(lock);
        spawn(&mut s, "a", 40);
        s.lock_acquire(lock);

        s.set_priority(20).unwrap();
        assert_eq!(s.get_priority(), 40);
        assert_eq!(s.running().base_priority(), 20);

        s.set_priority(50).unwrap();
        assert_eq!(s.get_priority(), 50);
        s.check_invariants();
    }

    #[test]
    fn donation_to_ready_holder_refiles_it() {
        let mut s = boot(Config::new());
        let main = s.current();
        let lock = s.lock_create();

        // low берёт блокировку и уступает main
        let low = spawn(&mut s, "low", 10);
        s.set_priority(5).unwrap();
        assert_eq!(s.current(), low);
        s.lock_acquire(lock);
        s.set_priority(4).unwrap();
        assert_eq!(s.current(), main);

        s.set_priority(PRI_DEFAULT).unwrap();
        let mid = spawn(&mut s, "mid", 20);
        assert_eq!(s.current(), main);

        // main ждёт: low (Ready) получает 31 и обгоняет mid
        s.lock_acquire(lock);
        assert_eq!(s.current(), low);
        assert_eq!(s.get_priority(), PRI_DEFAULT);
        assert_eq!(s.thread(mid).unwrap().status(), ThreadStatus::Ready);
        s.check_invariants();
    }

    #[test]
    fn chain_deeper_than_bound_stops() {
        let mut s = boot(Config::new());
        let main = s.current();
        let locks: Vec<_> = (0..10).map(|_| s.lock_create()).collect();
        s.lock_acquire(locks[0]);

        // T_i держит L_i и ждёт L_{i-1}; приоритет 31 + i
        let mut chain = vec![main];
        for i in 1..=9 {
            let t = spawn(&mut s, "link", 31 + i as i32);
            s.lock_acquire(locks[i]);
            s.lock_acquire(locks[i - 1]);
            assert_eq!(s.current(), main);
            chain.push(t);
        }

        // от T9 донорство доходит до T1 (8 звеньев), но не до main
        for &t in &chain[1..] {
            assert_eq!(s.thread(t).unwrap().priority(), 40);
        }
        assert_eq!(s.get_priority(), 39);
    }
}
