//! Counting semaphore
//!
//! `up` передаёт разрешение прямо разбуженному потоку: счётчик не
//! растёт, и никто не успевает перехватить разрешение между `up` и
//! пробуждением.
//! `up` hands the permit straight to the woken thread: the counter is
//! not bumped, so nobody can grab the permit between `up` and wakeup.

use alloc::vec::Vec;

use super::{pick_waiter, SemaId};
use crate::arch::Cpu;
use crate::mm::PageAllocator;
use crate::sched::scheduler::Guard;
use crate::sched::{Scheduler, Tid};

#[derive(Debug, Default)]
pub struct Semaphore {
    pub(crate) value:   u32,
    pub(crate) waiters: Vec<Tid>,
}

impl<C: Cpu, P: PageAllocator> Scheduler<C, P> {
    pub fn sema_create(&mut self, value: u32) -> SemaId {
        self.semas.push(Semaphore { value, waiters: Vec::new() });
        SemaId(self.semas.len() - 1)
    }

    /// P(): ждать разрешения / wait for a permit
    pub fn sema_down(&mut self, id: SemaId) {
        assert!(!self.in_intr, "sema_down() from interrupt context");
        let _guard = Guard::<C>::new();

        let sema = &mut self.semas[id.0];
        if sema.value > 0 {
            sema.value -= 1;
            return;
        }
        sema.waiters.push(self.current);
        self.block_current();
    }

    /// P() без ожидания / P() without waiting
    pub fn sema_try_down(&mut self, id: SemaId) -> bool {
        let _guard = Guard::<C>::new();
        let sema = &mut self.semas[id.0];
        if sema.value == 0 {
            return false;
        }
        sema.value -= 1;
        true
    }

    /// V(). Можно звать из прерывания.
    /// V(). Callable from interrupt context.
    pub fn sema_up(&mut self, id: SemaId) {
        let _guard = Guard::<C>::new();
        match pick_waiter(&self.threads, &mut self.semas[id.0].waiters) {
            Some(tid) => self.make_ready(tid),
            None => self.semas[id.0].value += 1,
        }
        self.preempt_if_needed();
    }

    pub fn sema_value(&self, id: SemaId) -> u32 {
        self.semas[id.0].value
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::sched::ThreadStatus;
    use crate::testing::{boot, spawn};

    #[test]
    fn down_takes_available_permits() {
        let mut s = boot(Config::new());
        let sema = s.sema_create(2);
        s.sema_down(sema);
        assert!(s.sema_try_down(sema));
        assert!(!s.sema_try_down(sema));
        assert_eq!(s.sema_value(sema), 0);
        s.sema_up(sema);
        assert_eq!(s.sema_value(sema), 1);
    }

    #[test]
    fn up_wakes_highest_priority_waiter() {
        let mut s = boot(Config::new());
        let main = s.current();
        let sema = s.sema_create(0);

        let mut waiters = Vec::new();
        for pri in [35, 45, 40] {
            let t = spawn(&mut s, "waiter", pri);
            s.sema_down(sema);
            assert_eq!(s.current(), main);
            waiters.push(t);
        }

        s.sema_up(sema);
        assert_eq!(s.current(), waiters[1]);
        // разрешение ушло потоку, а не в счётчик
        assert_eq!(s.sema_value(sema), 0);
        s.exit();

        s.sema_up(sema);
        assert_eq!(s.current(), waiters[2]);
        s.exit();
        s.sema_up(sema);
        assert_eq!(s.current(), waiters[0]);
        s.exit();
        assert_eq!(s.current(), main);
        s.check_invariants();
    }

    #[test]
    fn up_from_interrupt_defers_the_switch() {
        let mut s = boot(Config::new());
        let main = s.current();
        let sema = s.sema_create(0);
        let t = spawn(&mut s, "t", 50);
        s.sema_down(sema);
        assert_eq!(s.current(), main);

        s.in_intr = true;
        s.sema_up(sema);
        assert_eq!(s.current(), main);
        assert_eq!(s.thread(t).unwrap().status(), ThreadStatus::Ready);
        s.in_intr = false;

        // прерывание от таймера довершает вытеснение
        s.timer_interrupt();
        assert_eq!(s.current(), t);
    }

    #[test]
    #[should_panic(expected = "interrupt context")]
    fn down_in_interrupt_context_is_misuse() {
        let mut s = boot(Config::new());
        let sema = s.sema_create(1);
        s.in_intr = true;
        s.sema_down(sema);
    }
}
