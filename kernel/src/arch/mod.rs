//! HAL — Hardware Abstraction Layer
//!
//! Планировщику от платформы нужно две вещи:
//! The scheduler needs two things from the platform:
//!   - уровень прерываний (вкл/выкл) / interrupt level (on/off)
//!   - переключение контекста между потоками / context switch between threads
//!
//! Реализация выбирается в зависимости от целевой платформы.
//! Implementation is selected based on the target platform.

use core::marker::PhantomData;

use crate::sched::Thread;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod x86_64;

#[cfg(test)]
pub mod sim;

/// Уровень прерываний / Interrupt level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrLevel {
    Off,
    On,
}

/// Управление флагом прерываний текущего CPU.
/// Control of the current CPU's interrupt flag.
///
/// Associated functions rather than methods: the flag belongs to the CPU,
/// so a guard can hold it without borrowing the scheduler.
pub trait Interrupts {
    fn level() -> IntrLevel;

    /// Установить уровень, вернуть предыдущий.
    /// Set the level, return the previous one.
    fn set_level(level: IntrLevel) -> IntrLevel;

    fn disable() -> IntrLevel {
        Self::set_level(IntrLevel::Off)
    }

    fn enable() -> IntrLevel {
        Self::set_level(IntrLevel::On)
    }
}

/// Процессор с точки зрения планировщика.
/// The processor as the scheduler sees it.
pub trait Cpu {
    type Intr: Interrupts;

    /// Сохранить состояние `prev` и продолжить `next`.
    /// Save the state of `prev` and resume `next`.
    ///
    /// Called with interrupts off. On the first dispatch of `next` the
    /// implementation starts `next.entry()` on the stack in `next.page()`.
    fn switch_to(&mut self, prev: &Thread, next: &Thread);
}

/// Критическая секция: прерывания выключены, пока жив guard.
/// Critical section: interrupts stay off while the guard lives.
///
/// Drop restores the level seen on entry, so guards nest.
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IntrGuard<I: Interrupts> {
    old:   IntrLevel,
    _intr: PhantomData<I>,
}

impl<I: Interrupts> IntrGuard<I> {
    pub fn new() -> Self {
        Self { old: I::disable(), _intr: PhantomData }
    }

    /// Уровень до входа в секцию / Level before the section was entered
    pub fn previous(&self) -> IntrLevel {
        self.old
    }
}

impl<I: Interrupts> Default for IntrGuard<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Interrupts> Drop for IntrGuard<I> {
    fn drop(&mut self) {
        I::set_level(self.old);
    }
}

#[cfg(test)]
mod tests {
    use super::sim::SimInterrupts;
    use super::*;

    #[test]
    fn guard_restores_previous_level() {
        SimInterrupts::set_level(IntrLevel::On);
        {
            let outer = IntrGuard::<SimInterrupts>::new();
            assert_eq!(outer.previous(), IntrLevel::On);
            assert_eq!(SimInterrupts::level(), IntrLevel::Off);
            {
                let inner = IntrGuard::<SimInterrupts>::new();
                assert_eq!(inner.previous(), IntrLevel::Off);
            }
            // вложенный guard не включает прерывания раньше времени
            assert_eq!(SimInterrupts::level(), IntrLevel::Off);
        }
        assert_eq!(SimInterrupts::level(), IntrLevel::On);
    }

    #[test]
    fn guard_restores_on_early_return() {
        fn bail(flag: bool) -> Option<()> {
            let _guard = IntrGuard::<SimInterrupts>::new();
            if flag {
                return None;
            }
            Some(())
        }

        SimInterrupts::set_level(IntrLevel::On);
        assert_eq!(bail(true), None);
        assert_eq!(SimInterrupts::level(), IntrLevel::On);

        SimInterrupts::set_level(IntrLevel::Off);
        assert_eq!(bail(false), Some(()));
        assert_eq!(SimInterrupts::level(), IntrLevel::Off);
    }
}
