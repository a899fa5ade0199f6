//! Симулятор CPU для тестов на хосте / Simulated CPU for host tests
//!
//! Переключение контекста только записывается: после `switch_to` код
//! теста продолжает работу от имени нового текущего потока.
//! Context switches are only recorded: after `switch_to` the test keeps
//! going on behalf of the new current thread.

use std::cell::Cell;
use std::vec::Vec;

use super::{Cpu, IntrLevel, Interrupts};
use crate::sched::{Thread, Tid};

std::thread_local! {
    // у каждого теста свой поток ОС — и свой флаг прерываний
    static LEVEL: Cell<IntrLevel> = const { Cell::new(IntrLevel::On) };
}

pub struct SimInterrupts;

impl Interrupts for SimInterrupts {
    fn level() -> IntrLevel {
        LEVEL.with(|l| l.get())
    }

    fn set_level(level: IntrLevel) -> IntrLevel {
        LEVEL.with(|l| l.replace(level))
    }
}

#[derive(Debug, Default)]
pub struct SimCpu {
    pub switches: Vec<(Tid, Tid)>,
}

impl Cpu for SimCpu {
    type Intr = SimInterrupts;

    fn switch_to(&mut self, prev: &Thread, next: &Thread) {
        assert_eq!(SimInterrupts::level(), IntrLevel::Off, "switch with interrupts on");
        self.switches.push((prev.tid(), next.tid()));
    }
}
