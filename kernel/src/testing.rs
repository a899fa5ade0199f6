//! Общие помощники для тестов / Shared test helpers

use crate::arch::sim::SimCpu;
use crate::config::Config;
use crate::mm::palloc::PagePool;
use crate::mm::PhysAddr;
use crate::sched::{Scheduler, Tid};

pub(crate) type TestSched = Scheduler<SimCpu, PagePool>;

const POOL_BASE: u64 = 0x20_0000;

pub(crate) fn boot_with_pages(config: Config, pages: usize) -> TestSched {
    Scheduler::new(config, SimCpu::default(), PagePool::new(PhysAddr::new(POOL_BASE), pages))
}

/// Планировщик без idle-потока / A scheduler without the idle thread
pub(crate) fn boot(config: Config) -> TestSched {
    boot_with_pages(config, 64)
}

/// С idle-потоком и включёнными прерываниями / With idle and interrupts on
pub(crate) fn boot_started(config: Config) -> TestSched {
    let mut s = boot(config);
    s.start().unwrap();
    s
}

pub(crate) fn noop(_: usize) {}

pub(crate) fn spawn(s: &mut TestSched, name: &str, priority: i32) -> Tid {
    s.create(name, priority, noop, 0).unwrap()
}
