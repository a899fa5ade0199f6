//! x86_64 — флаг прерываний через RFLAGS.IF
//! x86_64 — interrupt flag via RFLAGS.IF
//!
//! Переключение контекста (сохранение регистров, смена стека) живёт в
//! трамплине платформы и сюда не входит.
//! Context switching (register save, stack switch) lives in the
//! platform trampoline and is not part of this crate.

use core::arch::asm;

use super::{IntrLevel, Interrupts};

const RFLAGS_IF: u64 = 1 << 9;

pub struct X86Interrupts;

impl Interrupts for X86Interrupts {
    fn level() -> IntrLevel {
        let rflags: u64;
        unsafe { asm!("pushfq", "pop {}", out(reg) rflags, options(preserves_flags)) };
        if rflags & RFLAGS_IF != 0 { IntrLevel::On } else { IntrLevel::Off }
    }

    fn set_level(level: IntrLevel) -> IntrLevel {
        let old = Self::level();
        match level {
            // cli/sti — не трогаем память, но это барьер для компилятора
            // cli/sti: no memory access, but a compiler barrier
            IntrLevel::Off => unsafe { asm!("cli", options(nostack)) },
            IntrLevel::On  => unsafe { asm!("sti", options(nostack)) },
        }
        old
    }
}
