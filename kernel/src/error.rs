//! Ошибки ядра / Kernel errors
//!
//! Только восстанавливаемые ошибки. Нарушение инвариантов планировщика
//! (испорченный magic, нет потока для запуска) — это panic.
//! Recoverable errors only. Broken scheduler invariants (clobbered magic,
//! nothing to run) panic instead.

use alloc::string::String;

use crate::sched::thread::{NICE_MAX, NICE_MIN, PRI_MAX, PRI_MIN};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Нет свободной страницы под новый поток / No page left for a new thread
    #[error("out of memory: no page available for a new thread")]
    NoMemory,

    #[error("priority {0} outside {min}..={max}", min = PRI_MIN, max = PRI_MAX)]
    InvalidPriority(i32),

    #[error("nice value {0} outside {min}..={max}", min = NICE_MIN, max = NICE_MAX)]
    InvalidNice(i32),

    /// Неизвестная опция командной строки / Unknown command line option
    #[error("unknown kernel option `{0}`")]
    UnknownOption(String),

    #[error("invalid value `{value}` for kernel option `{option}`")]
    InvalidOption { option: String, value: String },

    #[error("kernel logger already installed")]
    LoggerInstalled,
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn messages_name_the_valid_range() {
        assert_eq!(
            Error::InvalidPriority(64).to_string(),
            "priority 64 outside 0..=63"
        );
        assert_eq!(
            Error::InvalidNice(-21).to_string(),
            "nice value -21 outside -20..=20"
        );
    }
}
