//! Конфигурация планировщика / Scheduler configuration
//!
//! Режим выбирается один раз при загрузке и больше не меняется.
//! The mode is chosen once at boot and never changes afterwards.
//!
//! Командная строка ядра / Kernel command line:
//!   -o mlfqs | -mlfqs        — MLFQS вместо донорства / MLFQS instead of donation
//!   -freq=N                  — частота таймера, Гц (19..=1000) / timer frequency, Hz
//!   -slice=N                 — квант времени в тиках / time slice in ticks
//!   -trace=alarm,donation    — подробный лог подсистем / verbose subsystem logging

use alloc::string::{String, ToString};
use bitflags::bitflags;

use crate::error::{Error, Result};

/// Частота таймера по умолчанию / Default timer frequency (ticks per second)
pub const TIMER_FREQ: u32 = 100;

/// Квант времени по умолчанию / Default time slice (ticks)
pub const TIME_SLICE: u32 = 4;

/// Алгоритм выбора приоритета / How priorities are decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedMode {
    /// Явные приоритеты + донорство / Explicit priorities with donation
    #[default]
    Priority,
    /// Multi-level feedback queue: приоритет из статистики / priority from statistics
    Mlfqs,
}

bitflags! {
    /// Подсистемы с подробным логом / Subsystems with verbose logging
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TraceFlags: u32 {
        const DISPATCH = 1 << 0;
        const ALARM    = 1 << 1;
        const DONATION = 1 << 2;
        const MLFQS    = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub mode:       SchedMode,
    pub timer_freq: u32,
    pub time_slice: u32,
    pub trace:      TraceFlags,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            mode:       SchedMode::Priority,
            timer_freq: TIMER_FREQ,
            time_slice: TIME_SLICE,
            trace:      TraceFlags::empty(),
        }
    }

    pub const fn mlfqs() -> Self {
        let mut cfg = Self::new();
        cfg.mode = SchedMode::Mlfqs;
        cfg
    }

    /// Разобрать командную строку ядра.
    /// Parse the kernel command line.
    pub fn from_cmdline(cmdline: &str) -> Result<Self> {
        let mut cfg = Self::new();
        let mut words = cmdline.split_whitespace();

        while let Some(word) = words.next() {
            let (option, value) = match word.split_once('=') {
                Some((o, v)) => (o, Some(v)),
                None         => (word, None),
            };

            match (option, value) {
                ("-mlfqs", None) => cfg.mode = SchedMode::Mlfqs,
                ("-o", None) => match words.next() {
                    Some("mlfqs") => cfg.mode = SchedMode::Mlfqs,
                    Some(other)   => return Err(invalid("-o", other)),
                    None          => return Err(invalid("-o", "")),
                },
                ("-freq", Some(v)) => {
                    cfg.timer_freq = match v.parse::<u32>() {
                        Ok(hz) if (19..=1000).contains(&hz) => hz,
                        _ => return Err(invalid(option, v)),
                    };
                }
                ("-slice", Some(v)) => {
                    cfg.time_slice = match v.parse::<u32>() {
                        Ok(n) if n > 0 => n,
                        _ => return Err(invalid(option, v)),
                    };
                }
                ("-trace", Some(v)) => cfg.trace = parse_trace(v)?,
                _ => return Err(Error::UnknownOption(word.to_string())),
            }
        }

        Ok(cfg)
    }

    pub fn is_mlfqs(&self) -> bool {
        self.mode == SchedMode::Mlfqs
    }
}

fn parse_trace(list: &str) -> Result<TraceFlags> {
    let mut flags = TraceFlags::empty();
    for name in list.split(',').filter(|s| !s.is_empty()) {
        flags |= match name {
            "dispatch" => TraceFlags::DISPATCH,
            "alarm"    => TraceFlags::ALARM,
            "donation" => TraceFlags::DONATION,
            "mlfqs"    => TraceFlags::MLFQS,
            "all"      => TraceFlags::all(),
            _          => return Err(invalid("-trace", name)),
        };
    }
    Ok(flags)
}

fn invalid(option: &str, value: &str) -> Error {
    Error::InvalidOption {
        option: String::from(option),
        value:  String::from(value),
    }
}
