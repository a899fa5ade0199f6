//! Kernel logger — бэкенд для `log` / backend for the `log` facade
//!
//! Вывод идёт в консольный sink, который устанавливает платформа
//! (UART, framebuffer, буфер в тестах).
//! Output goes to a console sink installed by the platform
//! (UART, framebuffer, a buffer in tests).

use core::fmt;
use log::{LevelFilter, Log, Metadata, Record};
use spin::{Mutex, Once};

use crate::error::{Error, Result};

/// Куда пишется текст / Where text goes
pub type Sink = fn(&str);

static SINK: Once<Sink> = Once::new();

struct SinkWriter;

impl fmt::Write for SinkWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if let Some(sink) = SINK.get() {
            sink(s);
        }
        Ok(())
    }
}

static CONSOLE_LOCK: Mutex<SinkWriter> = Mutex::new(SinkWriter);

/// Внутренняя функция для макроса kprint!
/// Internal function for kprint! macro
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    CONSOLE_LOCK.lock().write_fmt(args).ok();
}

/// Макрос для вывода в консоль ядра.
/// Kernel console print macro.
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {
        $crate::klog::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! kprintln {
    ()           => ($crate::kprint!("\n"));
    ($($arg:tt)*) => ($crate::kprint!("{}\n", format_args!($($arg)*)));
}

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::kprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger;

/// Установить sink и зарегистрировать логгер. Вызывается один раз.
/// Install the sink and register the logger. Call once.
pub fn init(sink: Sink, level: LevelFilter) -> Result<()> {
    if SINK.is_completed() {
        return Err(Error::LoggerInstalled);
    }
    SINK.call_once(|| sink);
    log::set_logger(&LOGGER).map_err(|_| Error::LoggerInstalled)?;
    log::set_max_level(level);
    Ok(())
}
